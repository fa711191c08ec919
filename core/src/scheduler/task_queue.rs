// /////////////////////////////////////////////////////////////////////////////
// Adaptive Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Task Queue
//!
//! A bounded-wait priority queue over runnable tasks: priority descending,
//! ties broken by insertion order. A `parking_lot::Mutex`-guarded binary
//! heap plus a `tokio::sync::Notify` waking exactly one waiter per push,
//! rather than a dedicated thread blocked on a condition variable.

use audit_pipeline_domain::ports::Task;
use parking_lot::Mutex;
use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::sync::Arc;
use tokio::sync::Notify;

struct Entry {
    priority: i32,
    /// Monotonic insertion sequence. Smaller sorts *greater* in [`Ord`] so
    /// that, at equal priority, the earliest-pushed entry pops first.
    seq: u64,
    task: Arc<dyn Task>,
}

impl PartialEq for Entry {
    fn eq(&self, other: &Self) -> bool {
        self.priority == other.priority && self.seq == other.seq
    }
}
impl Eq for Entry {}

impl Ord for Entry {
    fn cmp(&self, other: &Self) -> Ordering {
        self.priority.cmp(&other.priority).then_with(|| other.seq.cmp(&self.seq))
    }
}
impl PartialOrd for Entry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

pub struct TaskQueue {
    heap: Mutex<BinaryHeap<Entry>>,
    notify: Notify,
    seq: AtomicU64,
}

impl TaskQueue {
    pub fn new() -> Self {
        Self {
            heap: Mutex::new(BinaryHeap::new()),
            notify: Notify::new(),
            seq: AtomicU64::new(0),
        }
    }

    pub fn push(&self, task: Arc<dyn Task>) {
        let seq = self.seq.fetch_add(1, AtomicOrdering::Relaxed);
        let priority = task.priority();
        self.heap.lock().push(Entry { priority, seq, task });
        self.notify.notify_one();
    }

    pub fn len(&self) -> usize {
        self.heap.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Waits until a task is available, then returns the highest-priority
    /// one (earliest-pushed among ties).
    pub async fn pop(&self) -> Arc<dyn Task> {
        loop {
            if let Some(entry) = self.heap.lock().pop() {
                return entry.task;
            }
            self.notify.notified().await;
        }
    }
}

impl Default for TaskQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::{DateTime, Utc};
    use parking_lot::Mutex as PMutex;
    use std::error::Error as StdError;
    use std::time::Duration;

    struct StubTask {
        name: String,
        priority: i32,
        next_run_time: PMutex<DateTime<Utc>>,
    }

    impl StubTask {
        fn new(name: &str, priority: i32) -> Arc<dyn Task> {
            Arc::new(Self {
                name: name.to_string(),
                priority,
                next_run_time: PMutex::new(Utc::now()),
            })
        }
    }

    #[async_trait]
    impl Task for StubTask {
        fn name(&self) -> &str {
            &self.name
        }
        fn priority(&self) -> i32 {
            self.priority
        }
        fn exe_interval(&self) -> i64 {
            1
        }
        async fn run(&self) -> Result<(), Box<dyn StdError + Send + Sync>> {
            Ok(())
        }
        fn next_run_time(&self) -> DateTime<Utc> {
            *self.next_run_time.lock()
        }
        fn set_next_run_time(&self, at: DateTime<Utc>) {
            *self.next_run_time.lock() = at;
        }
    }

    #[tokio::test]
    async fn pops_in_priority_order_with_fifo_ties() {
        let queue = TaskQueue::new();
        queue.push(StubTask::new("t1", 1));
        queue.push(StubTask::new("t2", 3));
        queue.push(StubTask::new("t3", 2));
        queue.push(StubTask::new("t1b", 1));

        assert_eq!(queue.pop().await.name(), "t2");
        assert_eq!(queue.pop().await.name(), "t3");
        assert_eq!(queue.pop().await.name(), "t1");
        assert_eq!(queue.pop().await.name(), "t1b");
    }

    #[tokio::test]
    async fn pop_blocks_until_push() {
        let queue = Arc::new(TaskQueue::new());
        let reader = Arc::clone(&queue);
        let handle = tokio::spawn(async move { reader.pop().await.name().to_string() });

        tokio::time::sleep(Duration::from_millis(30)).await;
        queue.push(StubTask::new("late", 1));

        let name = tokio::time::timeout(Duration::from_millis(200), handle)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(name, "late");
    }
}
