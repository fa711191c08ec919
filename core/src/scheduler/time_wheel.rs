// /////////////////////////////////////////////////////////////////////////////
// Adaptive Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Time Wheel
//!
//! Fixed-size array of slots, each a name-keyed map (dedupe by task name),
//! a single ticker advancing a cursor over them. Tasks whose delay exceeds
//! the wheel's horizon ride one extra rotation and are re-placed rather
//! than dropped.
//!
//! `slot_offset` is always derived from the same `tick_interval` the wheel
//! advances by, rather than a constant assumed to match it — a mismatch
//! there would silently misschedule every task placed past one rotation.

use crate::scheduler::task_queue::TaskQueue;
use audit_pipeline_domain::ports::Task;
use audit_pipeline_bootstrap::shutdown::ShutdownCoordinator;
use chrono::Utc;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

pub struct TimeWheel {
    slots: Vec<Mutex<HashMap<String, Arc<dyn Task>>>>,
    current_slot: AtomicUsize,
    tick_interval: Duration,
    task_queue: Arc<TaskQueue>,
    shutdown: ShutdownCoordinator,
    advancer: Mutex<Option<JoinHandle<()>>>,
}

impl TimeWheel {
    pub fn new(slot_count: usize, tick_interval: Duration, task_queue: Arc<TaskQueue>) -> Arc<Self> {
        let slot_count = slot_count.max(1);
        Arc::new(Self {
            slots: (0..slot_count).map(|_| Mutex::new(HashMap::new())).collect(),
            current_slot: AtomicUsize::new(0),
            tick_interval,
            task_queue,
            shutdown: ShutdownCoordinator::default(),
            advancer: Mutex::new(None),
        })
    }

    fn slot_count(&self) -> usize {
        self.slots.len()
    }

    /// Places `task` in the slot corresponding to its `next_run_time`,
    /// bounded by the wheel's horizon. Re-inserting the same task name
    /// replaces the prior entry in its target slot (dedupe, property P6).
    pub fn add_task(&self, task: Arc<dyn Task>) {
        let now = Utc::now();
        let delay = (task.next_run_time() - now).max(chrono::Duration::zero());
        let tick_ms = self.tick_interval.as_millis().max(1) as i64;
        let slot_offset = (delay.num_milliseconds() / tick_ms + 1).clamp(1, self.slot_count() as i64) as usize;

        let current = self.current_slot.load(Ordering::SeqCst);
        let target = (current + slot_offset) % self.slot_count();

        let mut guard = self.slots[target].lock();
        guard.insert(task.name().to_string(), task);
    }

    /// Spawns the advance loop: each tick, swap the current slot's map for
    /// an empty one, release the lock, then for every collected task push
    /// it to the queue if due, else re-place it further ahead.
    pub fn run(self: &Arc<Self>) {
        let this = Arc::clone(self);
        let token = this.shutdown.token();
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(this.tick_interval);
            loop {
                tokio::select! {
                    _ = token.cancelled() => return,
                    _ = ticker.tick() => {
                        let current = this.current_slot.load(Ordering::SeqCst);
                        let collected: HashMap<String, Arc<dyn Task>> = {
                            let mut guard = this.slots[current].lock();
                            std::mem::take(&mut *guard)
                        };

                        let now = Utc::now();
                        for task in collected.into_values() {
                            if now > task.next_run_time() {
                                this.task_queue.push(task);
                            } else {
                                this.add_task(task);
                            }
                        }

                        this.current_slot.store((current + 1) % this.slot_count(), Ordering::SeqCst);
                    }
                }
            }
        });
        *self.advancer.lock() = Some(handle);
    }

    pub fn stop(&self) {
        self.shutdown.initiate_shutdown();
        if let Some(handle) = self.advancer.lock().take() {
            handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::{DateTime, Utc};
    use std::error::Error as StdError;
    use std::time::Duration as StdDuration;

    struct StubTask {
        name: String,
        next_run_time: Mutex<DateTime<Utc>>,
    }

    impl StubTask {
        fn new(name: &str, next_run_time: DateTime<Utc>) -> Arc<dyn Task> {
            Arc::new(Self {
                name: name.to_string(),
                next_run_time: Mutex::new(next_run_time),
            })
        }
    }

    #[async_trait]
    impl Task for StubTask {
        fn name(&self) -> &str {
            &self.name
        }
        fn priority(&self) -> i32 {
            0
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
    async fn due_task_reaches_queue_after_enough_ticks() {
        let queue = Arc::new(TaskQueue::new());
        let wheel = TimeWheel::new(10, StdDuration::from_millis(20), Arc::clone(&queue));
        wheel.run();

        let task = StubTask::new("due", Utc::now() + chrono::Duration::milliseconds(30));
        wheel.add_task(task);

        let popped = tokio::time::timeout(StdDuration::from_millis(500), queue.pop()).await.unwrap();
        assert_eq!(popped.name(), "due");
        wheel.stop();
    }

    #[tokio::test]
    async fn adding_same_name_twice_in_one_slot_dedupes() {
        let queue = Arc::new(TaskQueue::new());
        let wheel = TimeWheel::new(10, StdDuration::from_millis(500), Arc::clone(&queue));

        let far_future = Utc::now() + chrono::Duration::seconds(60);
        wheel.add_task(StubTask::new("dup", far_future));
        wheel.add_task(StubTask::new("dup", far_future));

        let target = (0 + 1) % wheel.slot_count();
        assert_eq!(wheel.slots[target].lock().len(), 1);
    }
}
