// /////////////////////////////////////////////////////////////////////////////
// Adaptive Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! Property-based coverage for the §8 testable properties that are
//! practical to express as properties rather than fixed-case tests: the
//! circuit breaker's threshold/reset behavior (P5), the time wheel's
//! per-slot dedupe (P6), the task queue's priority/FIFO ordering (P7), and
//! local storage's save-then-recover round trip (P8). The remaining
//! properties are exercised as fixed-case scenarios alongside the engine
//! they describe (`pipeline::engine` unit tests) since they need a running
//! `Pipeline` rather than a bare data structure.

use async_trait::async_trait;
use audit_pipeline_bootstrap::platform::{Platform, PlatformError};
use audit_pipeline_core::pipeline::LocalStorage;
use audit_pipeline_core::scheduler::{CircuitBreaker, TaskQueue, TimeWheel};
use audit_pipeline_domain::event::Event;
use audit_pipeline_domain::ports::Task;
use audit_pipeline_domain::spill::SpillLine;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use proptest::prelude::*;
use serde_json::json;
use std::error::Error as StdError;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tempfile::tempdir;

struct StubTask {
    name: String,
    priority: i32,
    next_run_time: Mutex<DateTime<Utc>>,
}

impl StubTask {
    fn new(name: impl Into<String>, priority: i32, next_run_time: DateTime<Utc>) -> Arc<dyn Task> {
        Arc::new(Self {
            name: name.into(),
            priority,
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

struct AlwaysFreePlatform;

#[async_trait]
impl Platform for AlwaysFreePlatform {
    fn page_size(&self) -> usize {
        4096
    }
    fn cpu_count(&self) -> usize {
        1
    }
    fn total_memory(&self) -> Result<u64, PlatformError> {
        Ok(1)
    }
    fn available_memory(&self) -> Result<u64, PlatformError> {
        Ok(1)
    }
    fn line_separator(&self) -> &'static str {
        "\n"
    }
    fn path_separator(&self) -> char {
        ':'
    }
    fn platform_name(&self) -> &'static str {
        "test"
    }
    fn temp_dir(&self) -> PathBuf {
        std::env::temp_dir()
    }
    fn is_elevated(&self) -> bool {
        false
    }
    fn set_permissions(&self, _path: &Path, _mode: u32) -> Result<(), PlatformError> {
        Ok(())
    }
    fn is_executable(&self, _path: &Path) -> bool {
        false
    }
    async fn sync_file(&self, _file: &tokio::fs::File) -> Result<(), PlatformError> {
        Ok(())
    }
    fn disk_free_bytes(&self, _path: &Path) -> Result<u64, PlatformError> {
        Ok(10 * 1024 * 1024 * 1024)
    }
}

fn current_thread_runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread().enable_time().build().unwrap()
}

proptest! {
    /// P5: after `threshold` consecutive failures, `is_isolated` is true for
    /// the rest of the isolate window, regardless of how many extra
    /// failures pile on past the threshold.
    #[test]
    fn breaker_trips_after_threshold_and_stays_tripped(
        threshold in 1u32..8,
        extra_failures in 0u32..5,
    ) {
        let breaker = CircuitBreaker::new(threshold, 3600);
        for n in 1..=(threshold + extra_failures) {
            breaker.on_failure("task");
            if n < threshold {
                prop_assert!(!breaker.is_isolated("task"));
            } else {
                prop_assert!(breaker.is_isolated("task"));
            }
        }
    }

    /// P5 (reset half): a success before the threshold is reached clears
    /// the counter, so the next failure alone cannot trip the breaker.
    #[test]
    fn breaker_success_clears_partial_failure_count(threshold in 2u32..8) {
        let breaker = CircuitBreaker::new(threshold, 3600);
        for _ in 0..(threshold - 1) {
            breaker.on_failure("task");
        }
        breaker.on_success("task");
        breaker.on_failure("task");
        prop_assert!(!breaker.is_isolated("task"));
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    /// P6: inserting the same task name repeatedly before the wheel ever
    /// ticks must still only dispatch it once — the per-slot map dedupes
    /// by name rather than accumulating one entry per `add_task` call.
    #[test]
    fn time_wheel_dedupes_repeated_inserts_of_the_same_task(duplicates in 2usize..8) {
        let rt = current_thread_runtime();
        rt.block_on(async {
            let queue = Arc::new(TaskQueue::new());
            let wheel = TimeWheel::new(4, Duration::from_millis(15), Arc::clone(&queue));
            wheel.run();

            let due_at = Utc::now() + chrono::Duration::milliseconds(10);
            for _ in 0..duplicates {
                wheel.add_task(StubTask::new("dup", 0, due_at));
            }

            let first = tokio::time::timeout(Duration::from_millis(500), queue.pop())
                .await
                .expect("expected exactly one dispatch of the deduped task");
            assert_eq!(first.name(), "dup");

            let second = tokio::time::timeout(Duration::from_millis(60), queue.pop()).await;
            assert!(second.is_err(), "task was dispatched more than once for {duplicates} duplicate inserts");

            wheel.stop();
        });
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    /// P7: `TaskQueue::pop` always returns tasks in non-increasing priority
    /// order, and ties resolve in the order the tasks were pushed.
    #[test]
    fn task_queue_pops_in_priority_then_fifo_order(priorities in proptest::collection::vec(-5i32..5, 1..20)) {
        let rt = current_thread_runtime();
        rt.block_on(async {
            let queue = TaskQueue::new();
            let expected: Vec<(String, i32)> = priorities
                .iter()
                .enumerate()
                .map(|(i, p)| (format!("t{i}"), *p))
                .collect();

            for (name, priority) in &expected {
                queue.push(StubTask::new(name.clone(), *priority, Utc::now()));
            }

            let mut popped = Vec::with_capacity(expected.len());
            for _ in 0..expected.len() {
                let task = queue.pop().await;
                popped.push(task.name().to_string());
            }

            // Non-increasing priority.
            let mut by_priority: std::collections::HashMap<&str, i32> = std::collections::HashMap::new();
            for (name, priority) in &expected {
                by_priority.insert(name.as_str(), *priority);
            }
            let priorities_seen: Vec<i32> = popped.iter().map(|n| by_priority[n.as_str()]).collect();
            for window in priorities_seen.windows(2) {
                assert!(window[0] >= window[1], "priorities out of order: {priorities_seen:?}");
            }

            // FIFO within a priority band: the relative order of equal-priority
            // names must match their original push order.
            let mut by_band: std::collections::HashMap<i32, Vec<&str>> = std::collections::HashMap::new();
            for (name, priority) in &expected {
                by_band.entry(*priority).or_default().push(name.as_str());
            }
            let mut seen_by_band: std::collections::HashMap<i32, Vec<&str>> = std::collections::HashMap::new();
            for name in &popped {
                let priority = by_priority[name.as_str()];
                seen_by_band.entry(priority).or_default().push(name.as_str());
            }
            for (priority, names) in by_band {
                assert_eq!(names, seen_by_band.remove(&priority).unwrap_or_default());
            }
        });
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(20))]

    /// P8: an arbitrary batch saved under an exporter name comes back from
    /// `recover` as the exact same `{name, data}` record, followed by the
    /// synthetic `Finish` marker for that file.
    #[test]
    fn local_storage_save_then_recover_round_trips(
        exporter_name in "[a-z][a-z0-9_]{0,9}",
        log_ids in proptest::collection::vec("[a-zA-Z0-9]{1,8}", 1..12),
    ) {
        let rt = current_thread_runtime();
        rt.block_on(async {
            let dir = tempdir().unwrap();
            // Large enough to hold the whole batch as one chunk, so the
            // round trip is a single record rather than several.
            let storage = LocalStorage::new(dir.path(), 64, Arc::new(AlwaysFreePlatform));

            let events: Vec<Event> = log_ids.iter().map(|id| Event::new(id.clone(), json!({}))).collect();
            storage.save(&exporter_name, &events).await.unwrap();
            storage.close();

            let mut rx = storage.recover();
            let mut records = Vec::new();
            let mut saw_finish = false;
            while let Some(item) = rx.recv().await {
                match item.unwrap() {
                    SpillLine::Data(record) => records.push(record),
                    SpillLine::Finish { .. } => saw_finish = true,
                }
            }

            assert_eq!(records.len(), 1);
            assert_eq!(records[0].name, exporter_name);
            assert_eq!(records[0].data, events);
            assert!(saw_finish);
        });
    }
}
