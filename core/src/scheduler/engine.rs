// /////////////////////////////////////////////////////////////////////////////
// Adaptive Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Scheduler
//!
//! Ties the time wheel, task queue, distributed lock, and circuit breaker
//! together: [`Scheduler::register_task`] seeds the persisted task row and
//! places the task into the time wheel; [`Scheduler::start`] runs the
//! wheel, the lock's auto-renewer, and a main loop popping from the task
//! queue, trying the lock, consulting the breaker, and spawning
//! `run_task` per dispatch.

use crate::scheduler::circuit_breaker::CircuitBreaker;
use crate::scheduler::distributed_lock::DistributedLock;
use crate::scheduler::task_queue::TaskQueue;
use crate::scheduler::time_wheel::TimeWheel;
use audit_pipeline_bootstrap::shutdown::ShutdownCoordinator;
use audit_pipeline_domain::entities::ScheduledTask;
use audit_pipeline_domain::error::PipelineError;
use audit_pipeline_domain::ports::{ScheduledTaskRepository, Task};
use audit_pipeline_domain::value_objects::TaskName;
use chrono::Utc;
use futures::FutureExt;
use parking_lot::Mutex;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

pub struct Scheduler {
    repo: Arc<dyn ScheduledTaskRepository>,
    lock: Arc<DistributedLock>,
    breaker: Arc<CircuitBreaker>,
    queue: Arc<TaskQueue>,
    wheel: Arc<TimeWheel>,
    shutdown: ShutdownCoordinator,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl Scheduler {
    pub fn new(
        repo: Arc<dyn ScheduledTaskRepository>,
        fail_threshold: u32,
        isolate_duration_secs: i64,
        lease_duration_secs: i64,
        slot_count: usize,
        tick_interval: Duration,
    ) -> Result<Arc<Self>, PipelineError> {
        let lock = Arc::new(
            DistributedLock::new(Arc::clone(&repo), lease_duration_secs)
                .map_err(|e| PipelineError::InternalError(e.to_string()))?,
        );
        let breaker = Arc::new(CircuitBreaker::new(fail_threshold, isolate_duration_secs));
        let queue = Arc::new(TaskQueue::new());
        let wheel = TimeWheel::new(slot_count, tick_interval, Arc::clone(&queue));

        Ok(Arc::new(Self {
            repo,
            lock,
            breaker,
            queue,
            wheel,
            shutdown: ShutdownCoordinator::default(),
            workers: Mutex::new(Vec::new()),
        }))
    }

    /// Insert-if-absent the task's persisted row, load the persisted
    /// `next_run_time` into the in-memory task, and place it into the wheel.
    pub async fn register_task(&self, task: Arc<dyn Task>) -> Result<(), PipelineError> {
        let name = TaskName::new(task.name())?;
        let initial_next_run = Utc::now() + chrono::Duration::seconds(task.exe_interval());
        let row = ScheduledTask::new(name.clone(), task.priority(), initial_next_run);
        self.repo.upsert_if_absent(&row).await?;

        if let Some(persisted) = self.repo.load(&name).await? {
            task.set_next_run_time(persisted.next_run_time);
        }

        self.wheel.add_task(task);
        Ok(())
    }

    /// Starts the time wheel, the lock's auto-renewer, and the main
    /// dispatch loop.
    pub fn start(self: &Arc<Self>) {
        self.wheel.run();
        self.lock.auto_renew();

        let this = Arc::clone(self);
        let handle = tokio::spawn(async move { this.run_main_loop().await });
        self.workers.lock().push(handle);
    }

    async fn run_main_loop(self: Arc<Self>) {
        let token = self.shutdown.token();
        loop {
            let task = tokio::select! {
                _ = token.cancelled() => return,
                task = self.queue.pop() => task,
            };

            let name = task.name().to_string();
            let Ok(task_name) = TaskName::new(name.clone()) else {
                continue;
            };

            let locked = match self.lock.try_lock(&task_name).await {
                Ok(locked) => locked,
                Err(e) => {
                    warn!(task = %name, error = %e, "lock acquisition errored; rescheduling");
                    false
                }
            };

            if !locked {
                task.set_next_run_time(Utc::now() + chrono::Duration::seconds(task.exe_interval()));
                self.wheel.add_task(task);
                continue;
            }

            if self.breaker.is_isolated(&name) {
                task.set_next_run_time(Utc::now() + chrono::Duration::seconds(task.exe_interval()));
                self.wheel.add_task(task);
                continue;
            }

            let this = Arc::clone(&self);
            tokio::spawn(async move { this.run_task(task).await });
        }
    }

    /// Runs a single dispatch. Always reschedules and persists the task row
    /// on the way out, even if `task.run()` panics.
    async fn run_task(self: Arc<Self>, task: Arc<dyn Task>) {
        let name = task.name().to_string();
        let exe_interval = task.exe_interval();

        let now = Utc::now();
        if let Ok(task_name) = TaskName::new(name.clone()) {
            if let Ok(Some(row)) = self.repo.load(&task_name).await {
                let sleep_until = row.next_run_time;
                if sleep_until > now {
                    if let Ok(delay) = (sleep_until - now).to_std() {
                        tokio::time::sleep(delay).await;
                    }
                }
            }
        }

        let run_result = AssertUnwindSafe(task.run()).catch_unwind().await;

        let outcome = match run_result {
            Ok(Ok(())) => {
                self.breaker.on_success(&name);
                Ok(())
            }
            Ok(Err(e)) => {
                self.breaker.on_failure(&name);
                Err(e.to_string())
            }
            Err(panic) => {
                self.breaker.on_failure(&name);
                let message = panic
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| panic.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "task panicked".to_string());
                Err(message)
            }
        };

        match &outcome {
            Ok(()) => info!(task = %name, "task run succeeded"),
            Err(e) => error!(task = %name, error = %e, "task run failed"),
        }

        task.set_next_run_time(Utc::now() + chrono::Duration::seconds(exe_interval));
        self.wheel.add_task(Arc::clone(&task));

        if let Ok(task_name) = TaskName::new(name.clone()) {
            if let Ok(Some(mut row)) = self.repo.load(&task_name).await {
                row.last_run_time = Some(now);
                row.next_run_time = task.next_run_time();
                row.execution_count += 1;
                if outcome.is_err() {
                    row.failure_count += 1;
                }
                if let Err(e) = self.repo.save(&row).await {
                    warn!(task = %name, error = %e, "failed to persist task row after run");
                }
            }

            let _ = self.lock.unlock(&task_name).await;
        }
    }

    pub async fn stop(&self) {
        if self.shutdown.is_shutting_down() {
            return;
        }
        self.shutdown.initiate_shutdown();
        self.wheel.stop();

        let handles: Vec<_> = self.workers.lock().drain(..).collect();
        for handle in handles {
            let _ = handle.await;
        }
        self.lock.release_all().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::DateTime;
    use std::collections::HashMap;
    use std::error::Error as StdError;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::Mutex as AsyncMutex;

    #[derive(Default)]
    struct FakeRepo {
        rows: AsyncMutex<HashMap<String, ScheduledTask>>,
    }

    #[async_trait]
    impl ScheduledTaskRepository for FakeRepo {
        async fn upsert_if_absent(&self, task: &ScheduledTask) -> Result<(), PipelineError> {
            let mut rows = self.rows.lock().await;
            rows.entry(task.task_name.as_str().to_string()).or_insert_with(|| task.clone());
            Ok(())
        }

        async fn load(&self, name: &TaskName) -> Result<Option<ScheduledTask>, PipelineError> {
            Ok(self.rows.lock().await.get(name.as_str()).cloned())
        }

        async fn try_acquire_lease(&self, name: &TaskName, holder: &str, lease_secs: i64) -> Result<bool, PipelineError> {
            let mut rows = self.rows.lock().await;
            let now = Utc::now();
            let row = rows
                .entry(name.as_str().to_string())
                .or_insert_with(|| ScheduledTask::new(name.clone(), 0, now));
            if row.lease_holder.is_empty() || row.lease_until < now {
                row.lease_holder = holder.to_string();
                row.lease_until = now + chrono::Duration::seconds(lease_secs);
                Ok(true)
            } else {
                Ok(false)
            }
        }

        async fn renew_lease(&self, name: &TaskName, holder: &str, lease_secs: i64) -> Result<bool, PipelineError> {
            let mut rows = self.rows.lock().await;
            let now = Utc::now();
            if let Some(row) = rows.get_mut(name.as_str()) {
                if row.lease_holder == holder && row.lease_until > now {
                    row.lease_until = now + chrono::Duration::seconds(lease_secs);
                    return Ok(true);
                }
            }
            Ok(false)
        }

        async fn release_lease(&self, name: &TaskName, holder: &str) -> Result<(), PipelineError> {
            let mut rows = self.rows.lock().await;
            let now = Utc::now();
            if let Some(row) = rows.get_mut(name.as_str()) {
                if row.lease_holder == holder && row.lease_until > now {
                    row.lease_holder.clear();
                }
            }
            Ok(())
        }

        async fn save(&self, task: &ScheduledTask) -> Result<(), PipelineError> {
            self.rows.lock().await.insert(task.task_name.as_str().to_string(), task.clone());
            Ok(())
        }
    }

    struct CountingTask {
        name: String,
        runs: Arc<AtomicUsize>,
        next_run_time: parking_lot::Mutex<DateTime<Utc>>,
        fails: bool,
    }

    #[async_trait]
    impl Task for CountingTask {
        fn name(&self) -> &str {
            &self.name
        }
        fn priority(&self) -> i32 {
            0
        }
        fn exe_interval(&self) -> i64 {
            3600
        }
        async fn run(&self) -> Result<(), Box<dyn StdError + Send + Sync>> {
            self.runs.fetch_add(1, Ordering::SeqCst);
            if self.fails {
                Err("boom".into())
            } else {
                Ok(())
            }
        }
        fn next_run_time(&self) -> DateTime<Utc> {
            *self.next_run_time.lock()
        }
        fn set_next_run_time(&self, at: DateTime<Utc>) {
            *self.next_run_time.lock() = at;
        }
    }

    #[tokio::test]
    async fn register_and_run_invokes_task_once() {
        let repo = Arc::new(FakeRepo::default());
        let scheduler = Scheduler::new(repo, 3, 30, 10, 10, Duration::from_millis(10)).unwrap();

        let runs = Arc::new(AtomicUsize::new(0));
        let task: Arc<dyn Task> = Arc::new(CountingTask {
            name: "rotate".to_string(),
            runs: Arc::clone(&runs),
            next_run_time: parking_lot::Mutex::new(Utc::now()),
            fails: false,
        });

        scheduler.register_task(Arc::clone(&task)).await.unwrap();
        scheduler.start();

        tokio::time::timeout(Duration::from_secs(2), async {
            while runs.load(Ordering::SeqCst) == 0 {
                tokio::time::sleep(Duration::from_millis(20)).await;
            }
        })
        .await
        .unwrap();

        scheduler.stop().await;
        assert!(runs.load(Ordering::SeqCst) >= 1);
    }

    #[tokio::test]
    async fn failing_task_trips_breaker_and_still_reschedules() {
        let repo = Arc::new(FakeRepo::default());
        let scheduler = Scheduler::new(repo, 1, 30, 10, 10, Duration::from_millis(10)).unwrap();

        let runs = Arc::new(AtomicUsize::new(0));
        let task: Arc<dyn Task> = Arc::new(CountingTask {
            name: "flaky".to_string(),
            runs: Arc::clone(&runs),
            next_run_time: parking_lot::Mutex::new(Utc::now()),
            fails: true,
        });

        scheduler.register_task(Arc::clone(&task)).await.unwrap();
        scheduler.start();

        tokio::time::timeout(Duration::from_secs(2), async {
            while runs.load(Ordering::SeqCst) == 0 {
                tokio::time::sleep(Duration::from_millis(20)).await;
            }
        })
        .await
        .unwrap();

        tokio::time::sleep(Duration::from_millis(50)).await;
        scheduler.stop().await;
        assert!(scheduler.breaker.is_isolated("flaky"));
    }
}
