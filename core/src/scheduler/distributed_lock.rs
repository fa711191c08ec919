// /////////////////////////////////////////////////////////////////////////////
// Adaptive Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Distributed Lock
//!
//! A database-leased mutex over the `schedule_task` row's `lease_holder` /
//! `lease_until` columns. The single conditional `UPDATE`
//! [`ScheduledTaskRepository::try_acquire_lease`] issues is the
//! serialization point every replica's acquisition races against; this
//! struct only adds the local fast-path cache, auto-renewal, and bulk
//! release on top of that primitive.
//!
//! Instance identity is `<local-ipv4>-<12-char-uuid>`, computed once at
//! construction; a missing local IPv4 is a recoverable startup error here
//! rather than a panic.

use audit_pipeline_domain::error::PipelineError;
use audit_pipeline_domain::ports::ScheduledTaskRepository;
use audit_pipeline_domain::value_objects::TaskName;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, warn};
use uuid::Uuid;

pub struct DistributedLock {
    repo: Arc<dyn ScheduledTaskRepository>,
    instance_id: String,
    lease_duration_secs: i64,
    /// Task name -> local time this replica last confirmed acquisition.
    /// The fast path in [`Self::try_lock`] trusts this clock, not the
    /// database, between renewals.
    lock_map: Mutex<HashMap<String, DateTime<Utc>>>,
    renewing: AtomicBool,
    renewer: Mutex<Option<JoinHandle<()>>>,
}

impl DistributedLock {
    pub fn new(repo: Arc<dyn ScheduledTaskRepository>, lease_duration_secs: i64) -> Result<Self, PipelineError> {
        let ip = local_ip_address::local_ip()
            .map(|addr| addr.to_string())
            .unwrap_or_else(|e| {
                warn!(error = %e, "no local IPv4 discovered; falling back to 127.0.0.1 for lock identity");
                "127.0.0.1".to_string()
            });
        let suffix: String = Uuid::new_v4().simple().to_string().chars().take(12).collect();
        let instance_id = format!("{ip}-{suffix}");

        Ok(Self {
            repo,
            instance_id,
            lease_duration_secs,
            lock_map: Mutex::new(HashMap::new()),
            renewing: AtomicBool::new(false),
            renewer: Mutex::new(None),
        })
    }

    pub fn instance_id(&self) -> &str {
        &self.instance_id
    }

    /// Fast path: if this replica confirmed acquisition less than
    /// `lease_duration` ago, trust the local clock. Slow path: the
    /// conditional `UPDATE`.
    pub async fn try_lock(&self, task_name: &TaskName) -> Result<bool, PipelineError> {
        let now = Utc::now();
        {
            let guard = self.lock_map.lock();
            if let Some(acquired_at) = guard.get(task_name.as_str()) {
                if now.signed_duration_since(*acquired_at).num_seconds() < self.lease_duration_secs {
                    return Ok(true);
                }
            }
        }

        let acquired = self
            .repo
            .try_acquire_lease(task_name, &self.instance_id, self.lease_duration_secs)
            .await?;

        let mut guard = self.lock_map.lock();
        if acquired {
            guard.insert(task_name.as_str().to_string(), now);
        } else {
            guard.remove(task_name.as_str());
        }
        Ok(acquired)
    }

    /// Idempotent: a mismatched holder or an already-expired lease is a
    /// no-op, not an error. Always clears the local map entry.
    pub async fn unlock(&self, task_name: &TaskName) -> Result<(), PipelineError> {
        self.repo.release_lease(task_name, &self.instance_id).await?;
        self.lock_map.lock().remove(task_name.as_str());
        Ok(())
    }

    /// Start the background renewer at `lease_duration / 3`. A no-op if
    /// already running.
    pub fn auto_renew(self: &Arc<Self>) {
        if self.renewing.swap(true, Ordering::SeqCst) {
            return;
        }
        let interval = Duration::from_secs((self.lease_duration_secs / 3).max(1) as u64);
        let this = Arc::clone(self);
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await; // first tick fires immediately; consume it
            loop {
                ticker.tick().await;
                this.renew_all().await;
            }
        });
        *self.renewer.lock() = Some(handle);
    }

    async fn renew_all(&self) {
        let held: Vec<String> = self.lock_map.lock().keys().cloned().collect();
        for task_name in held {
            let Ok(name) = TaskName::new(task_name.clone()) else { continue };
            match self.repo.renew_lease(&name, &self.instance_id, self.lease_duration_secs).await {
                Ok(true) => {
                    self.lock_map.lock().insert(task_name, Utc::now());
                }
                Ok(false) => {
                    warn!(task = %task_name, instance = %self.instance_id, "lease already lost; dropping from local map");
                    self.lock_map.lock().remove(&task_name);
                }
                Err(e) => {
                    warn!(task = %task_name, error = %e, "failed to renew lease");
                    self.lock_map.lock().remove(&task_name);
                }
            }
        }
    }

    /// Stop the renewer, then release every locally-held task concurrently.
    pub async fn release_all(&self) {
        if let Some(handle) = self.renewer.lock().take() {
            handle.abort();
        }
        self.renewing.store(false, Ordering::SeqCst);

        let held: Vec<String> = self.lock_map.lock().keys().cloned().collect();
        let mut set = tokio::task::JoinSet::new();
        for task_name in held {
            let repo = Arc::clone(&self.repo);
            let instance_id = self.instance_id.clone();
            set.spawn(async move {
                if let Ok(name) = TaskName::new(task_name) {
                    let _ = repo.release_lease(&name, &instance_id).await;
                }
            });
        }
        while set.join_next().await.is_some() {}
        self.lock_map.lock().clear();
        debug!(instance = %self.instance_id, "released all held leases");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use audit_pipeline_domain::entities::ScheduledTask;
    use std::sync::atomic::AtomicUsize;
    use tokio::sync::Mutex as AsyncMutex;

    #[derive(Default)]
    struct FakeRepo {
        rows: AsyncMutex<HashMap<String, ScheduledTask>>,
        acquire_calls: AtomicUsize,
    }

    #[async_trait::async_trait]
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
            self.acquire_calls.fetch_add(1, Ordering::SeqCst);
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

    #[tokio::test]
    async fn try_lock_then_fast_path_skips_db() {
        let repo = Arc::new(FakeRepo::default());
        let lock = DistributedLock::new(repo.clone(), 10).unwrap();
        let name = TaskName::new("rotate").unwrap();

        assert!(lock.try_lock(&name).await.unwrap());
        assert!(lock.try_lock(&name).await.unwrap());
        assert_eq!(repo.acquire_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn second_replica_cannot_acquire_held_lease() {
        let repo = Arc::new(FakeRepo::default());
        let lock_a = DistributedLock::new(repo.clone(), 10).unwrap();
        let lock_b = DistributedLock::new(repo.clone(), 10).unwrap();
        let name = TaskName::new("rotate").unwrap();

        assert!(lock_a.try_lock(&name).await.unwrap());
        assert!(!lock_b.try_lock(&name).await.unwrap());
    }

    #[tokio::test]
    async fn unlock_then_another_replica_can_acquire() {
        let repo = Arc::new(FakeRepo::default());
        let lock_a = DistributedLock::new(repo.clone(), 10).unwrap();
        let lock_b = DistributedLock::new(repo.clone(), 10).unwrap();
        let name = TaskName::new("rotate").unwrap();

        assert!(lock_a.try_lock(&name).await.unwrap());
        lock_a.unlock(&name).await.unwrap();
        assert!(lock_b.try_lock(&name).await.unwrap());
    }

    #[tokio::test]
    async fn release_all_frees_every_held_task() {
        let repo = Arc::new(FakeRepo::default());
        let lock_a = Arc::new(DistributedLock::new(repo.clone(), 10).unwrap());
        let lock_b = DistributedLock::new(repo.clone(), 10).unwrap();
        let t1 = TaskName::new("t1").unwrap();
        let t2 = TaskName::new("t2").unwrap();

        assert!(lock_a.try_lock(&t1).await.unwrap());
        assert!(lock_a.try_lock(&t2).await.unwrap());
        lock_a.release_all().await;

        assert!(lock_b.try_lock(&t1).await.unwrap());
        assert!(lock_b.try_lock(&t2).await.unwrap());
    }
}
