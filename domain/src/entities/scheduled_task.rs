// /////////////////////////////////////////////////////////////////////////////
// Adaptive Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Scheduled Task Row
//!
//! The persisted row backing both the distributed lock (§4.4) and the
//! scheduler's bookkeeping (§4.7): one row per task name, unique on
//! `task_name`, doubling as the lease record consulted by every replica's
//! conditional `UPDATE`.

use crate::value_objects::TaskName;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduledTask {
    pub task_name: TaskName,
    /// Empty string means unlocked. Never `Option` — this mirrors the
    /// table's `NOT NULL DEFAULT ''` column and keeps the conditional
    /// `UPDATE`'s `WHERE lease_holder = ''` clause simple.
    pub lease_holder: String,
    pub lease_until: DateTime<Utc>,
    pub last_run_time: Option<DateTime<Utc>>,
    pub next_run_time: DateTime<Utc>,
    pub execution_cost: i64,
    pub execution_count: i64,
    pub failure_count: i64,
    /// Higher runs first.
    pub priority: i32,
}

impl ScheduledTask {
    /// A brand-new, unlocked row for a task about to run for the first
    /// time `exe_interval` seconds from now.
    pub fn new(task_name: TaskName, priority: i32, next_run_time: DateTime<Utc>) -> Self {
        Self {
            task_name,
            lease_holder: String::new(),
            lease_until: DateTime::<Utc>::MIN_UTC,
            last_run_time: None,
            next_run_time,
            execution_cost: 0,
            execution_count: 0,
            failure_count: 0,
            priority,
        }
    }

    /// `lease_until > now` means held; `lease_until == now` is already
    /// expired (strict greater-than, not greater-or-equal).
    pub fn is_leased(&self, now: DateTime<Utc>) -> bool {
        !self.lease_holder.is_empty() && self.lease_until > now
    }

    pub fn is_held_by(&self, holder: &str, now: DateTime<Utc>) -> bool {
        self.lease_holder == holder && self.lease_until > now
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn task() -> ScheduledTask {
        ScheduledTask::new(TaskName::new("rotate").unwrap(), 5, Utc::now())
    }

    #[test]
    fn fresh_task_is_unlocked() {
        let t = task();
        assert!(!t.is_leased(Utc::now()));
    }

    #[test]
    fn lease_until_equal_now_is_expired() {
        let mut t = task();
        let now = Utc::now();
        t.lease_holder = "replica-a".to_string();
        t.lease_until = now;
        assert!(!t.is_leased(now));
    }

    #[test]
    fn lease_until_in_future_is_held() {
        let mut t = task();
        let now = Utc::now();
        t.lease_holder = "replica-a".to_string();
        t.lease_until = now + Duration::seconds(30);
        assert!(t.is_leased(now));
        assert!(t.is_held_by("replica-a", now));
        assert!(!t.is_held_by("replica-b", now));
    }
}
