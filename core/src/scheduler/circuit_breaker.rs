// /////////////////////////////////////////////////////////////////////////////
// Adaptive Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Circuit Breaker
//!
//! Per-task consecutive-failure isolator with time-based auto-reset. A
//! single mutex guards the whole map — contention is low, since updates
//! only happen per task-dispatch outcome, never per event.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::collections::HashMap;

struct BreakerEntry {
    fail_count: u32,
    tripped_at: Option<DateTime<Utc>>,
}

impl Default for BreakerEntry {
    fn default() -> Self {
        Self {
            fail_count: 0,
            tripped_at: None,
        }
    }
}

pub struct CircuitBreaker {
    threshold: u32,
    isolate_duration: chrono::Duration,
    entries: Mutex<HashMap<String, BreakerEntry>>,
}

impl CircuitBreaker {
    pub fn new(threshold: u32, isolate_duration_secs: i64) -> Self {
        Self {
            threshold,
            isolate_duration: chrono::Duration::seconds(isolate_duration_secs),
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn on_success(&self, task: &str) {
        let mut guard = self.entries.lock();
        guard.remove(task);
    }

    pub fn on_failure(&self, task: &str) {
        let mut guard = self.entries.lock();
        let entry = guard.entry(task.to_string()).or_default();
        entry.fail_count += 1;
        if entry.fail_count >= self.threshold {
            entry.tripped_at = Some(Utc::now());
        }
    }

    /// `true` while the task is isolated. A trip older than
    /// `isolate_duration` auto-resets the counter before returning `false`,
    /// so failures after the cooldown window accumulate from zero.
    pub fn is_isolated(&self, task: &str) -> bool {
        let mut guard = self.entries.lock();
        let Some(entry) = guard.get_mut(task) else {
            return false;
        };
        let Some(tripped_at) = entry.tripped_at else {
            return false;
        };
        if Utc::now() - tripped_at <= self.isolate_duration {
            return true;
        }
        entry.fail_count = 0;
        entry.tripped_at = None;
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trips_after_threshold_failures() {
        let breaker = CircuitBreaker::new(3, 60);
        for _ in 0..2 {
            breaker.on_failure("rotate");
            assert!(!breaker.is_isolated("rotate"));
        }
        breaker.on_failure("rotate");
        assert!(breaker.is_isolated("rotate"));
    }

    #[test]
    fn success_resets_counter() {
        let breaker = CircuitBreaker::new(2, 60);
        breaker.on_failure("rotate");
        breaker.on_success("rotate");
        breaker.on_failure("rotate");
        assert!(!breaker.is_isolated("rotate"));
    }

    #[test]
    fn auto_resets_after_isolate_window_elapses() {
        let breaker = CircuitBreaker::new(1, -1);
        breaker.on_failure("rotate");
        assert!(!breaker.is_isolated("rotate"));
    }

    #[test]
    fn untouched_task_is_never_isolated() {
        let breaker = CircuitBreaker::new(1, 60);
        assert!(!breaker.is_isolated("never-seen"));
    }
}
