// /////////////////////////////////////////////////////////////////////////////
// Adaptive Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! What the scheduler dispatches. Implementations own their own interior
//! mutability for `next_run_time` (the scheduler calls `set_next_run_time`
//! from `run_task`'s deferred finalizer, concurrently with other tasks'
//! dispatch, but never concurrently with themselves — the lease plus the
//! time wheel's per-slot dedupe guarantee at most one in-flight `run` per
//! task name).

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::error::Error as StdError;

#[async_trait]
pub trait Task: Send + Sync {
    fn name(&self) -> &str;

    /// Higher runs first at `TaskQueue` pop time.
    fn priority(&self) -> i32;

    /// Interval between successive runs, in seconds.
    fn exe_interval(&self) -> i64;

    /// Execute one run. Errors trip the circuit breaker; they do not stop
    /// the scheduler loop.
    async fn run(&self) -> Result<(), Box<dyn StdError + Send + Sync>>;

    fn next_run_time(&self) -> DateTime<Utc>;

    fn set_next_run_time(&self, at: DateTime<Utc>);
}
