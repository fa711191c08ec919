// /////////////////////////////////////////////////////////////////////////////
// Adaptive Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! Persistence port for the `schedule_task` table. The
//! conditional-`UPDATE` methods here (`try_acquire_lease`, `renew_lease`)
//! are the serialization point the distributed lock's safety property
//! depends on — implementations must express them as a single atomic
//! statement, not a read-then-write.

use crate::entities::ScheduledTask;
use crate::error::PipelineError;
use crate::value_objects::TaskName;
use async_trait::async_trait;

#[async_trait]
pub trait ScheduledTaskRepository: Send + Sync {
    /// Insert the row if no row with this task name exists yet
    /// (`ON CONFLICT DO NOTHING` semantics). A no-op if the row is already
    /// present.
    async fn upsert_if_absent(&self, task: &ScheduledTask) -> Result<(), PipelineError>;

    async fn load(&self, name: &TaskName) -> Result<Option<ScheduledTask>, PipelineError>;

    /// `UPDATE ... SET lease_holder=holder, lease_until=now+duration WHERE
    /// task_name=? AND (lease_holder='' OR lease_until<now)`. Returns
    /// whether exactly one row was affected.
    async fn try_acquire_lease(
        &self,
        name: &TaskName,
        holder: &str,
        lease_duration_secs: i64,
    ) -> Result<bool, PipelineError>;

    /// `UPDATE ... SET lease_until=now+duration WHERE task_name=? AND
    /// lease_holder=holder AND lease_until>now`. Returns whether exactly
    /// one row was affected (0 rows means the lease was already lost).
    async fn renew_lease(
        &self,
        name: &TaskName,
        holder: &str,
        lease_duration_secs: i64,
    ) -> Result<bool, PipelineError>;

    /// `UPDATE ... SET lease_holder='' WHERE task_name=? AND
    /// lease_holder=holder AND lease_until>now`. Idempotent: a mismatched
    /// holder or an already-expired lease is simply a no-op, not an error.
    async fn release_lease(&self, name: &TaskName, holder: &str) -> Result<(), PipelineError>;

    /// Persist the full row — used by `run_task`'s finalizer to record
    /// `last_run_time`, `next_run_time`, `execution_cost`,
    /// `execution_count`, and `failure_count` after a dispatch.
    async fn save(&self, task: &ScheduledTask) -> Result<(), PipelineError>;
}
