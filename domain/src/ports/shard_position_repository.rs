// /////////////////////////////////////////////////////////////////////////////
// Adaptive Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! Persistence port backing `TableRotationTask`: the `schedule_pos` table of
//! monitored entities plus the row-count probe and schema migration the
//! task needs to decide when, and how, to roll a shard forward.

use crate::entities::ShardPosition;
use crate::error::PipelineError;
use async_trait::async_trait;

#[async_trait]
pub trait ShardPositionRepository: Send + Sync {
    /// Every monitored entity's current shard pointer.
    async fn list_positions(&self) -> Result<Vec<ShardPosition>, PipelineError>;

    /// Insert-if-absent, starting at shard 1, then return the persisted row.
    async fn get_or_create(&self, name: &str) -> Result<ShardPosition, PipelineError>;

    /// Row count of `table_name`, the shard currently accepting writes.
    async fn count_rows(&self, table_name: &str) -> Result<i64, PipelineError>;

    /// Create `table_name` with the same schema as `like_table`, if it does
    /// not already exist.
    async fn create_shard_table(&self, table_name: &str, like_table: &str) -> Result<(), PipelineError>;

    async fn save(&self, position: &ShardPosition) -> Result<(), PipelineError>;
}
