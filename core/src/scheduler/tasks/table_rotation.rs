// /////////////////////////////////////////////////////////////////////////////
// Adaptive Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Table Rotation
//!
//! The one domain-specific [`Task`] this crate ships: walks every monitored
//! entity's shard position, and for each whose current shard table has
//! crossed `row_threshold` rows, creates the next shard table and bumps the
//! pointer.

use async_trait::async_trait;
use audit_pipeline_domain::ports::{ShardPositionRepository, Task};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::error::Error as StdError;
use std::sync::Arc;
use tracing::info;

/// Row count above which a shard table is considered full.
pub const DEFAULT_ROW_THRESHOLD: i64 = 30_000_000;

pub struct TableRotationTask {
    name: String,
    priority: i32,
    exe_interval: i64,
    row_threshold: i64,
    repo: Arc<dyn ShardPositionRepository>,
    next_run_time: Mutex<DateTime<Utc>>,
}

impl TableRotationTask {
    pub fn new(name: impl Into<String>, priority: i32, exe_interval: i64, repo: Arc<dyn ShardPositionRepository>) -> Self {
        Self {
            name: name.into(),
            priority,
            exe_interval,
            row_threshold: DEFAULT_ROW_THRESHOLD,
            repo,
            next_run_time: Mutex::new(Utc::now()),
        }
    }

    pub fn with_row_threshold(mut self, threshold: i64) -> Self {
        self.row_threshold = threshold;
        self
    }
}

#[async_trait]
impl Task for TableRotationTask {
    fn name(&self) -> &str {
        &self.name
    }

    fn priority(&self) -> i32 {
        self.priority
    }

    fn exe_interval(&self) -> i64 {
        self.exe_interval
    }

    async fn run(&self) -> Result<(), Box<dyn StdError + Send + Sync>> {
        let positions = self.repo.list_positions().await?;

        for mut position in positions {
            let current_table = position.current_table();
            let count = self.repo.count_rows(&current_table).await?;

            if count < self.row_threshold {
                continue;
            }

            let next_table = position.next_table();
            self.repo.create_shard_table(&next_table, &current_table).await?;
            position.rotate();
            self.repo.save(&position).await?;

            info!(
                entity = %position.name,
                from = %current_table,
                to = %position.current_table(),
                rows = count,
                "rotated shard table"
            );
        }

        Ok(())
    }

    fn next_run_time(&self) -> DateTime<Utc> {
        *self.next_run_time.lock()
    }

    fn set_next_run_time(&self, at: DateTime<Utc>) {
        *self.next_run_time.lock() = at;
    }
}
