// /////////////////////////////////////////////////////////////////////////////
// Adaptive Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! Persisted pointer into a time-sharded entity's current storage table,
//! backed by the `schedule_pos` table. One row per monitored entity name;
//! `schedule_end_pos` is the suffix of the shard table currently accepting
//! writes. `TableRotationTask` (`core::scheduler::tasks::table_rotation`)
//! bumps it once the current shard crosses a row-count threshold.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShardPosition {
    pub name: String,
    pub schedule_begin_pos: i64,
    pub schedule_end_pos: i64,
}

impl ShardPosition {
    /// A brand-new pointer for an entity not yet seen, starting at shard 1.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            schedule_begin_pos: 1,
            schedule_end_pos: 1,
        }
    }

    /// The shard table currently accepting writes.
    pub fn current_table(&self) -> String {
        format!("{}_{}", self.name, self.schedule_end_pos)
    }

    /// The shard table that would become current after a rotation.
    pub fn next_table(&self) -> String {
        format!("{}_{}", self.name, self.schedule_end_pos + 1)
    }

    pub fn rotate(&mut self) {
        self.schedule_end_pos += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_position_starts_at_shard_one() {
        let pos = ShardPosition::new("audit_log");
        assert_eq!(pos.current_table(), "audit_log_1");
        assert_eq!(pos.next_table(), "audit_log_2");
    }

    #[test]
    fn rotate_advances_end_pos() {
        let mut pos = ShardPosition::new("audit_log");
        pos.rotate();
        assert_eq!(pos.schedule_end_pos, 2);
        assert_eq!(pos.current_table(), "audit_log_2");
    }
}
