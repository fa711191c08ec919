// /////////////////////////////////////////////////////////////////////////////
// Adaptive Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Scheduler Tuning
//!
//! `ScheduleConfig` (`FailThreshold`, `IsolateDuration`, `LeaseDuration`)
//! plus the time-wheel sizing: slot count and tick interval are pulled out
//! into configuration rather than assumed, so a changed tick interval can
//! never silently desynchronize from the slot layout. Follows the same
//! `serde_yaml` + PascalCase convention as [`crate::pipeline::config::PipelineConfig`].

use audit_pipeline_domain::error::PipelineError;
use serde::Deserialize;

fn default_slot_count() -> usize {
    3600
}

fn default_tick_interval_ms() -> u64 {
    100
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ScheduleConfig {
    /// Consecutive failures before a task's breaker trips.
    pub fail_threshold: u32,
    /// Seconds a tripped breaker stays isolated before auto-reset.
    pub isolate_duration: i64,
    /// Seconds a distributed-lock lease is held before it must be renewed.
    pub lease_duration: i64,
    /// Time-wheel slot count. Default horizon: one hour at a 100ms tick.
    #[serde(default = "default_slot_count")]
    pub slot_count: usize,
    /// Time-wheel tick interval, in milliseconds.
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,
}

impl ScheduleConfig {
    pub fn validate(&self) -> Result<(), PipelineError> {
        if self.fail_threshold == 0 {
            return Err(PipelineError::InvalidConfiguration(
                "scheduler FailThreshold must be positive".to_string(),
            ));
        }
        if self.isolate_duration <= 0 {
            return Err(PipelineError::InvalidConfiguration(
                "scheduler IsolateDuration must be positive".to_string(),
            ));
        }
        if self.lease_duration <= 0 {
            return Err(PipelineError::InvalidConfiguration(
                "scheduler LeaseDuration must be positive".to_string(),
            ));
        }
        if self.slot_count == 0 {
            return Err(PipelineError::InvalidConfiguration(
                "scheduler SlotCount must be positive".to_string(),
            ));
        }
        if self.tick_interval_ms == 0 {
            return Err(PipelineError::InvalidConfiguration(
                "scheduler TickIntervalMs must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_minimal_yaml() {
        let yaml = r#"
FailThreshold: 3
IsolateDuration: 30
LeaseDuration: 15
"#;
        let config: ScheduleConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.fail_threshold, 3);
        assert_eq!(config.slot_count, default_slot_count());
        assert_eq!(config.tick_interval_ms, default_tick_interval_ms());
        config.validate().unwrap();
    }

    #[test]
    fn rejects_zero_fail_threshold() {
        let config = ScheduleConfig {
            fail_threshold: 0,
            isolate_duration: 30,
            lease_duration: 15,
            slot_count: default_slot_count(),
            tick_interval_ms: default_tick_interval_ms(),
        };
        assert!(config.validate().is_err());
    }
}
