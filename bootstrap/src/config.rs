// /////////////////////////////////////////////////////////////////////////////
// Adaptive Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Bootstrap Configuration
//!
//! Process-level settings the bootstrap layer needs before any pipeline or
//! scheduler configuration is loaded: the log filter directive and the
//! shutdown grace period. Pipeline/scheduler YAML is `core`'s concern
//! (`audit_pipeline_core::infrastructure::config`); this struct only covers
//! what the binary needs to stand itself up.

use std::env;
use std::time::Duration;

const DEFAULT_LOG_LEVEL: &str = "info";
const DEFAULT_GRACE_PERIOD_SECS: u64 = 5;

#[derive(Debug, Clone)]
pub struct BootstrapConfig {
    pub log_level: String,
    pub shutdown_grace_period: Duration,
}

impl BootstrapConfig {
    /// Read `AUDIT_PIPELINE_LOG` and `AUDIT_PIPELINE_GRACE_PERIOD_SECS` from
    /// the environment, falling back to sane defaults. CLI flags (see
    /// [`crate::cli`]) take precedence over these when both are present.
    pub fn from_env() -> Self {
        let log_level = env::var("AUDIT_PIPELINE_LOG").unwrap_or_else(|_| DEFAULT_LOG_LEVEL.to_string());
        let shutdown_grace_period = env::var("AUDIT_PIPELINE_GRACE_PERIOD_SECS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .map(Duration::from_secs)
            .unwrap_or(Duration::from_secs(DEFAULT_GRACE_PERIOD_SECS));

        Self {
            log_level,
            shutdown_grace_period,
        }
    }
}

impl Default for BootstrapConfig {
    fn default() -> Self {
        Self {
            log_level: DEFAULT_LOG_LEVEL.to_string(),
            shutdown_grace_period: Duration::from_secs(DEFAULT_GRACE_PERIOD_SECS),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let cfg = BootstrapConfig::default();
        assert_eq!(cfg.log_level, "info");
        assert_eq!(cfg.shutdown_grace_period, Duration::from_secs(5));
    }
}
