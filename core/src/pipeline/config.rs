// /////////////////////////////////////////////////////////////////////////////
// Adaptive Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Pipeline Configuration
//!
//! One YAML document per pipeline: `Name`, `BatchSize`,
//! `BatchTimeout`, `StorageDir`, `MetricsPrefix`, `RecoveryInterval`, and a
//! `Plugins` block of exporter/filter/lifecycle specs. Deserialized directly
//! with `serde_yaml`; [`PipelineConfig::validate`] enforces the positivity
//! constraints a malformed document could otherwise violate.

use crate::pipeline::plugins::PluginConfig;
use audit_pipeline_domain::error::PipelineError;
use serde::Deserialize;
use std::path::PathBuf;

fn default_metrics_prefix() -> String {
    "pipeline".to_string()
}

fn default_recovery_interval() -> u64 {
    30
}

#[derive(Debug, Clone, Deserialize)]
pub struct PluginSpec {
    pub name: String,
    #[serde(default)]
    pub config: PluginConfig,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PluginsConfig {
    #[serde(default)]
    pub exporters: Vec<PluginSpec>,
    #[serde(default)]
    pub filters: Vec<PluginSpec>,
    #[serde(default)]
    pub lifecycles: Vec<PluginSpec>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PipelineConfig {
    pub name: String,
    pub batch_size: usize,
    /// Seconds.
    pub batch_timeout: u64,
    pub storage_dir: PathBuf,
    #[serde(default = "default_metrics_prefix")]
    pub metrics_prefix: String,
    /// Seconds.
    #[serde(default = "default_recovery_interval")]
    pub recovery_interval: u64,
    #[serde(default)]
    pub plugins: PluginsConfig,
}

impl PipelineConfig {
    pub fn validate(&self) -> Result<(), PipelineError> {
        if self.name.trim().is_empty() {
            return Err(PipelineError::InvalidConfiguration("pipeline Name must not be empty".to_string()));
        }
        if self.batch_size == 0 {
            return Err(PipelineError::InvalidConfiguration(format!(
                "pipeline '{}': BatchSize must be positive",
                self.name
            )));
        }
        if self.batch_timeout == 0 {
            return Err(PipelineError::InvalidConfiguration(format!(
                "pipeline '{}': BatchTimeout must be positive",
                self.name
            )));
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
Name: audit-db
BatchSize: 50
BatchTimeout: 5
StorageDir: /var/lib/audit/spill
Plugins:
  Exporters:
    - name: relational
      config:
        database: "#svc.Database"
"#;
        let config: PipelineConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.name, "audit-db");
        assert_eq!(config.batch_size, 50);
        assert_eq!(config.recovery_interval, 30);
        assert_eq!(config.plugins.exporters.len(), 1);
        assert_eq!(config.plugins.exporters[0].config.get("database").unwrap(), "#svc.Database");
    }

    #[test]
    fn rejects_zero_batch_size() {
        let config = PipelineConfig {
            name: "p".to_string(),
            batch_size: 0,
            batch_timeout: 5,
            storage_dir: PathBuf::from("/tmp"),
            metrics_prefix: default_metrics_prefix(),
            recovery_interval: default_recovery_interval(),
            plugins: PluginsConfig::default(),
        };
        assert!(config.validate().is_err());
    }
}
