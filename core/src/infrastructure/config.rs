// /////////////////////////////////////////////////////////////////////////////
// Adaptive Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Application Configuration
//!
//! The top-level YAML document a hosting process loads: a list of pipeline
//! configs plus one scheduler tuning section. Loaded with
//! `serde_yaml` directly; the `config` crate remains available in the
//! workspace dependency set for a host that wants to layer environment
//! overrides on top of the parsed document.

use crate::pipeline::config::PipelineConfig;
use crate::scheduler::config::ScheduleConfig;
use audit_pipeline_domain::error::PipelineError;
use serde::Deserialize;
use std::path::Path;

fn default_database_url() -> String {
    "sqlite://audit-pipeline.db".to_string()
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct AppConfig {
    pub pipelines: Vec<PipelineConfig>,
    pub schedule: ScheduleConfig,
    /// `sqlx` connection URL backing the scheduler's lease/position tables
    /// and any `#svc.Database`-capable plugin. Defaults to a local file so
    /// `ValidateConfig` documents don't need to carry one.
    #[serde(default = "default_database_url")]
    pub database_url: String,
}

impl AppConfig {
    pub fn from_yaml_str(yaml: &str) -> Result<Self, PipelineError> {
        let config: Self = serde_yaml::from_str(yaml)
            .map_err(|e| PipelineError::InvalidConfiguration(format!("failed to parse configuration: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    pub async fn from_file(path: &Path) -> Result<Self, PipelineError> {
        let contents = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| PipelineError::InvalidConfiguration(format!("failed to read '{}': {e}", path.display())))?;
        Self::from_yaml_str(&contents)
    }

    pub fn validate(&self) -> Result<(), PipelineError> {
        if self.pipelines.is_empty() {
            return Err(PipelineError::InvalidConfiguration(
                "configuration must declare at least one pipeline".to_string(),
            ));
        }
        for pipeline in &self.pipelines {
            pipeline.validate()?;
        }
        self.schedule.validate()?;
        Ok(())
    }
}
