// /////////////////////////////////////////////////////////////////////////////
// Adaptive Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! A trivial exporter that logs each batch and always succeeds. Useful for
//! local development and smoke tests.

use super::registry::{ExporterFactory, PluginConfig};
use crate::infrastructure::capabilities::ServiceCapabilities;
use async_trait::async_trait;
use audit_pipeline_domain::error::PipelineError;
use audit_pipeline_domain::event::Event;
use audit_pipeline_domain::ports::Exporter;
use std::error::Error as StdError;
use std::sync::Arc;
use tracing::info;

pub struct ConsoleExporter {
    name: String,
}

impl ConsoleExporter {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

#[async_trait]
impl Exporter for ConsoleExporter {
    fn name(&self) -> &str {
        &self.name
    }

    async fn export(&self, events: &[Event]) -> Result<(), Box<dyn StdError + Send + Sync>> {
        info!(exporter = %self.name, count = events.len(), "exporting batch to console");
        for event in events {
            println!("[{}] {} {}", self.name, event.log_id, event.body);
        }
        Ok(())
    }
}

pub struct ConsoleExporterFactory;

impl ExporterFactory for ConsoleExporterFactory {
    fn create(&self, config: &PluginConfig, _caps: &ServiceCapabilities) -> Result<Arc<dyn Exporter>, PipelineError> {
        let name = config
            .get("name")
            .cloned()
            .unwrap_or_else(|| "console".to_string());
        Ok(Arc::new(ConsoleExporter::new(name)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn always_succeeds() {
        let exporter = ConsoleExporter::new("console");
        let events = vec![Event::new("1", json!({"a": 1}))];
        assert!(exporter.export(&events).await.is_ok());
    }
}
