// /////////////////////////////////////////////////////////////////////////////
// Adaptive Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

use crate::infrastructure::capabilities::ServiceCapabilities;
use audit_pipeline_domain::error::PipelineError;
use audit_pipeline_domain::ports::{Exporter, Filter, LifecycleHook};
use std::collections::HashMap;
use std::sync::Arc;

/// A plugin's `config` block from the pipeline YAML: a string-keyed
/// mapping of scalar values, some of which may be `#svc.<Field>`
/// references resolved against [`ServiceCapabilities`].
pub type PluginConfig = HashMap<String, String>;

pub trait ExporterFactory: Send + Sync {
    fn create(&self, config: &PluginConfig, caps: &ServiceCapabilities) -> Result<Arc<dyn Exporter>, PipelineError>;
}

pub trait FilterFactory: Send + Sync {
    fn create(&self, config: &PluginConfig, caps: &ServiceCapabilities) -> Result<Arc<dyn Filter>, PipelineError>;
}

pub trait LifecycleFactory: Send + Sync {
    fn create(&self, config: &PluginConfig, caps: &ServiceCapabilities) -> Result<Arc<dyn LifecycleHook>, PipelineError>;
}

/// Name-indexed factories, built once and handed to every pipeline that
/// needs to construct plugins from its YAML config.
pub struct PluginRegistry {
    exporters: HashMap<String, Box<dyn ExporterFactory>>,
    filters: HashMap<String, Box<dyn FilterFactory>>,
    lifecycles: HashMap<String, Box<dyn LifecycleFactory>>,
}

impl PluginRegistry {
    pub fn builder() -> PluginRegistryBuilder {
        PluginRegistryBuilder::default()
    }

    pub fn create_exporter(
        &self,
        name: &str,
        config: &PluginConfig,
        caps: &ServiceCapabilities,
    ) -> Result<Arc<dyn Exporter>, PipelineError> {
        self.exporters
            .get(name)
            .ok_or_else(|| PipelineError::PluginNotFound(name.to_string()))?
            .create(config, caps)
    }

    pub fn create_filter(
        &self,
        name: &str,
        config: &PluginConfig,
        caps: &ServiceCapabilities,
    ) -> Result<Arc<dyn Filter>, PipelineError> {
        self.filters
            .get(name)
            .ok_or_else(|| PipelineError::PluginNotFound(name.to_string()))?
            .create(config, caps)
    }

    pub fn create_lifecycle(
        &self,
        name: &str,
        config: &PluginConfig,
        caps: &ServiceCapabilities,
    ) -> Result<Arc<dyn LifecycleHook>, PipelineError> {
        self.lifecycles
            .get(name)
            .ok_or_else(|| PipelineError::PluginNotFound(name.to_string()))?
            .create(config, caps)
    }
}

#[derive(Default)]
pub struct PluginRegistryBuilder {
    exporters: HashMap<String, Box<dyn ExporterFactory>>,
    filters: HashMap<String, Box<dyn FilterFactory>>,
    lifecycles: HashMap<String, Box<dyn LifecycleFactory>>,
}

impl PluginRegistryBuilder {
    pub fn with_exporter(mut self, name: impl Into<String>, factory: impl ExporterFactory + 'static) -> Self {
        self.exporters.insert(name.into(), Box::new(factory));
        self
    }

    pub fn with_filter(mut self, name: impl Into<String>, factory: impl FilterFactory + 'static) -> Self {
        self.filters.insert(name.into(), Box::new(factory));
        self
    }

    pub fn with_lifecycle(mut self, name: impl Into<String>, factory: impl LifecycleFactory + 'static) -> Self {
        self.lifecycles.insert(name.into(), Box::new(factory));
        self
    }

    pub fn build(self) -> PluginRegistry {
        PluginRegistry {
            exporters: self.exporters,
            filters: self.filters,
            lifecycles: self.lifecycles,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_plugin_name_is_reported() {
        let registry = PluginRegistry::builder().build();
        let caps = ServiceCapabilities::new(
            sqlx::sqlite::SqlitePoolOptions::new()
                .connect_lazy("sqlite::memory:")
                .unwrap(),
        );
        let err = registry.create_exporter("nope", &PluginConfig::new(), &caps).unwrap_err();
        assert!(matches!(err, PipelineError::PluginNotFound(name) if name == "nope"));
    }
}
