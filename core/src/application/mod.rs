// /////////////////////////////////////////////////////////////////////////////
// Adaptive Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Composition Root
//!
//! Wires [`AppConfig`], [`ServiceCapabilities`], the default [`PluginRegistry`],
//! a `Platform`, and a `prometheus::Registry` into running `Pipeline`s and a
//! registered `Scheduler`. This is the thin layer `bootstrap`'s `Run` command
//! drives directly; `ValidateConfig` only needs [`AppConfig::from_file`].

use crate::infrastructure::config::AppConfig;
use crate::infrastructure::sqlite_repository::{SqliteScheduledTaskRepository, SqliteShardPositionRepository};
use crate::infrastructure::ServiceCapabilities;
use crate::pipeline::plugins::console_exporter::ConsoleExporterFactory;
use crate::pipeline::plugins::logging_lifecycle::LoggingLifecycleFactory;
use crate::pipeline::plugins::relational_exporter::RelationalExporterFactory;
use crate::pipeline::plugins::tenant_filter::TenantFilterFactory;
use crate::pipeline::plugins::PluginRegistry;
use crate::pipeline::Pipeline;
use crate::scheduler::tasks::TableRotationTask;
use crate::scheduler::Scheduler;
use audit_pipeline_bootstrap::platform::Platform;
use audit_pipeline_domain::error::PipelineError;
use audit_pipeline_domain::ports::ShardPositionRepository;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// The default set of reference plugins every hosting process gets for
/// free, registered under the names a pipeline's YAML config refers to
/// them by.
pub fn default_plugin_registry() -> PluginRegistry {
    PluginRegistry::builder()
        .with_exporter("console", ConsoleExporterFactory)
        .with_exporter("relational", RelationalExporterFactory)
        .with_filter("tenant", TenantFilterFactory)
        .with_lifecycle("logging", LoggingLifecycleFactory)
        .build()
}

/// A running instance of every pipeline plus the scheduler, ready to accept
/// events and shut down together.
pub struct Application {
    pipelines: Vec<Arc<Pipeline>>,
    scheduler: Arc<Scheduler>,
}

impl Application {
    pub async fn bootstrap(
        config: AppConfig,
        database: sqlx::SqlitePool,
        platform: Arc<dyn Platform>,
        metrics_registry: &prometheus::Registry,
        registry: &PluginRegistry,
    ) -> Result<Self, PipelineError> {
        let task_repo = Arc::new(SqliteScheduledTaskRepository::new(database.clone()));
        task_repo.migrate().await?;
        let sqlite_shard_repo = SqliteShardPositionRepository::new(database.clone());
        sqlite_shard_repo.migrate().await?;
        let shard_repo: Arc<dyn ShardPositionRepository> = Arc::new(sqlite_shard_repo);

        let capabilities = ServiceCapabilities::new(database);

        let mut pipelines = Vec::with_capacity(config.pipelines.len());
        for pipeline_config in config.pipelines {
            let pipeline = Pipeline::new(pipeline_config, registry, &capabilities, Arc::clone(&platform), metrics_registry)?;
            info!(pipeline = pipeline.name().as_str(), "pipeline constructed");
            pipelines.push(pipeline);
        }

        let scheduler = Scheduler::new(
            task_repo,
            config.schedule.fail_threshold,
            config.schedule.isolate_duration,
            config.schedule.lease_duration,
            config.schedule.slot_count,
            Duration::from_millis(config.schedule.tick_interval_ms),
        )?;

        // One task walking every monitored entity's shard pointer, rather
        // than one task per entity — the row-count check and rotation
        // happen inside `TableRotationTask::run` itself.
        let rotation_task = Arc::new(TableRotationTask::new("rotate-shards", 0, 3600, shard_repo));
        scheduler.register_task(rotation_task).await?;

        Ok(Self { pipelines, scheduler })
    }

    pub fn start(&self) -> Result<(), PipelineError> {
        for pipeline in &self.pipelines {
            pipeline.start()?;
        }
        self.scheduler.start();
        Ok(())
    }

    pub fn pipeline(&self, name: &str) -> Option<&Arc<Pipeline>> {
        self.pipelines.iter().find(|p| p.name().as_str() == name)
    }

    pub async fn shutdown(&self) {
        self.scheduler.stop().await;
        for pipeline in &self.pipelines {
            pipeline.close().await;
        }
    }
}
