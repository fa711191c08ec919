// /////////////////////////////////////////////////////////////////////////////
// Adaptive Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # `audit-pipeline` Binary
//!
//! Process entry point. Everything here is orchestration: parse and validate
//! the CLI (`bootstrap`), load and validate the YAML configuration (`core`'s
//! [`AppConfig`]), and for `Run`, build the [`Application`] composition root
//! and drive it until a shutdown signal arrives.

use audit_pipeline_bootstrap::config::BootstrapConfig;
use audit_pipeline_bootstrap::shutdown::ShutdownCoordinator;
use audit_pipeline_bootstrap::signals::create_signal_handler;
use audit_pipeline_bootstrap::{bootstrap_cli, logger, map_error_to_exit_code, platform, ValidatedCommand};
use audit_pipeline_core::application::{default_plugin_registry, Application};
use audit_pipeline_core::infrastructure::AppConfig;
use audit_pipeline_domain::error::PipelineError;
use sqlx::sqlite::SqlitePoolOptions;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
enum BinError {
    #[error("CLI parsing failed: {0}")]
    Cli(#[from] audit_pipeline_bootstrap::cli::ParseError),
    #[error(transparent)]
    Pipeline(#[from] PipelineError),
    #[error("failed to connect to database: {0}")]
    Database(#[from] sqlx::Error),
    #[error("{0}")]
    Logger(String),
}

#[tokio::main]
async fn main() -> std::process::ExitCode {
    let result = run().await;
    map_error_to_exit_code(result)
}

async fn run() -> Result<(), BinError> {
    let cli = bootstrap_cli()?;
    let bootstrap_config = BootstrapConfig::from_env();
    let log_level = cli.log_level.as_deref().unwrap_or(&bootstrap_config.log_level);
    logger::init(log_level).map_err(|e| BinError::Logger(e.to_string()))?;

    match cli.command {
        ValidatedCommand::ValidateConfig { config_path } => {
            AppConfig::from_file(&config_path).await?;
            tracing::info!(path = %config_path.display(), "configuration is valid");
            Ok(())
        }
        ValidatedCommand::Run { config_path } => run_application(config_path, bootstrap_config).await,
    }
}

async fn run_application(
    config_path: std::path::PathBuf,
    bootstrap_config: BootstrapConfig,
) -> Result<(), BinError> {
    let config = AppConfig::from_file(&config_path).await?;

    let database = SqlitePoolOptions::new()
        .max_connections(10)
        .connect(&config.database_url)
        .await?;

    let platform: Arc<dyn platform::Platform> = Arc::from(platform::create_platform());
    let metrics_registry = prometheus::Registry::new();
    let plugins = default_plugin_registry();

    let application = Application::bootstrap(config, database, platform, &metrics_registry, &plugins).await?;
    application.start()?;

    let shutdown = ShutdownCoordinator::new(bootstrap_config.shutdown_grace_period);
    let token = shutdown.token();
    let signal_handler = create_signal_handler();
    tokio::spawn(async move {
        signal_handler
            .wait_for_signal(Box::new(move || shutdown.initiate_shutdown()))
            .await;
    });

    token.cancelled().await;
    tracing::info!("shutdown signal received, draining pipelines and scheduler");
    application.shutdown().await;

    Ok(())
}
