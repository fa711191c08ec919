// /////////////////////////////////////////////////////////////////////////////
// Adaptive Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # CLI Argument Parsing & Validation
//!
//! `clap`-derived surface for the `audit-pipeline` binary, plus the security
//! checks the bootstrap layer is responsible for before any path reaches the
//! application layers: config paths are canonicalized and must exist as
//! regular files, rejecting the symlink/traversal tricks a raw `PathBuf`
//! would silently accept.

use clap::{Parser, Subcommand};
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Parser)]
#[command(name = "audit-pipeline", version, about = "Audit-log delivery pipeline & distributed task scheduler")]
struct RawCli {
    /// Log filter directive (e.g. "info", "audit_pipeline_core=debug,warn").
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: RawCommand,
}

#[derive(Debug, Subcommand)]
enum RawCommand {
    /// Load configuration and run the pipelines + scheduler until shutdown.
    Run {
        /// Path to the top-level YAML configuration file.
        #[arg(long, short = 'c')]
        config: PathBuf,
    },
    /// Load and validate configuration, then exit without running anything.
    ValidateConfig {
        #[arg(long, short = 'c')]
        config: PathBuf,
    },
}

/// A validated, security-checked command ready for the application layer.
#[derive(Debug, Clone)]
pub enum ValidatedCommand {
    Run { config_path: PathBuf },
    ValidateConfig { config_path: PathBuf },
}

#[derive(Debug, Clone)]
pub struct ValidatedCli {
    pub command: ValidatedCommand,
    pub log_level: Option<String>,
}

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("argument parsing failed: {0}")]
    Clap(#[from] clap::Error),
    #[error("config path '{0}' does not exist")]
    ConfigNotFound(String),
    #[error("config path '{0}' is not a regular file")]
    ConfigNotAFile(String),
    #[error("config path '{0}' could not be resolved: {1}")]
    ConfigUnresolvable(String, String),
}

impl fmt::Display for ValidatedCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidatedCommand::Run { config_path } => write!(f, "run({})", config_path.display()),
            ValidatedCommand::ValidateConfig { config_path } => {
                write!(f, "validate-config({})", config_path.display())
            }
        }
    }
}

fn validate_config_path(path: &Path) -> Result<PathBuf, ParseError> {
    let canonical = path
        .canonicalize()
        .map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => ParseError::ConfigNotFound(path.display().to_string()),
            _ => ParseError::ConfigUnresolvable(path.display().to_string(), e.to_string()),
        })?;

    if !canonical.is_file() {
        return Err(ParseError::ConfigNotAFile(canonical.display().to_string()));
    }

    Ok(canonical)
}

/// Parse `std::env::args`, apply security validation, and return a
/// [`ValidatedCli`]. Clap handles `--help`/`--version` by exiting the
/// process before this function returns.
pub fn parse_and_validate() -> Result<ValidatedCli, ParseError> {
    let raw = RawCli::try_parse()?;
    validate(raw)
}

fn validate(raw: RawCli) -> Result<ValidatedCli, ParseError> {
    let command = match raw.command {
        RawCommand::Run { config } => ValidatedCommand::Run {
            config_path: validate_config_path(&config)?,
        },
        RawCommand::ValidateConfig { config } => ValidatedCommand::ValidateConfig {
            config_path: validate_config_path(&config)?,
        },
    };

    Ok(ValidatedCli {
        command,
        log_level: raw.log_level,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn rejects_missing_config_file() {
        let err = validate_config_path(Path::new("/no/such/path/config.yaml")).unwrap_err();
        assert!(matches!(err, ParseError::ConfigNotFound(_)));
    }

    #[test]
    fn accepts_existing_regular_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "pipelines: []").unwrap();
        let resolved = validate_config_path(file.path()).unwrap();
        assert!(resolved.is_file());
    }

    #[test]
    fn rejects_directory_as_config() {
        let dir = tempfile::tempdir().unwrap();
        let err = validate_config_path(dir.path()).unwrap_err();
        assert!(matches!(err, ParseError::ConfigNotAFile(_)));
    }

    #[test]
    fn parses_run_command() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "pipelines: []").unwrap();
        let raw = RawCli::try_parse_from([
            "audit-pipeline",
            "run",
            "--config",
            file.path().to_str().unwrap(),
        ])
        .unwrap();
        let validated = validate(raw).unwrap();
        assert!(matches!(validated.command, ValidatedCommand::Run { .. }));
    }
}
