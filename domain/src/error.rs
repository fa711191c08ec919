// /////////////////////////////////////////////////////////////////////////////
// Adaptive Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Error Taxonomy
//!
//! `PipelineError` is the single error enum shared by the pipeline and
//! scheduler engines. It distinguishes the error kinds that show up across
//! both: caller-visible backpressure (`QueueFull`,
//! `PipelineBlocked`, `PipelineNotStarted`), storage failures (`DiskFull`,
//! `FileCreateFailed`, `FileWriteFailed`), and the ambient infrastructure
//! failures (`DatabaseError`, `LockError`, `SerializationError`, `IoError`)
//! that a production crate of this shape always carries.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    /// Push rejected: bounded queue at capacity.
    #[error("pipeline '{0}' queue is full")]
    QueueFull(String),

    /// Push rejected: pipeline state is Blocked.
    #[error("pipeline '{0}' is blocked")]
    PipelineBlocked(String),

    /// Push rejected: Start() has not been called yet.
    #[error("pipeline '{0}' has not been started")]
    PipelineNotStarted(String),

    /// Start() called twice concurrently under strict mode.
    #[error("pipeline '{0}' is already started")]
    AlreadyStarted(String),

    /// LocalStorage.Save found free disk space under the configured floor.
    #[error("disk space below floor while saving spill for exporter '{0}'")]
    DiskFull(String),

    /// Spill file could not be created or opened.
    #[error("failed to create spill file: {0}")]
    FileCreateFailed(String),

    /// A write to an open spill file failed.
    #[error("failed to write spill record: {0}")]
    FileWriteFailed(String),

    /// An exporter's `Export` call returned an error.
    #[error("exporter '{exporter}' failed: {source}")]
    ExporterFailed {
        exporter: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// A named plugin (exporter/filter/lifecycle) was not found in the
    /// registry.
    #[error("no plugin registered under name '{0}'")]
    PluginNotFound(String),

    /// Pipeline/scheduler YAML configuration failed validation.
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// Underlying database error (lease operations, task-row persistence).
    #[error("database error: {0}")]
    DatabaseError(String),

    /// Distributed lock acquisition/renewal/release failed.
    #[error("lock error: {0}")]
    LockError(String),

    /// JSON (de)serialization of an event or spill record failed.
    #[error("serialization error: {0}")]
    SerializationError(String),

    /// Any other I/O failure not covered by a more specific variant.
    #[error("I/O error: {0}")]
    IoError(String),

    /// Catch-all for conditions that should be unreachable in correct
    /// operation (e.g. an expired lease instance with no discoverable
    /// IPv4 address at startup).
    #[error("internal error: {0}")]
    InternalError(String),
}

impl PipelineError {
    /// Whether the caller may reasonably retry the operation that produced
    /// this error (used to decide HTTP status codes at the reporting-API
    /// boundary, which is out of scope for this crate but relies on this
    /// classification).
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            PipelineError::QueueFull(_)
                | PipelineError::PipelineBlocked(_)
                | PipelineError::DiskFull(_)
                | PipelineError::DatabaseError(_)
                | PipelineError::LockError(_)
        )
    }

    /// Coarse category, used for metric labels and log fields.
    pub fn category(&self) -> &'static str {
        match self {
            PipelineError::QueueFull(_) => "queue_full",
            PipelineError::PipelineBlocked(_) => "blocked",
            PipelineError::PipelineNotStarted(_) => "not_started",
            PipelineError::AlreadyStarted(_) => "already_started",
            PipelineError::DiskFull(_) => "disk_full",
            PipelineError::FileCreateFailed(_) => "file_create_failed",
            PipelineError::FileWriteFailed(_) => "file_write_failed",
            PipelineError::ExporterFailed { .. } => "exporter_failed",
            PipelineError::PluginNotFound(_) => "plugin_not_found",
            PipelineError::InvalidConfiguration(_) => "invalid_configuration",
            PipelineError::DatabaseError(_) => "database_error",
            PipelineError::LockError(_) => "lock_error",
            PipelineError::SerializationError(_) => "serialization_error",
            PipelineError::IoError(_) => "io_error",
            PipelineError::InternalError(_) => "internal_error",
        }
    }
}

impl From<std::io::Error> for PipelineError {
    fn from(e: std::io::Error) -> Self {
        PipelineError::IoError(e.to_string())
    }
}

impl From<serde_json::Error> for PipelineError {
    fn from(e: serde_json::Error) -> Self {
        PipelineError::SerializationError(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recoverable_classification() {
        assert!(PipelineError::QueueFull("p".into()).is_recoverable());
        assert!(PipelineError::PipelineBlocked("p".into()).is_recoverable());
        assert!(!PipelineError::InvalidConfiguration("bad".into()).is_recoverable());
    }

    #[test]
    fn category_labels() {
        assert_eq!(PipelineError::DiskFull("db".into()).category(), "disk_full");
        assert_eq!(PipelineError::InternalError("x".into()).category(), "internal_error");
    }
}
