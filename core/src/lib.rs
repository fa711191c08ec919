// /////////////////////////////////////////////////////////////////////////////
// Adaptive Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Audit Pipeline Core
//!
//! The two engines this crate exists for:
//!
//! - [`pipeline`] — a per-destination batching delivery engine: bounded
//!   queue, filter/lifecycle plugin chain, parallel exporter fan-out,
//!   disk spill on failure, and background recovery.
//! - [`scheduler`] — a hierarchical time wheel feeding a priority queue of
//!   runnable tasks, coordinated across replicas by a leased
//!   database-backed mutex, with a per-task circuit breaker.
//!
//! [`infrastructure`] supplies the sqlx-backed repository, YAML
//! configuration loading, and the typed capability bag plugin factories are
//! constructed from. [`application`] is a thin composition layer that wires
//! configuration, the plugin registry, and capabilities into running
//! pipelines and a registered scheduler — the orchestration a hosting
//! process (see `audit-pipeline-bootstrap`) drives directly.

pub mod application;
pub mod infrastructure;
pub mod pipeline;
pub mod scheduler;

pub use audit_pipeline_domain as domain;
