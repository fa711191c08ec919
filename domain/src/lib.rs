// /////////////////////////////////////////////////////////////////////////////
// Adaptive Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Audit Pipeline Domain
//!
//! Pure domain types for the audit-event delivery pipeline and the
//! distributed task scheduler: the event envelope, the scheduled-task row,
//! the pipeline state machine, the spill-record wire shape, the error
//! taxonomy, and the port traits (`Exporter`, `Filter`, `LifecycleHook`,
//! `Task`, `ScheduledTaskRepository`, `ShardPositionRepository`) that
//! `audit-pipeline-core` implements against.
//!
//! This crate has no I/O and no async runtime dependency beyond
//! `async-trait` for the port signatures themselves; everything here is data
//! and contracts. Concrete engines, storage, and plugins live in
//! `audit-pipeline-core`.

pub mod entities;
pub mod error;
pub mod event;
pub mod ports;
pub mod spill;
pub mod value_objects;

pub use entities::{ScheduledTask, ShardPosition};
pub use error::PipelineError;
pub use event::Event;
pub use ports::{Exporter, Filter, LifecycleHook, ScheduledTaskRepository, ShardPositionRepository, Task};
pub use spill::SpillLine;
pub use value_objects::{ExporterName, PipelineName, PipelineState, TaskName};
