// /////////////////////////////////////////////////////////////////////////////
// Adaptive Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Infrastructure
//!
//! Adapters the domain ports are implemented against: sqlx-backed
//! persistence ([`sqlite_repository`]), YAML configuration loading
//! ([`config`]), and the typed capability bag plugin factories resolve
//! `#svc.*` references through ([`capabilities`]).

pub mod capabilities;
pub mod config;
pub mod sqlite_repository;

pub use capabilities::ServiceCapabilities;
pub use config::AppConfig;
pub use sqlite_repository::{SqliteScheduledTaskRepository, SqliteShardPositionRepository};
