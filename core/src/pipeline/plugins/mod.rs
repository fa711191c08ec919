// /////////////////////////////////////////////////////////////////////////////
// Adaptive Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Plugin Contracts & Registry
//!
//! A name-indexed set of factories producing [`Exporter`]/[`Filter`]/
//! [`LifecycleHook`] instances from a config mapping. A single
//! [`PluginRegistry`] is built once through [`PluginRegistryBuilder`] and
//! injected wherever pipelines are constructed — not a process-wide map
//! populated by side-effecting registration calls.

pub mod console_exporter;
pub mod logging_lifecycle;
pub mod registry;
pub mod relational_exporter;
pub mod tenant_filter;

pub use registry::{ExporterFactory, FilterFactory, LifecycleFactory, PluginConfig, PluginRegistry, PluginRegistryBuilder};
