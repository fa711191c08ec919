// /////////////////////////////////////////////////////////////////////////////
// Adaptive Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Event Envelope
//!
//! An `Event` is an opaque payload as far as the pipeline is concerned: the
//! engine batches, filters, and spills events without ever inspecting their
//! contents beyond the one stable identity field (`log_id`) used for sink
//! dedupe. Exporters, filters, and lifecycle hooks are free to interpret the
//! wrapped JSON body however their sink requires.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A single audit-log event, as accepted by `Pipeline::push`.
///
/// Ownership passes to the pipeline the instant `push` returns `Ok`; the
/// event is not "returned" to the caller again. It either reaches an
/// exporter, lands in a spill file, or (while the pipeline is Blocked) sits
/// in the in-memory block buffer until the next recovery tick spills it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Event {
    /// Stable identity used for at-least-once dedupe at the sink.
    pub log_id: String,
    /// Tenant this event belongs to. The pipeline never branches on this
    /// field; it exists purely so exporters/filters can make tenancy
    /// decisions (tenancy is explicitly an event field only, not a
    /// pipeline-level isolation boundary).
    #[serde(default)]
    pub tenant: String,
    /// Opaque body. Exporters own its shape.
    pub body: Value,
}

impl Event {
    pub fn new(log_id: impl Into<String>, body: Value) -> Self {
        Self {
            log_id: log_id.into(),
            tenant: String::new(),
            body,
        }
    }

    pub fn with_tenant(mut self, tenant: impl Into<String>) -> Self {
        self.tenant = tenant.into();
        self
    }
}
