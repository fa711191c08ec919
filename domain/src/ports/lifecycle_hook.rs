// /////////////////////////////////////////////////////////////////////////////
// Adaptive Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! Observer invoked around a flush: once before export (may enrich the
//! export context), and once per export error (side effects only).

use crate::event::Event;
use async_trait::async_trait;
use std::collections::HashMap;
use std::error::Error as StdError;

/// The value threaded through a flush's hook chain: an owned, cloneable
/// key-value map rather than reflection over an opaque bag, so hooks can
/// enrich it for downstream hooks without a shared mutable context object.
#[derive(Debug, Clone, Default)]
pub struct ExportContext {
    values: HashMap<String, String>,
}

impl ExportContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.values.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }
}

#[async_trait]
pub trait LifecycleHook: Send + Sync {
    /// Runs before the filter chain/fan-out, in registration order. May
    /// return an enriched context; hooks observe each other's enrichment
    /// within the same flush.
    async fn before_export(&self, ctx: ExportContext, batch: &[Event]) -> ExportContext {
        let _ = batch;
        ctx
    }

    /// Runs once per exporter failure during `handle_export_error`.
    /// Side-effects only — the return value is unused and a panic here is
    /// contained by the caller.
    async fn on_error(
        &self,
        ctx: &ExportContext,
        error: &(dyn StdError + Send + Sync),
        batch: &[Event],
    ) {
        let _ = (ctx, error, batch);
    }
}
