// /////////////////////////////////////////////////////////////////////////////
// Adaptive Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! A lifecycle hook that stamps a flush id into the export context and logs
//! export failures at `warn`.

use super::registry::{LifecycleFactory, PluginConfig};
use crate::infrastructure::capabilities::ServiceCapabilities;
use async_trait::async_trait;
use audit_pipeline_domain::error::PipelineError;
use audit_pipeline_domain::event::Event;
use audit_pipeline_domain::ports::lifecycle_hook::ExportContext;
use audit_pipeline_domain::ports::LifecycleHook;
use std::error::Error as StdError;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::warn;

pub struct LoggingLifecycleHook {
    counter: AtomicU64,
}

impl LoggingLifecycleHook {
    pub fn new() -> Self {
        Self {
            counter: AtomicU64::new(0),
        }
    }
}

impl Default for LoggingLifecycleHook {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LifecycleHook for LoggingLifecycleHook {
    async fn before_export(&self, mut ctx: ExportContext, batch: &[Event]) -> ExportContext {
        let flush_id = self.counter.fetch_add(1, Ordering::Relaxed);
        ctx.insert("flush_id", flush_id.to_string());
        ctx.insert("batch_len", batch.len().to_string());
        ctx
    }

    async fn on_error(&self, ctx: &ExportContext, error: &(dyn StdError + Send + Sync), batch: &[Event]) {
        warn!(
            flush_id = ctx.get("flush_id").unwrap_or("?"),
            batch_len = batch.len(),
            error = %error,
            "export failed"
        );
    }
}

pub struct LoggingLifecycleFactory;

impl LifecycleFactory for LoggingLifecycleFactory {
    fn create(&self, _config: &PluginConfig, _caps: &ServiceCapabilities) -> Result<Arc<dyn LifecycleHook>, PipelineError> {
        Ok(Arc::new(LoggingLifecycleHook::new()))
    }
}
