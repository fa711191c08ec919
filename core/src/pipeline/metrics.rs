// /////////////////////////////////////////////////////////////////////////////
// Adaptive Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Metrics
//!
//! Labeled counters/gauges/histograms exposed to an external `prometheus`
//! [`Registry`] (injected at construction, never a process-wide global,
//! for the same reason the plugin registry is injected rather than
//! global).

use prometheus::{HistogramVec, IntCounterVec, IntGaugeVec, Opts, Registry};

pub struct PipelineMetrics {
    pub queue_size: IntGaugeVec,
    pub export_success_total: IntCounterVec,
    pub export_errors_total: IntCounterVec,
    pub export_attempts_total: IntCounterVec,
    pub local_storage_bytes: IntGaugeVec,
    pub export_latency_seconds: HistogramVec,
    pub state_transitions_total: IntCounterVec,
    pub recovery_attempts_total: IntCounterVec,
    pub recovery_errors_total: IntCounterVec,
    pub recovered_items_total: IntCounterVec,
}

impl PipelineMetrics {
    /// Register every metric under `prefix` (e.g. `MetricsPrefix` from the
    /// pipeline YAML config) against `registry`. Panics only on a
    /// duplicate-registration programmer error (two `PipelineMetrics`
    /// built against the same registry + prefix), which `new` surfaces as
    /// `Result` rather than panicking, unlike process-wide global metrics.
    pub fn new(prefix: &str, registry: &Registry) -> Result<Self, prometheus::Error> {
        let name = |suffix: &str| format!("{prefix}_{suffix}");

        let queue_size = IntGaugeVec::new(Opts::new(name("queue_size"), "current queue depth"), &["queue"])?;
        let export_success_total = IntCounterVec::new(
            Opts::new(name("export_success_total"), "successful exporter invocations"),
            &["exporter"],
        )?;
        let export_errors_total = IntCounterVec::new(
            Opts::new(name("export_errors_total"), "failed exporter invocations"),
            &["exporter"],
        )?;
        let export_attempts_total = IntCounterVec::new(
            Opts::new(name("export_attempts_total"), "total exporter invocations attempted"),
            &["exporter"],
        )?;
        let local_storage_bytes = IntGaugeVec::new(
            Opts::new(name("local_storage_bytes"), "bytes written to spill storage"),
            &["exporter"],
        )?;
        let export_latency_seconds = HistogramVec::new(
            prometheus::HistogramOpts::new(name("export_latency_seconds"), "exporter call latency"),
            &["exporter"],
        )?;
        let state_transitions_total = IntCounterVec::new(
            Opts::new(name("state_transitions_total"), "pipeline state machine transitions"),
            &["pipeline", "transition"],
        )?;
        let recovery_attempts_total = IntCounterVec::new(
            Opts::new(name("recovery_attempts_total"), "recovery monitor ticks that attempted a replay"),
            &["pipeline"],
        )?;
        let recovery_errors_total = IntCounterVec::new(
            Opts::new(name("recovery_errors_total"), "recovery replay failures"),
            &["pipeline"],
        )?;
        let recovered_items_total = IntCounterVec::new(
            Opts::new(name("recovered_items_total"), "events successfully replayed from spill"),
            &["pipeline"],
        )?;

        registry.register(Box::new(queue_size.clone()))?;
        registry.register(Box::new(export_success_total.clone()))?;
        registry.register(Box::new(export_errors_total.clone()))?;
        registry.register(Box::new(export_attempts_total.clone()))?;
        registry.register(Box::new(local_storage_bytes.clone()))?;
        registry.register(Box::new(export_latency_seconds.clone()))?;
        registry.register(Box::new(state_transitions_total.clone()))?;
        registry.register(Box::new(recovery_attempts_total.clone()))?;
        registry.register(Box::new(recovery_errors_total.clone()))?;
        registry.register(Box::new(recovered_items_total.clone()))?;

        Ok(Self {
            queue_size,
            export_success_total,
            export_errors_total,
            export_attempts_total,
            local_storage_bytes,
            export_latency_seconds,
            state_transitions_total,
            recovery_attempts_total,
            recovery_errors_total,
            recovered_items_total,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registers_without_name_collisions() {
        let registry = Registry::new();
        let metrics = PipelineMetrics::new("audit", &registry).unwrap();
        metrics.queue_size.with_label_values(&["audit-db"]).set(3);
        assert_eq!(metrics.queue_size.with_label_values(&["audit-db"]).get(), 3);
    }
}
