// /////////////////////////////////////////////////////////////////////////////
// Adaptive Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Pipeline
//!
//! The batching delivery engine: bounded queue, a single batcher worker, a
//! single recovery-monitor worker, parallel exporter fan-out per flush, and
//! the three-state machine (`Normal`/`Recovering`/`Blocked`) that governs
//! backpressure and spill behavior.
//!
//! On exporter failure the *pre-filter* batch is what gets spilled, while
//! the *filtered* batch is what was sent to the exporter. Recovery replays
//! a named exporter's spilled batch straight to `Exporter::export`,
//! bypassing the filter chain — the filtered view was already computed
//! once and is not itself persisted.

use crate::infrastructure::capabilities::ServiceCapabilities;
use crate::pipeline::config::PipelineConfig;
use crate::pipeline::local_storage::LocalStorage;
use crate::pipeline::metrics::PipelineMetrics;
use crate::pipeline::plugins::registry::PluginRegistry;
use crate::pipeline::state::AtomicPipelineState;
use audit_pipeline_bootstrap::platform::Platform;
use audit_pipeline_bootstrap::shutdown::ShutdownCoordinator;
use audit_pipeline_domain::error::PipelineError;
use audit_pipeline_domain::event::Event;
use audit_pipeline_domain::ports::lifecycle_hook::ExportContext;
use audit_pipeline_domain::ports::{Exporter, Filter, LifecycleHook};
use audit_pipeline_domain::spill::SpillLine;
use audit_pipeline_domain::value_objects::{PipelineName, PipelineState};
use futures::FutureExt;
use parking_lot::Mutex;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// Routing key under which the Blocked-state in-memory buffer is spilled.
/// Never collides with a real exporter name because `ExporterName` rejects
/// the empty string and this is not a valid config value either.
const BLOCK_DATA_SENTINEL: &str = "__block_data__";

/// Render a caught panic payload for a log line, the same downcast dance
/// `scheduler::engine::run_task` uses for `task.run()` panics.
fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    panic
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| panic.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "lifecycle hook panicked".to_string())
}

pub struct Pipeline {
    name: PipelineName,
    batch_size: usize,
    batch_timeout: Duration,
    recovery_interval: Duration,
    state: AtomicPipelineState,
    started: AtomicBool,
    tx: mpsc::Sender<Event>,
    rx: Mutex<Option<mpsc::Receiver<Event>>>,
    storage: Arc<LocalStorage>,
    exporters: Vec<Arc<dyn Exporter>>,
    filters: Vec<Arc<dyn Filter>>,
    lifecycles: Vec<Arc<dyn LifecycleHook>>,
    metrics: Arc<PipelineMetrics>,
    block_data: Mutex<Vec<Event>>,
    shutdown: ShutdownCoordinator,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl Pipeline {
    pub fn new(
        config: PipelineConfig,
        registry: &PluginRegistry,
        capabilities: &ServiceCapabilities,
        platform: Arc<dyn Platform>,
        metrics_registry: &prometheus::Registry,
    ) -> Result<Arc<Self>, PipelineError> {
        config.validate()?;
        let name = PipelineName::new(config.name.clone())?;

        let exporters = config
            .plugins
            .exporters
            .iter()
            .map(|spec| registry.create_exporter(&spec.name, &spec.config, capabilities))
            .collect::<Result<Vec<_>, _>>()?;
        let filters = config
            .plugins
            .filters
            .iter()
            .map(|spec| registry.create_filter(&spec.name, &spec.config, capabilities))
            .collect::<Result<Vec<_>, _>>()?;
        let lifecycles = config
            .plugins
            .lifecycles
            .iter()
            .map(|spec| registry.create_lifecycle(&spec.name, &spec.config, capabilities))
            .collect::<Result<Vec<_>, _>>()?;

        let storage = Arc::new(LocalStorage::new(config.storage_dir.clone(), config.batch_size, platform));
        let metrics = Arc::new(
            PipelineMetrics::new(&config.metrics_prefix, metrics_registry)
                .map_err(|e| PipelineError::InvalidConfiguration(format!("metrics registration failed: {e}")))?,
        );

        let (tx, rx) = mpsc::channel(config.batch_size.max(1) * 10);

        Ok(Arc::new(Self {
            name,
            batch_size: config.batch_size,
            batch_timeout: Duration::from_secs(config.batch_timeout),
            recovery_interval: Duration::from_secs(config.recovery_interval),
            state: AtomicPipelineState::default(),
            started: AtomicBool::new(false),
            tx,
            rx: Mutex::new(Some(rx)),
            storage,
            exporters,
            filters,
            lifecycles,
            metrics,
            block_data: Mutex::new(Vec::new()),
            shutdown: ShutdownCoordinator::default(),
            workers: Mutex::new(Vec::new()),
        }))
    }

    pub fn name(&self) -> &PipelineName {
        &self.name
    }

    pub fn state(&self) -> PipelineState {
        self.state.load()
    }

    /// Idempotent: a second call is a silent no-op. Use [`Self::start_strict`]
    /// when the caller needs `AlreadyStarted` surfaced instead.
    pub fn start(self: &Arc<Self>) -> Result<(), PipelineError> {
        self.start_with(false)
    }

    pub fn start_strict(self: &Arc<Self>) -> Result<(), PipelineError> {
        self.start_with(true)
    }

    fn start_with(self: &Arc<Self>, strict: bool) -> Result<(), PipelineError> {
        if self.started.swap(true, Ordering::SeqCst) {
            return if strict {
                Err(PipelineError::AlreadyStarted(self.name.to_string()))
            } else {
                Ok(())
            };
        }

        let rx = self
            .rx
            .lock()
            .take()
            .expect("receiver is only taken once, guarded by `started`");

        let batcher = tokio::spawn(Arc::clone(self).run_batcher(rx));
        let recovery = tokio::spawn(Arc::clone(self).run_recovery_monitor());
        self.workers.lock().extend([batcher, recovery]);
        Ok(())
    }

    /// Non-blocking enqueue. Capacity is `batch_size * 10`.
    pub fn push(&self, event: Event) -> Result<(), PipelineError> {
        if !self.started.load(Ordering::SeqCst) {
            return Err(PipelineError::PipelineNotStarted(self.name.to_string()));
        }
        if self.state.load() == PipelineState::Blocked {
            return Err(PipelineError::PipelineBlocked(self.name.to_string()));
        }

        match self.tx.try_send(event) {
            Ok(()) => {
                self.metrics.queue_size.with_label_values(&[self.name.as_str()]).inc();
                Ok(())
            }
            Err(mpsc::error::TrySendError::Full(_)) => Err(PipelineError::QueueFull(self.name.to_string())),
            Err(mpsc::error::TrySendError::Closed(_)) => Err(PipelineError::PipelineNotStarted(self.name.to_string())),
        }
    }

    /// Idempotent shutdown: cancels the workers, waits for the batcher to
    /// drain and the recovery monitor to exit, then closes storage.
    pub async fn close(&self) {
        if self.shutdown.is_shutting_down() {
            return;
        }
        self.shutdown.initiate_shutdown();

        let handles: Vec<_> = self.workers.lock().drain(..).collect();
        for handle in handles {
            let _ = handle.await;
        }
        self.storage.close();
    }

    async fn run_batcher(self: Arc<Self>, mut rx: mpsc::Receiver<Event>) {
        let mut batch: Vec<Event> = Vec::with_capacity(self.batch_size);
        let token = self.shutdown.token();
        let sleep = tokio::time::sleep(self.batch_timeout);
        tokio::pin!(sleep);

        loop {
            tokio::select! {
                _ = token.cancelled() => {
                    while let Ok(event) = rx.try_recv() {
                        self.metrics.queue_size.with_label_values(&[self.name.as_str()]).dec();
                        batch.push(event);
                    }
                    if !batch.is_empty() {
                        self.flush_batch(std::mem::take(&mut batch)).await;
                    }
                    return;
                }
                received = rx.recv() => {
                    match received {
                        Some(event) => {
                            self.metrics.queue_size.with_label_values(&[self.name.as_str()]).dec();
                            batch.push(event);
                            if batch.len() >= self.batch_size {
                                self.flush_batch(std::mem::take(&mut batch)).await;
                                sleep.as_mut().reset(tokio::time::Instant::now() + self.batch_timeout);
                            }
                        }
                        None => {
                            if !batch.is_empty() {
                                self.flush_batch(std::mem::take(&mut batch)).await;
                            }
                            return;
                        }
                    }
                }
                _ = &mut sleep => {
                    // Re-armed unconditionally, even over an empty batch — a
                    // deliberate heartbeat rather than a timer only reset by
                    // actual traffic.
                    if !batch.is_empty() {
                        self.flush_batch(std::mem::take(&mut batch)).await;
                    }
                    sleep.as_mut().reset(tokio::time::Instant::now() + self.batch_timeout);
                }
            }
        }
    }

    async fn flush_batch(&self, batch: Vec<Event>) {
        if batch.is_empty() {
            return;
        }

        if self.state.load() == PipelineState::Blocked {
            self.block_data.lock().extend(batch);
            return;
        }

        let mut ctx = ExportContext::new();
        for hook in &self.lifecycles {
            ctx = match AssertUnwindSafe(hook.before_export(ctx.clone(), &batch)).catch_unwind().await {
                Ok(enriched) => enriched,
                Err(panic) => {
                    warn!(
                        pipeline = self.name.as_str(),
                        error = %panic_message(&panic),
                        "lifecycle hook before_export panicked; contained"
                    );
                    ctx
                }
            };
        }

        let filtered: Vec<Event> = batch
            .iter()
            .filter(|event| self.filters.iter().all(|f| f.keep(event)))
            .cloned()
            .collect();

        let mut set = tokio::task::JoinSet::new();
        for exporter in &self.exporters {
            let exporter = Arc::clone(exporter);
            let filtered = filtered.clone();
            let metrics = Arc::clone(&self.metrics);
            set.spawn(async move {
                metrics.export_attempts_total.with_label_values(&[exporter.name()]).inc();
                let started = std::time::Instant::now();
                let result = exporter.export(&filtered).await;
                metrics
                    .export_latency_seconds
                    .with_label_values(&[exporter.name()])
                    .observe(started.elapsed().as_secs_f64());
                (exporter.name().to_string(), result)
            });
        }

        while let Some(joined) = set.join_next().await {
            let (exporter_name, result) = match joined {
                Ok(pair) => pair,
                Err(join_error) => {
                    warn!(pipeline = self.name.as_str(), error = %join_error, "exporter task panicked; contained");
                    continue;
                }
            };

            match result {
                Ok(()) => {
                    self.metrics.export_success_total.with_label_values(&[&exporter_name]).inc();
                }
                Err(error) => {
                    self.metrics.export_errors_total.with_label_values(&[&exporter_name]).inc();
                    self.handle_export_error(&exporter_name, &batch).await;
                    for hook in &self.lifecycles {
                        let outcome = AssertUnwindSafe(hook.on_error(&ctx, error.as_ref(), &batch))
                            .catch_unwind()
                            .await;
                        if let Err(panic) = outcome {
                            warn!(
                                pipeline = self.name.as_str(),
                                error = %panic_message(&panic),
                                "lifecycle hook on_error panicked; contained"
                            );
                        }
                    }
                }
            }
        }
    }

    async fn handle_export_error(&self, exporter_name: &str, batch: &[Event]) {
        match self.storage.save(exporter_name, batch).await {
            Ok(bytes) => {
                self.metrics
                    .local_storage_bytes
                    .with_label_values(&[exporter_name])
                    .add(bytes as i64);
                if self.state.load() == PipelineState::Normal {
                    self.transition(PipelineState::Recovering);
                }
            }
            Err(PipelineError::DiskFull(_)) => {
                self.transition(PipelineState::Blocked);
            }
            Err(e) => {
                warn!(pipeline = self.name.as_str(), exporter = exporter_name, error = %e, "failed to spill batch; dropping");
            }
        }
    }

    async fn run_recovery_monitor(self: Arc<Self>) {
        let token = self.shutdown.token();
        let mut ticker = tokio::time::interval(self.recovery_interval);
        ticker.tick().await; // first tick fires immediately; consume it

        loop {
            tokio::select! {
                _ = token.cancelled() => return,
                _ = ticker.tick() => {
                    match self.state.load() {
                        PipelineState::Normal => {}
                        PipelineState::Recovering => self.try_recover_from_disk().await,
                        PipelineState::Blocked => self.try_spill_block_data().await,
                    }
                }
            }
        }
    }

    async fn try_spill_block_data(&self) {
        let batch = {
            let mut guard = self.block_data.lock();
            if guard.is_empty() {
                return;
            }
            std::mem::take(&mut *guard)
        };

        match self.storage.save(BLOCK_DATA_SENTINEL, &batch).await {
            Ok(bytes) => {
                self.metrics
                    .local_storage_bytes
                    .with_label_values(&[BLOCK_DATA_SENTINEL])
                    .add(bytes as i64);
                self.transition(PipelineState::Recovering);
            }
            Err(_) => {
                // Still full: put it back for the next tick.
                self.block_data.lock().extend(batch);
            }
        }
    }

    async fn try_recover_from_disk(&self) {
        self.metrics.recovery_attempts_total.with_label_values(&[self.name.as_str()]).inc();

        let mut rx = self.storage.recover();
        let mut current_file_ok = true;
        let mut replayed_any = false;
        let mut failed_any = false;

        while let Some(item) = rx.recv().await {
            match item {
                Ok(SpillLine::Data(record)) => {
                    let replay_result: Result<(), String> = if record.name == BLOCK_DATA_SENTINEL {
                        self.flush_batch(record.data.clone()).await;
                        Ok(())
                    } else if let Some(exporter) = self.exporters.iter().find(|e| e.name() == record.name) {
                        exporter.export(&record.data).await.map_err(|e| e.to_string())
                    } else {
                        Err(format!("no exporter registered under name '{}'", record.name))
                    };

                    match replay_result {
                        Ok(()) => {
                            replayed_any = true;
                            self.metrics
                                .recovered_items_total
                                .with_label_values(&[self.name.as_str()])
                                .inc_by(record.data.len() as u64);
                        }
                        Err(error) => {
                            failed_any = true;
                            current_file_ok = false;
                            self.metrics.recovery_errors_total.with_label_values(&[self.name.as_str()]).inc();
                            warn!(pipeline = self.name.as_str(), exporter = record.name, error, "recovery replay failed");
                        }
                    }
                }
                Ok(SpillLine::Finish { file }) => {
                    if current_file_ok {
                        if let Err(e) = self.storage.remove_file(&file) {
                            warn!(pipeline = self.name.as_str(), path = %file.display(), error = %e, "failed to remove recovered spill file");
                        }
                    }
                    current_file_ok = true;
                }
                Err(e) => {
                    failed_any = true;
                    self.metrics.recovery_errors_total.with_label_values(&[self.name.as_str()]).inc();
                    warn!(pipeline = self.name.as_str(), error = %e, "error streaming recovery entries");
                }
            }
        }

        if replayed_any && !failed_any {
            self.transition(PipelineState::Normal);
        }
    }

    fn transition(&self, new: PipelineState) {
        let previous = self.state.swap(new);
        if previous != new {
            self.metrics
                .state_transitions_total
                .with_label_values(&[self.name.as_str(), new.label()])
                .inc();
            info!(pipeline = self.name.as_str(), from = previous.label(), to = new.label(), "state transition");
        }
    }
}
