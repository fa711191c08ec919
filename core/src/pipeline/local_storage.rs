// /////////////////////////////////////////////////////////////////////////////
// Adaptive Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Local Storage
//!
//! Append-only spill writer + recovery reader over a directory of
//! `pipeline-YYYYMMDD-HHMMSS.log` files. One [`LocalStorage`] instance
//! belongs to exactly one [`crate::pipeline::engine::Pipeline`]; its single
//! mutex is the serialization point for concurrent `save` calls from the
//! batcher and the recovery/block-data-spill paths.
//!
//! Disk-space is probed first, before any file is created or any line is
//! encoded — a probe failure is treated as "full", fail-safe.

use audit_pipeline_bootstrap::platform::Platform as BootstrapPlatform;
use audit_pipeline_domain::error::PipelineError;
use audit_pipeline_domain::event::Event;
use audit_pipeline_domain::spill::{SpillLine, SpillRecord};
use chrono::Utc;
use parking_lot::Mutex;
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Rotate once the active file would exceed this size.
pub const DEFAULT_ROTATE_BYTES: u64 = 100 * 1024 * 1024;
/// Treat the volume as full once free space drops below this floor.
pub const DEFAULT_MIN_DISK_SPACE_BYTES: u64 = 100 * 1024 * 1024;

struct OpenFile {
    file: File,
    path: PathBuf,
    size: u64,
}

struct State {
    current: Option<OpenFile>,
}

pub struct LocalStorage {
    dir: PathBuf,
    /// Chunk size used to slice an over-long batch into individually
    /// spillable lines — the configured pipeline `batch_size`, not a
    /// storage-layer constant.
    chunk_size: usize,
    rotate_bytes: u64,
    min_disk_space_bytes: u64,
    platform: Arc<dyn BootstrapPlatform>,
    state: Mutex<State>,
}

impl LocalStorage {
    pub fn new(dir: impl Into<PathBuf>, chunk_size: usize, platform: Arc<dyn BootstrapPlatform>) -> Self {
        Self {
            dir: dir.into(),
            chunk_size: chunk_size.max(1),
            rotate_bytes: DEFAULT_ROTATE_BYTES,
            min_disk_space_bytes: DEFAULT_MIN_DISK_SPACE_BYTES,
            platform,
            state: Mutex::new(State { current: None }),
        }
    }

    pub fn with_thresholds(mut self, rotate_bytes: u64, min_disk_space_bytes: u64) -> Self {
        self.rotate_bytes = rotate_bytes;
        self.min_disk_space_bytes = min_disk_space_bytes;
        self
    }

    fn is_disk_full(&self) -> bool {
        match self.platform.disk_free_bytes(&self.dir) {
            Ok(free) => free < self.min_disk_space_bytes,
            Err(e) => {
                warn!(error = %e, "disk space probe failed, treating as full");
                true
            }
        }
    }

    /// Append `batch` under `exporter_name`, rotating into `chunk_size`
    /// pieces if it's larger than one configured batch. Returns the number
    /// of bytes written, for the caller to feed into `local_storage_bytes`.
    ///
    /// File I/O here is synchronous: writes are small (one audit-log
    /// batch) and the single-mutex, single-writer-per-pipeline invariant
    /// means there is never enough contention to justify an async file
    /// handle.
    pub async fn save(&self, exporter_name: &str, batch: &[Event]) -> Result<u64, PipelineError> {
        if self.is_disk_full() {
            return Err(PipelineError::DiskFull(exporter_name.to_string()));
        }

        let mut written = 0u64;
        let mut guard = self.state.lock();
        for chunk in batch.chunks(self.chunk_size) {
            if guard.current.is_none() {
                guard.current = Some(Self::open_new_file_blocking(&self.dir)?);
            }
            let record = SpillRecord {
                name: exporter_name.to_string(),
                data: chunk.to_vec(),
            };
            let mut line =
                serde_json::to_vec(&record).map_err(|e| PipelineError::SerializationError(e.to_string()))?;
            line.push(b'\n');

            let open_file = guard.current.as_mut().expect("just ensured Some");
            open_file
                .file
                .write_all(&line)
                .map_err(|e| PipelineError::FileWriteFailed(e.to_string()))?;
            open_file.size += line.len() as u64;
            written += line.len() as u64;

            if open_file.size > self.rotate_bytes {
                debug!(path = %open_file.path.display(), size = open_file.size, "rotating spill file");
                guard.current = None;
            }
        }
        Ok(written)
    }

    fn open_new_file_blocking(dir: &Path) -> Result<OpenFile, PipelineError> {
        fs::create_dir_all(dir).map_err(|e| PipelineError::FileCreateFailed(e.to_string()))?;
        let name = format!("pipeline-{}.log", Utc::now().format("%Y%m%d-%H%M%S"));
        let path = dir.join(name);
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| PipelineError::FileCreateFailed(e.to_string()))?;
        Ok(OpenFile { file, path, size: 0 })
    }

    /// Enumerate `pipeline-*.log` files under the directory, sorted
    /// ascending (lexicographic == chronological, per the filename
    /// format), and stream decoded records followed by a `Finish`
    /// sentinel per file. A malformed line is skipped; the rest of that
    /// file is still processed.
    pub fn recover(&self) -> mpsc::Receiver<Result<SpillLine, PipelineError>> {
        let (tx, rx) = mpsc::channel(64);
        let dir = self.dir.clone();

        tokio::task::spawn_blocking(move || {
            let mut files = match fs::read_dir(&dir) {
                Ok(entries) => entries
                    .filter_map(|e| e.ok())
                    .map(|e| e.path())
                    .filter(|p| {
                        p.file_name()
                            .and_then(|n| n.to_str())
                            .map(|n| n.starts_with("pipeline-") && n.ends_with(".log"))
                            .unwrap_or(false)
                    })
                    .collect::<Vec<_>>(),
                Err(_) => Vec::new(),
            };
            files.sort();

            for path in files {
                let file = match File::open(&path) {
                    Ok(f) => f,
                    Err(e) => {
                        let _ = tx.blocking_send(Err(PipelineError::IoError(e.to_string())));
                        continue;
                    }
                };
                let reader = BufReader::new(file);
                for line in reader.lines() {
                    let line = match line {
                        Ok(l) => l,
                        Err(e) => {
                            warn!(path = %path.display(), error = %e, "skipping unreadable spill line");
                            continue;
                        }
                    };
                    if line.trim().is_empty() {
                        continue;
                    }
                    match serde_json::from_str::<SpillRecord>(&line) {
                        Ok(record) => {
                            if tx.blocking_send(Ok(SpillLine::Data(record))).is_err() {
                                return;
                            }
                        }
                        Err(e) => {
                            warn!(path = %path.display(), error = %e, "skipping malformed spill line");
                        }
                    }
                }
                if tx
                    .blocking_send(Ok(SpillLine::Finish { file: path.clone() }))
                    .is_err()
                {
                    return;
                }
            }
        });

        rx
    }

    pub fn remove_file(&self, path: &Path) -> Result<(), PipelineError> {
        match fs::remove_file(path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(PipelineError::IoError(e.to_string())),
        }
    }

    pub fn close(&self) {
        let mut guard = self.state.lock();
        guard.current = None;
    }
}
