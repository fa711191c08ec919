// /////////////////////////////////////////////////////////////////////////////
// Adaptive Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! A named sink that consumes a batch of events and reports success or
//! failure. `name()` must be stable across process restarts: it is written
//! into spill lines as the routing key, and recovery looks the exporter
//! back up by that exact string.

use crate::event::Event;
use async_trait::async_trait;
use std::error::Error as StdError;

#[async_trait]
pub trait Exporter: Send + Sync {
    /// Stable identity, matching the spill record's `name` field.
    fn name(&self) -> &str;

    /// Export a batch. Errors are returned, never thrown out of band (no
    /// panics expected from well-behaved implementations, though the
    /// pipeline contains panics from this call regardless).
    async fn export(&self, events: &[Event]) -> Result<(), Box<dyn StdError + Send + Sync>>;
}
