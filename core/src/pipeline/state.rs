// /////////////////////////////////////////////////////////////////////////////
// Adaptive Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Pipeline State
//!
//! A single `AtomicU8` wrapper over [`PipelineState`]. Every state
//! transition goes through this cell so `push` (on any caller thread) and
//! the batcher/recovery-monitor workers always observe a consistent value
//! without a lock.

use audit_pipeline_domain::value_objects::PipelineState;
use std::sync::atomic::{AtomicU8, Ordering};

pub struct AtomicPipelineState(AtomicU8);

impl AtomicPipelineState {
    pub fn new(initial: PipelineState) -> Self {
        Self(AtomicU8::new(initial.as_u8()))
    }

    pub fn load(&self) -> PipelineState {
        PipelineState::from_u8(self.0.load(Ordering::SeqCst))
    }

    pub fn store(&self, state: PipelineState) {
        self.0.store(state.as_u8(), Ordering::SeqCst);
    }

    /// Swap to `new` and return the previous state, for transition
    /// logging/metrics at the call site.
    pub fn swap(&self, new: PipelineState) -> PipelineState {
        PipelineState::from_u8(self.0.swap(new.as_u8(), Ordering::SeqCst))
    }
}

impl Default for AtomicPipelineState {
    fn default() -> Self {
        Self::new(PipelineState::Normal)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn initial_state_is_normal() {
        let state = AtomicPipelineState::default();
        assert_eq!(state.load(), PipelineState::Normal);
    }

    #[test]
    fn swap_reports_previous_value() {
        let state = AtomicPipelineState::default();
        let previous = state.swap(PipelineState::Blocked);
        assert_eq!(previous, PipelineState::Normal);
        assert_eq!(state.load(), PipelineState::Blocked);
    }
}
