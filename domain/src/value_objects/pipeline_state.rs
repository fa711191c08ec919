// /////////////////////////////////////////////////////////////////////////////
// Adaptive Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Pipeline State
//!
//! The three-valued status of a pipeline. Stored by the
//! engine as a single atomic integer so every observer sees a consistent
//! value without taking a lock; this module only defines the value itself
//! and its integer encoding. `audit_pipeline_core::pipeline::state` owns the
//! `AtomicU8` wrapper.

/// Pipeline lifecycle status. Initial value is always `Normal`; there is no
/// terminal state — only `Close`/`Stop` halts the workers that observe it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum PipelineState {
    Normal = 0,
    Recovering = 1,
    Blocked = 2,
}

impl PipelineState {
    pub const fn as_u8(self) -> u8 {
        self as u8
    }

    pub const fn from_u8(value: u8) -> Self {
        match value {
            0 => PipelineState::Normal,
            1 => PipelineState::Recovering,
            _ => PipelineState::Blocked,
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            PipelineState::Normal => "normal",
            PipelineState::Recovering => "recovering",
            PipelineState::Blocked => "blocked",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_u8() {
        for state in [PipelineState::Normal, PipelineState::Recovering, PipelineState::Blocked] {
            assert_eq!(PipelineState::from_u8(state.as_u8()), state);
        }
    }
}
