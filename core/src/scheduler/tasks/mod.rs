// /////////////////////////////////////////////////////////////////////////////
// Adaptive Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! Concrete `Task` implementations shipped by this crate. Everything else
//! runnable by the scheduler is supplied by the host application.

pub mod table_rotation;

pub use table_rotation::TableRotationTask;
