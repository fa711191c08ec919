// /////////////////////////////////////////////////////////////////////////////
// Adaptive Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Spill Wire Format
//!
//! Line-delimited JSON records written by `LocalStorage::save` and replayed
//! by `LocalStorage::recover`. Each line on disk is exactly
//! `{"name":"<exporter>","data":[...]}` — the `name` field there is always
//! an exporter-routing key, never a file path. The "end of file" sentinel
//! the recovery stream needs (to know when to consider deleting a fully
//! replayed file) is never written to disk; it is a synthetic value the
//! recovery stream yields once per file, after its last data record. Using
//! two distinct types instead of overloading one `name` field avoids the
//! ambiguity a single shared field would create between a routing key and
//! a file path.

use crate::event::Event;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// One on-disk spill line: the events from a single `save` call routed to a
/// single named exporter.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SpillRecord {
    pub name: String,
    pub data: Vec<Event>,
}

/// An item yielded by the recovery stream: either a decoded on-disk record,
/// or the synthetic end-of-file marker for the file it just finished
/// streaming.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpillLine {
    Data(SpillRecord),
    Finish { file: PathBuf },
}

impl SpillLine {
    pub fn is_finish(&self) -> bool {
        matches!(self, SpillLine::Finish { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn data_line_has_no_finish_key_on_the_wire() {
        let record = SpillRecord {
            name: "db".to_string(),
            data: vec![Event::new("1", json!({}))],
        };
        let encoded = serde_json::to_string(&record).unwrap();
        assert!(!encoded.contains("finish"));
        assert!(encoded.starts_with("{\"name\":\"db\""));
    }
}
