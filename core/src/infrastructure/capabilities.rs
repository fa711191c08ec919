// /////////////////////////////////////////////////////////////////////////////
// Adaptive Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Service Capabilities
//!
//! A typed replacement for reflective `#svc.<Field>` config substitution:
//! rather than walking a service-context value by field name string, a
//! plugin factory that needs
//! a runtime object (the database pool, today; a redis client or HTTP
//! client tomorrow) calls [`ServiceCapabilities::resolve`] with the token
//! that follows `#svc.` in the YAML config value. This is a fixed,
//! compile-time `match`, not reflection — adding a new injectable
//! capability means adding a match arm here and a new struct field, not
//! wiring a new field-name string through generic code.

use sqlx::SqlitePool;

#[derive(Clone)]
pub struct ServiceCapabilities {
    pub database: SqlitePool,
}

/// A resolved runtime object a plugin factory can bind to in place of a
/// literal config value.
#[derive(Clone)]
pub enum ServiceCapability {
    DatabasePool(SqlitePool),
}

impl ServiceCapabilities {
    pub fn new(database: SqlitePool) -> Self {
        Self { database }
    }

    /// Resolve the `<Field>` part of a `#svc.<Field>` config value.
    /// Returns `None` for an unrecognized token — callers should surface
    /// that as `PipelineError::InvalidConfiguration` rather than silently
    /// falling back to the literal string.
    pub fn resolve(&self, token: &str) -> Option<ServiceCapability> {
        match token {
            "Database" => Some(ServiceCapability::DatabasePool(self.database.clone())),
            _ => None,
        }
    }
}

/// `true` if `value` is a `#svc.*` reference rather than a literal.
pub fn is_capability_token(value: &str) -> Option<&str> {
    value.strip_prefix("#svc.")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recognizes_capability_tokens() {
        assert_eq!(is_capability_token("#svc.Database"), Some("Database"));
        assert_eq!(is_capability_token("plain-value"), None);
    }
}
