// /////////////////////////////////////////////////////////////////////////////
// Adaptive Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! A stateless allow-list filter keyed on `Event::tenant`, demonstrating
//! the filter chain's AND semantics: combined with any other filter, an
//! event only survives if every filter keeps it.

use super::registry::{FilterFactory, PluginConfig};
use crate::infrastructure::capabilities::ServiceCapabilities;
use audit_pipeline_domain::error::PipelineError;
use audit_pipeline_domain::event::Event;
use audit_pipeline_domain::ports::Filter;
use std::collections::HashSet;
use std::sync::Arc;

pub struct TenantFilter {
    allowed: HashSet<String>,
}

impl TenantFilter {
    pub fn new(allowed: impl IntoIterator<Item = String>) -> Self {
        Self {
            allowed: allowed.into_iter().collect(),
        }
    }
}

impl Filter for TenantFilter {
    fn keep(&self, event: &Event) -> bool {
        self.allowed.is_empty() || self.allowed.contains(&event.tenant)
    }
}

pub struct TenantFilterFactory;

impl FilterFactory for TenantFilterFactory {
    fn create(&self, config: &PluginConfig, _caps: &ServiceCapabilities) -> Result<Arc<dyn Filter>, PipelineError> {
        let allowed = config
            .get("tenants")
            .map(|csv| csv.split(',').map(|s| s.trim().to_string()).collect())
            .unwrap_or_default();
        Ok(Arc::new(TenantFilter::new(allowed)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn empty_allow_list_keeps_everything() {
        let filter = TenantFilter::new(Vec::<String>::new());
        let event = Event::new("1", json!({})).with_tenant("acme");
        assert!(filter.keep(&event));
    }

    #[test]
    fn only_listed_tenants_survive() {
        let filter = TenantFilter::new(vec!["acme".to_string()]);
        assert!(filter.keep(&Event::new("1", json!({})).with_tenant("acme")));
        assert!(!filter.keep(&Event::new("2", json!({})).with_tenant("globex")));
    }
}
