// /////////////////////////////////////////////////////////////////////////////
// Adaptive Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! Bulk-insert exporter against the injected database pool. Dedupe is
//! `INSERT OR IGNORE` keyed on `log_id` — the at-least-once delivery
//! guarantee this crate targets relies on the sink doing exactly this.

use super::registry::{ExporterFactory, PluginConfig};
use crate::infrastructure::capabilities::{ServiceCapabilities, ServiceCapability};
use async_trait::async_trait;
use audit_pipeline_domain::error::PipelineError;
use audit_pipeline_domain::event::Event;
use audit_pipeline_domain::ports::Exporter;
use sqlx::SqlitePool;
use std::error::Error as StdError;
use std::sync::Arc;

pub struct RelationalExporter {
    name: String,
    pool: SqlitePool,
    table: String,
}

impl RelationalExporter {
    pub fn new(name: impl Into<String>, pool: SqlitePool, table: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            pool,
            table: table.into(),
        }
    }

    pub async fn ensure_schema(&self) -> Result<(), sqlx::Error> {
        let ddl = format!(
            "CREATE TABLE IF NOT EXISTS {} (
                log_id TEXT PRIMARY KEY,
                tenant TEXT NOT NULL DEFAULT '',
                body TEXT NOT NULL
            )",
            self.table
        );
        sqlx::query(&ddl).execute(&self.pool).await?;
        Ok(())
    }
}

#[async_trait]
impl Exporter for RelationalExporter {
    fn name(&self) -> &str {
        &self.name
    }

    async fn export(&self, events: &[Event]) -> Result<(), Box<dyn StdError + Send + Sync>> {
        let mut tx = self.pool.begin().await?;
        let sql = format!(
            "INSERT OR IGNORE INTO {} (log_id, tenant, body) VALUES (?, ?, ?)",
            self.table
        );
        for event in events {
            let body = serde_json::to_string(&event.body)?;
            sqlx::query(&sql)
                .bind(&event.log_id)
                .bind(&event.tenant)
                .bind(body)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;
        Ok(())
    }
}

pub struct RelationalExporterFactory;

impl ExporterFactory for RelationalExporterFactory {
    fn create(&self, config: &PluginConfig, caps: &ServiceCapabilities) -> Result<Arc<dyn Exporter>, PipelineError> {
        let name = config
            .get("name")
            .cloned()
            .ok_or_else(|| PipelineError::InvalidConfiguration("relational exporter requires 'name'".to_string()))?;
        let table = config
            .get("table")
            .cloned()
            .unwrap_or_else(|| "audit_event".to_string());

        let db_config = config
            .get("database")
            .ok_or_else(|| PipelineError::InvalidConfiguration("relational exporter requires 'database'".to_string()))?;
        let token = db_config
            .strip_prefix("#svc.")
            .ok_or_else(|| PipelineError::InvalidConfiguration(format!("'{db_config}' is not a #svc. reference")))?;
        let pool = match caps.resolve(token) {
            Some(ServiceCapability::DatabasePool(pool)) => pool,
            None => return Err(PipelineError::InvalidConfiguration(format!("unknown capability '{token}'"))),
        };

        Ok(Arc::new(RelationalExporter::new(name, pool, table)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use sqlx::sqlite::SqlitePoolOptions;

    #[tokio::test]
    async fn dedupes_by_log_id() {
        let pool = SqlitePoolOptions::new().connect("sqlite::memory:").await.unwrap();
        let exporter = RelationalExporter::new("db", pool.clone(), "audit_event");
        exporter.ensure_schema().await.unwrap();

        let events = vec![Event::new("1", json!({"a": 1}))];
        exporter.export(&events).await.unwrap();
        // Re-export the same log id: should not error, and should not
        // duplicate the row.
        exporter.export(&events).await.unwrap();

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM audit_event")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(count, 1);
    }
}
