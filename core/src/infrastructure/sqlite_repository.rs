// /////////////////////////////////////////////////////////////////////////////
// Adaptive Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # SQLite-Backed Persistence
//!
//! [`SqliteScheduledTaskRepository`] backs the `schedule_task` table the
//! distributed lock and scheduler bookkeeping share;
//! [`SqliteShardPositionRepository`] backs `schedule_pos`, the table-rotation
//! task's pointer store. Both take a pre-built `SqlitePool` — connection
//! management is the host application's concern, not the repository's.

use async_trait::async_trait;
use audit_pipeline_domain::entities::{ScheduledTask, ShardPosition};
use audit_pipeline_domain::error::PipelineError;
use audit_pipeline_domain::ports::{ScheduledTaskRepository, ShardPositionRepository};
use audit_pipeline_domain::value_objects::TaskName;
use chrono::{DateTime, Utc};
use sqlx::{Row, SqlitePool};

fn db_err(e: sqlx::Error) -> PipelineError {
    PipelineError::DatabaseError(e.to_string())
}

pub struct SqliteScheduledTaskRepository {
    pool: SqlitePool,
}

impl SqliteScheduledTaskRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn migrate(&self) -> Result<(), PipelineError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS schedule_task (
                task_name TEXT PRIMARY KEY,
                lease_holder TEXT NOT NULL DEFAULT '',
                lease_until TEXT NOT NULL,
                last_run_time TEXT,
                next_run_time TEXT NOT NULL,
                execution_cost INTEGER NOT NULL DEFAULT 0,
                execution_count INTEGER NOT NULL DEFAULT 0,
                failure_count INTEGER NOT NULL DEFAULT 0,
                priority INTEGER NOT NULL DEFAULT 0
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(())
    }

    fn row_to_task(row: &sqlx::sqlite::SqliteRow) -> Result<ScheduledTask, PipelineError> {
        let task_name: String = row.get("task_name");
        let last_run_time: Option<String> = row.get("last_run_time");
        Ok(ScheduledTask {
            task_name: TaskName::new(task_name)?,
            lease_holder: row.get("lease_holder"),
            lease_until: parse_timestamp(row.get("lease_until"))?,
            last_run_time: last_run_time.map(|s| parse_timestamp(&s)).transpose()?,
            next_run_time: parse_timestamp(row.get("next_run_time"))?,
            execution_cost: row.get("execution_cost"),
            execution_count: row.get("execution_count"),
            failure_count: row.get("failure_count"),
            priority: row.get("priority"),
        })
    }
}

fn parse_timestamp(value: &str) -> Result<DateTime<Utc>, PipelineError> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| PipelineError::SerializationError(format!("invalid timestamp '{value}': {e}")))
}

#[async_trait]
impl ScheduledTaskRepository for SqliteScheduledTaskRepository {
    async fn upsert_if_absent(&self, task: &ScheduledTask) -> Result<(), PipelineError> {
        sqlx::query(
            r#"
            INSERT INTO schedule_task
                (task_name, lease_holder, lease_until, last_run_time, next_run_time, execution_cost, execution_count, failure_count, priority)
            VALUES (?, '', ?, NULL, ?, 0, 0, 0, ?)
            ON CONFLICT(task_name) DO NOTHING
            "#,
        )
        .bind(task.task_name.as_str())
        .bind(task.lease_until.to_rfc3339())
        .bind(task.next_run_time.to_rfc3339())
        .bind(task.priority)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(())
    }

    async fn load(&self, name: &TaskName) -> Result<Option<ScheduledTask>, PipelineError> {
        let row = sqlx::query("SELECT * FROM schedule_task WHERE task_name = ?")
            .bind(name.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;

        row.as_ref().map(Self::row_to_task).transpose()
    }

    /// The serialization point every replica's acquisition races against: a
    /// single conditional `UPDATE` that only takes effect when the row is
    /// currently unlocked or its lease has already expired.
    async fn try_acquire_lease(&self, name: &TaskName, holder: &str, lease_duration_secs: i64) -> Result<bool, PipelineError> {
        let now = Utc::now();
        let lease_until = now + chrono::Duration::seconds(lease_duration_secs);

        let result = sqlx::query(
            r#"
            UPDATE schedule_task
            SET lease_holder = ?, lease_until = ?
            WHERE task_name = ? AND (lease_holder = '' OR lease_until < ?)
            "#,
        )
        .bind(holder)
        .bind(lease_until.to_rfc3339())
        .bind(name.as_str())
        .bind(now.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        Ok(result.rows_affected() > 0)
    }

    async fn renew_lease(&self, name: &TaskName, holder: &str, lease_duration_secs: i64) -> Result<bool, PipelineError> {
        let now = Utc::now();
        let lease_until = now + chrono::Duration::seconds(lease_duration_secs);

        let result = sqlx::query(
            r#"
            UPDATE schedule_task
            SET lease_until = ?
            WHERE task_name = ? AND lease_holder = ? AND lease_until > ?
            "#,
        )
        .bind(lease_until.to_rfc3339())
        .bind(name.as_str())
        .bind(holder)
        .bind(now.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        Ok(result.rows_affected() > 0)
    }

    async fn release_lease(&self, name: &TaskName, holder: &str) -> Result<(), PipelineError> {
        let now = Utc::now();
        sqlx::query(
            r#"
            UPDATE schedule_task
            SET lease_holder = ''
            WHERE task_name = ? AND lease_holder = ? AND lease_until > ?
            "#,
        )
        .bind(name.as_str())
        .bind(holder)
        .bind(now.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(())
    }

    async fn save(&self, task: &ScheduledTask) -> Result<(), PipelineError> {
        sqlx::query(
            r#"
            UPDATE schedule_task
            SET lease_holder = ?, lease_until = ?, last_run_time = ?, next_run_time = ?,
                execution_cost = ?, execution_count = ?, failure_count = ?, priority = ?
            WHERE task_name = ?
            "#,
        )
        .bind(&task.lease_holder)
        .bind(task.lease_until.to_rfc3339())
        .bind(task.last_run_time.map(|t| t.to_rfc3339()))
        .bind(task.next_run_time.to_rfc3339())
        .bind(task.execution_cost)
        .bind(task.execution_count)
        .bind(task.failure_count)
        .bind(task.priority)
        .bind(task.task_name.as_str())
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(())
    }
}

pub struct SqliteShardPositionRepository {
    pool: SqlitePool,
}

impl SqliteShardPositionRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn migrate(&self) -> Result<(), PipelineError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS schedule_pos (
                name TEXT PRIMARY KEY,
                schedule_begin_pos INTEGER NOT NULL DEFAULT 1,
                schedule_end_pos INTEGER NOT NULL DEFAULT 1
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(())
    }
}

#[async_trait]
impl ShardPositionRepository for SqliteShardPositionRepository {
    async fn list_positions(&self) -> Result<Vec<ShardPosition>, PipelineError> {
        let rows = sqlx::query("SELECT name, schedule_begin_pos, schedule_end_pos FROM schedule_pos")
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)?;

        Ok(rows
            .into_iter()
            .map(|row| ShardPosition {
                name: row.get("name"),
                schedule_begin_pos: row.get("schedule_begin_pos"),
                schedule_end_pos: row.get("schedule_end_pos"),
            })
            .collect())
    }

    async fn get_or_create(&self, name: &str) -> Result<ShardPosition, PipelineError> {
        sqlx::query(
            r#"
            INSERT INTO schedule_pos (name, schedule_begin_pos, schedule_end_pos)
            VALUES (?, 1, 1)
            ON CONFLICT(name) DO NOTHING
            "#,
        )
        .bind(name)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        let row = sqlx::query("SELECT name, schedule_begin_pos, schedule_end_pos FROM schedule_pos WHERE name = ?")
            .bind(name)
            .fetch_one(&self.pool)
            .await
            .map_err(db_err)?;

        Ok(ShardPosition {
            name: row.get("name"),
            schedule_begin_pos: row.get("schedule_begin_pos"),
            schedule_end_pos: row.get("schedule_end_pos"),
        })
    }

    async fn count_rows(&self, table_name: &str) -> Result<i64, PipelineError> {
        // `table_name` is derived from a configured entity name plus a
        // numeric shard suffix, never from untrusted input, so interpolation
        // here (sqlite does not support parameterized identifiers) is safe.
        let query = format!("SELECT COUNT(*) AS row_count FROM {table_name}");
        let row = sqlx::query(&query).fetch_one(&self.pool).await.map_err(db_err)?;
        Ok(row.get("row_count"))
    }

    async fn create_shard_table(&self, table_name: &str, like_table: &str) -> Result<(), PipelineError> {
        let ddl = format!("CREATE TABLE IF NOT EXISTS {table_name} AS SELECT * FROM {like_table} WHERE 0");
        sqlx::query(&ddl).execute(&self.pool).await.map_err(db_err)?;
        Ok(())
    }

    async fn save(&self, position: &ShardPosition) -> Result<(), PipelineError> {
        sqlx::query(
            r#"
            UPDATE schedule_pos
            SET schedule_begin_pos = ?, schedule_end_pos = ?
            WHERE name = ?
            "#,
        )
        .bind(position.schedule_begin_pos)
        .bind(position.schedule_end_pos)
        .bind(&position.name)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn test_pool() -> SqlitePool {
        SqlitePoolOptions::new().connect("sqlite::memory:").await.unwrap()
    }

    #[tokio::test]
    async fn upsert_then_load_round_trips() {
        let pool = test_pool().await;
        let repo = SqliteScheduledTaskRepository::new(pool);
        repo.migrate().await.unwrap();

        let name = TaskName::new("rotate").unwrap();
        let task = ScheduledTask::new(name.clone(), 5, Utc::now());
        repo.upsert_if_absent(&task).await.unwrap();

        let loaded = repo.load(&name).await.unwrap().unwrap();
        assert_eq!(loaded.priority, 5);
        assert!(loaded.lease_holder.is_empty());
    }

    #[tokio::test]
    async fn try_acquire_lease_then_second_holder_fails() {
        let pool = test_pool().await;
        let repo = SqliteScheduledTaskRepository::new(pool);
        repo.migrate().await.unwrap();

        let name = TaskName::new("rotate").unwrap();
        repo.upsert_if_absent(&ScheduledTask::new(name.clone(), 0, Utc::now())).await.unwrap();

        assert!(repo.try_acquire_lease(&name, "replica-a", 30).await.unwrap());
        assert!(!repo.try_acquire_lease(&name, "replica-b", 30).await.unwrap());
    }

    #[tokio::test]
    async fn release_then_another_holder_can_acquire() {
        let pool = test_pool().await;
        let repo = SqliteScheduledTaskRepository::new(pool);
        repo.migrate().await.unwrap();

        let name = TaskName::new("rotate").unwrap();
        repo.upsert_if_absent(&ScheduledTask::new(name.clone(), 0, Utc::now())).await.unwrap();

        assert!(repo.try_acquire_lease(&name, "replica-a", 30).await.unwrap());
        repo.release_lease(&name, "replica-a").await.unwrap();
        assert!(repo.try_acquire_lease(&name, "replica-b", 30).await.unwrap());
    }

    #[tokio::test]
    async fn shard_position_get_or_create_then_rotate() {
        let pool = test_pool().await;
        let repo = SqliteShardPositionRepository::new(pool.clone());
        repo.migrate().await.unwrap();
        sqlx::query("CREATE TABLE audit_log_1 (id INTEGER PRIMARY KEY, payload TEXT)")
            .execute(&pool)
            .await
            .unwrap();

        let mut position = repo.get_or_create("audit_log").await.unwrap();
        assert_eq!(position.schedule_end_pos, 1);

        position.rotate();
        repo.save(&position).await.unwrap();

        let reloaded = repo.get_or_create("audit_log").await.unwrap();
        assert_eq!(reloaded.schedule_end_pos, 2);
    }
}
