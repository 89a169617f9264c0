// SQLite JobLogStorage Implementation (spec §3, §6) — append-only,
// correlated by root job id for log aggregation.

use async_trait::async_trait;
use semantica_core::domain::{JobLogEntry, LogLevel};
use semantica_core::error::{AppError, Result};
use semantica_core::port::JobLogStorage;
use sqlx::SqlitePool;
use std::str::FromStr;

fn map_sqlx_error(err: sqlx::Error) -> AppError {
    AppError::Database(err.to_string())
}

pub struct SqliteJobLogStorage {
    pool: SqlitePool,
}

impl SqliteJobLogStorage {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl JobLogStorage for SqliteJobLogStorage {
    async fn append(&self, entry: JobLogEntry) -> Result<()> {
        sqlx::query(
            "INSERT INTO job_log_entries (root_job_id, job_id, timestamp, level, message) \
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&entry.root_job_id)
        .bind(&entry.job_id)
        .bind(entry.timestamp)
        .bind(entry.level.to_string())
        .bind(&entry.message)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(())
    }

    async fn list_for_root(&self, root_job_id: &str) -> Result<Vec<JobLogEntry>> {
        let rows: Vec<(String, String, i64, String, String)> = sqlx::query_as(
            "SELECT root_job_id, job_id, timestamp, level, message FROM job_log_entries \
             WHERE root_job_id = ? ORDER BY timestamp ASC",
        )
        .bind(root_job_id)
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        rows.into_iter()
            .map(|(root_job_id, job_id, timestamp, level, message)| {
                Ok(JobLogEntry {
                    root_job_id,
                    job_id,
                    timestamp,
                    level: LogLevel::from_str(&level)?,
                    message,
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{create_pool, run_migrations};

    async fn setup() -> SqlitePool {
        let pool = create_pool("sqlite::memory:").await.unwrap();
        run_migrations(&pool).await.unwrap();
        pool
    }

    #[tokio::test]
    async fn append_then_list_for_root_is_ordered() {
        let pool = setup().await;
        let storage = SqliteJobLogStorage::new(pool);

        storage
            .append(JobLogEntry {
                root_job_id: "root-1".to_string(),
                job_id: "child-1".to_string(),
                timestamp: 2000,
                level: LogLevel::Info,
                message: "second".to_string(),
            })
            .await
            .unwrap();
        storage
            .append(JobLogEntry {
                root_job_id: "root-1".to_string(),
                job_id: "root-1".to_string(),
                timestamp: 1000,
                level: LogLevel::Warn,
                message: "first".to_string(),
            })
            .await
            .unwrap();

        let entries = storage.list_for_root("root-1").await.unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].message, "first");
        assert_eq!(entries[1].message, "second");
    }
}
