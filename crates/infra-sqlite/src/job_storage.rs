// SQLite JobStorage Implementation (spec §4.1)

use async_trait::async_trait;
use semantica_core::domain::{Job, JobId, JobPhase, JobStatus, Progress};
use semantica_core::error::{AppError, Result};
use semantica_core::port::{ChildStats, JobFilter, JobStorage, ProgressDelta, StatusUpdate};
use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use std::collections::HashMap;
use std::str::FromStr;

/// Converts a sqlx error into the narrow `AppError::Database` variant,
/// distinguishing the handful of SQLite codes callers actually branch on.
fn map_sqlx_error(err: sqlx::Error) -> AppError {
    match &err {
        sqlx::Error::Database(db_err) => {
            if let Some(code) = db_err.code() {
                match code.as_ref() {
                    "2067" | "1555" => AppError::AlreadyExists(format!(
                        "unique constraint violation: {}",
                        db_err.message()
                    )),
                    "5" => AppError::Transient(format!(
                        "database locked (SQLITE_BUSY): {}",
                        db_err.message()
                    )),
                    code_str => AppError::Database(format!(
                        "database error [{}]: {}",
                        code_str,
                        db_err.message()
                    )),
                }
            } else {
                AppError::Database(format!("database error: {}", db_err.message()))
            }
        }
        sqlx::Error::RowNotFound => AppError::NotFound("row not found".to_string()),
        other => AppError::Database(other.to_string()),
    }
}

pub struct SqliteJobStorage {
    pool: SqlitePool,
}

impl SqliteJobStorage {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct JobRow {
    id: String,
    parent_id: Option<String>,
    job_definition_id: Option<String>,
    job_type: String,
    name: String,
    source_type: Option<String>,
    entity_type: Option<String>,
    tags: String,
    phase: String,
    status: String,
    created_at: i64,
    started_at: Option<i64>,
    completed_at: Option<i64>,
    last_heartbeat: i64,
    progress_total: i64,
    progress_pending: i64,
    progress_completed: i64,
    progress_failed: i64,
    progress_percentage: f64,
    result_count: i64,
    failed_count: i64,
    error: Option<String>,
    payload: String,
    metadata: String,
}

impl JobRow {
    fn into_job(self) -> Result<Job> {
        Ok(Job {
            id: self.id,
            parent_id: self.parent_id,
            job_definition_id: self.job_definition_id,
            job_type: self.job_type,
            name: self.name,
            source_type: self.source_type,
            entity_type: self.entity_type,
            tags: serde_json::from_str(&self.tags).unwrap_or_default(),
            phase: JobPhase::from_str(&self.phase).map_err(AppError::Domain)?,
            status: JobStatus::from_str(&self.status).map_err(AppError::Domain)?,
            created_at: self.created_at,
            started_at: self.started_at,
            completed_at: self.completed_at,
            last_heartbeat: self.last_heartbeat,
            progress: Progress {
                total: self.progress_total,
                pending: self.progress_pending,
                completed: self.progress_completed,
                failed: self.progress_failed,
                percentage: self.progress_percentage,
            },
            result_count: self.result_count,
            failed_count: self.failed_count,
            error: self.error,
            payload: serde_json::from_str(&self.payload).unwrap_or(serde_json::json!({})),
            metadata: serde_json::from_str(&self.metadata).unwrap_or(serde_json::json!({})),
        })
    }
}

/// Whitelisted `order_by` columns for `list_jobs` — the filter's `order_by`
/// is caller-supplied text, never interpolated directly into SQL.
fn order_by_column(order_by: Option<&str>) -> &'static str {
    match order_by {
        Some("last_heartbeat") => "last_heartbeat",
        Some("status") => "status",
        Some("created_at_asc") => "created_at ASC",
        _ => "created_at DESC",
    }
}

#[async_trait]
impl JobStorage for SqliteJobStorage {
    async fn create_job(&self, job: &Job) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO jobs (
                id, parent_id, job_definition_id, job_type, name, source_type,
                entity_type, tags, phase, status, created_at, started_at,
                completed_at, last_heartbeat, progress_total, progress_pending,
                progress_completed, progress_failed, progress_percentage,
                result_count, failed_count, error, payload, metadata
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&job.id)
        .bind(&job.parent_id)
        .bind(&job.job_definition_id)
        .bind(&job.job_type)
        .bind(&job.name)
        .bind(&job.source_type)
        .bind(&job.entity_type)
        .bind(serde_json::to_string(&job.tags).unwrap_or_else(|_| "[]".to_string()))
        .bind(job.phase.to_string())
        .bind(job.status.to_string())
        .bind(job.created_at)
        .bind(job.started_at)
        .bind(job.completed_at)
        .bind(job.last_heartbeat)
        .bind(job.progress.total)
        .bind(job.progress.pending)
        .bind(job.progress.completed)
        .bind(job.progress.failed)
        .bind(job.progress.percentage)
        .bind(job.result_count)
        .bind(job.failed_count)
        .bind(&job.error)
        .bind(job.payload.to_string())
        .bind(job.metadata.to_string())
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(())
    }

    async fn get_job(&self, id: &JobId) -> Result<Job> {
        let row = sqlx::query_as::<_, JobRow>("SELECT * FROM jobs WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx_error)?
            .ok_or_else(|| AppError::NotFound(format!("job {id} not found")))?;

        row.into_job()
    }

    async fn list_jobs(&self, filter: JobFilter) -> Result<Vec<Job>> {
        let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new("SELECT * FROM jobs WHERE 1 = 1");

        if let Some(status) = filter.status {
            qb.push(" AND status = ").push_bind(status.to_string());
        }
        if let Some(source_type) = &filter.source_type {
            qb.push(" AND source_type = ").push_bind(source_type.clone());
        }
        if let Some(after) = filter.created_after {
            qb.push(" AND created_at > ").push_bind(after);
        }
        if let Some(before) = filter.created_before {
            qb.push(" AND created_at < ").push_bind(before);
        }

        qb.push(format!(" ORDER BY {}", order_by_column(filter.order_by.as_deref())));

        let limit = if filter.limit > 0 { filter.limit } else { 100 };
        qb.push(" LIMIT ").push_bind(limit);
        if filter.offset > 0 {
            qb.push(" OFFSET ").push_bind(filter.offset);
        }

        let rows: Vec<JobRow> = qb
            .build_query_as()
            .fetch_all(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        rows.into_iter().map(JobRow::into_job).collect()
    }

    async fn save_job(&self, job: &Job) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO jobs (
                id, parent_id, job_definition_id, job_type, name, source_type,
                entity_type, tags, phase, status, created_at, started_at,
                completed_at, last_heartbeat, progress_total, progress_pending,
                progress_completed, progress_failed, progress_percentage,
                result_count, failed_count, error, payload, metadata
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                parent_id = excluded.parent_id,
                job_definition_id = excluded.job_definition_id,
                job_type = excluded.job_type,
                name = excluded.name,
                source_type = excluded.source_type,
                entity_type = excluded.entity_type,
                tags = excluded.tags,
                phase = excluded.phase,
                status = excluded.status,
                started_at = excluded.started_at,
                completed_at = excluded.completed_at,
                last_heartbeat = excluded.last_heartbeat,
                progress_total = excluded.progress_total,
                progress_pending = excluded.progress_pending,
                progress_completed = excluded.progress_completed,
                progress_failed = excluded.progress_failed,
                progress_percentage = excluded.progress_percentage,
                result_count = excluded.result_count,
                failed_count = excluded.failed_count,
                error = excluded.error,
                payload = excluded.payload,
                metadata = excluded.metadata
            "#,
        )
        .bind(&job.id)
        .bind(&job.parent_id)
        .bind(&job.job_definition_id)
        .bind(&job.job_type)
        .bind(&job.name)
        .bind(&job.source_type)
        .bind(&job.entity_type)
        .bind(serde_json::to_string(&job.tags).unwrap_or_else(|_| "[]".to_string()))
        .bind(job.phase.to_string())
        .bind(job.status.to_string())
        .bind(job.created_at)
        .bind(job.started_at)
        .bind(job.completed_at)
        .bind(job.last_heartbeat)
        .bind(job.progress.total)
        .bind(job.progress.pending)
        .bind(job.progress.completed)
        .bind(job.progress.failed)
        .bind(job.progress.percentage)
        .bind(job.result_count)
        .bind(job.failed_count)
        .bind(&job.error)
        .bind(job.payload.to_string())
        .bind(job.metadata.to_string())
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(())
    }

    async fn update_status(&self, id: &JobId, update: StatusUpdate) -> Result<()> {
        let is_terminal = update.status.is_terminal();
        sqlx::query(
            r#"
            UPDATE jobs
            SET status = ?,
                error = COALESCE(?, error),
                completed_at = CASE WHEN ? AND completed_at IS NULL THEN ? ELSE completed_at END
            WHERE id = ? AND status NOT IN ('COMPLETED', 'FAILED', 'CANCELLED')
            "#,
        )
        .bind(update.status.to_string())
        .bind(&update.error)
        .bind(is_terminal)
        .bind(if is_terminal { Some(now_guard_value()) } else { None::<i64> })
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(())
    }

    async fn update_progress_counters_atomic(
        &self,
        id: &JobId,
        delta: ProgressDelta,
    ) -> Result<Job> {
        let row = sqlx::query_as::<_, JobRow>(
            r#"
            UPDATE jobs
            SET
                progress_completed = MAX(progress_completed + ?, 0),
                progress_pending   = MAX(progress_pending + ?, 0),
                progress_total     = MAX(progress_total + ?, 0),
                progress_failed    = MAX(progress_failed + ?, 0),
                progress_percentage = COALESCE(
                    (MAX(progress_completed + ?, 0) + MAX(progress_failed + ?, 0)) * 100.0
                        / NULLIF(MAX(progress_total + ?, 0), 0),
                    0.0
                )
            WHERE id = ?
            RETURNING *
            "#,
        )
        .bind(delta.completed)
        .bind(delta.pending)
        .bind(delta.total)
        .bind(delta.failed)
        .bind(delta.completed)
        .bind(delta.failed)
        .bind(delta.total)
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_error)?
        .ok_or_else(|| AppError::NotFound(format!("job {id} not found")))?;

        row.into_job()
    }

    async fn update_heartbeat(&self, id: &JobId) -> Result<()> {
        let now = chrono::Utc::now().timestamp_millis();
        sqlx::query("UPDATE jobs SET last_heartbeat = ? WHERE id = ?")
            .bind(now)
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_error)?;
        Ok(())
    }

    async fn mark_url_seen(&self, root_id: &JobId, url: &str) -> Result<bool> {
        let now = chrono::Utc::now().timestamp_millis();
        let result = sqlx::query(
            "INSERT INTO job_seen_urls (root_job_id, url, seen_at) VALUES (?, ?, ?) \
             ON CONFLICT(root_job_id, url) DO NOTHING",
        )
        .bind(root_id)
        .bind(url)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(result.rows_affected() == 1)
    }

    async fn get_child_stats(&self, root_ids: &[JobId]) -> Result<HashMap<JobId, ChildStats>> {
        let mut stats: HashMap<JobId, ChildStats> =
            root_ids.iter().map(|id| (id.clone(), ChildStats::default())).collect();

        if root_ids.is_empty() {
            return Ok(stats);
        }

        let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(
            "SELECT parent_id, \
             COUNT(*) AS child_count, \
             SUM(CASE WHEN status = 'FAILED' THEN 1 ELSE 0 END) AS failed_children, \
             SUM(CASE WHEN status = 'RUNNING' THEN 1 ELSE 0 END) AS running_children \
             FROM jobs WHERE parent_id IN (",
        );
        let mut separated = qb.separated(", ");
        for id in root_ids {
            separated.push_bind(id.clone());
        }
        separated.push_unseparated(") GROUP BY parent_id");

        let rows: Vec<(String, i64, i64, i64)> = qb
            .build_query_as()
            .fetch_all(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        for (root_id, child_count, failed_children, running_children) in rows {
            stats.insert(
                root_id,
                ChildStats {
                    child_count,
                    failed_children,
                    running_children,
                },
            );
        }

        Ok(stats)
    }

    async fn delete_job(&self, id: &JobId) -> Result<()> {
        let mut tx = self.pool.begin().await.map_err(map_sqlx_error)?;

        let root_status: String = sqlx::query_scalar("SELECT status FROM jobs WHERE id = ?")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(map_sqlx_error)?
            .ok_or_else(|| AppError::NotFound(format!("job {id} not found")))?;

        if !JobStatus::from_str(&root_status).map_err(AppError::Domain)?.is_terminal() {
            return Err(AppError::InvalidState(format!(
                "cannot delete job {id}: status {root_status} is not terminal"
            )));
        }

        let non_terminal_children: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM jobs WHERE parent_id = ? \
             AND status NOT IN ('COMPLETED', 'FAILED', 'CANCELLED')",
        )
        .bind(id)
        .fetch_one(&mut *tx)
        .await
        .map_err(map_sqlx_error)?;

        if non_terminal_children > 0 {
            return Err(AppError::InvalidState(format!(
                "cannot delete job {id}: {non_terminal_children} descendant(s) not terminal"
            )));
        }

        sqlx::query("DELETE FROM job_log_entries WHERE root_job_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx_error)?;
        sqlx::query("DELETE FROM job_seen_urls WHERE root_job_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx_error)?;
        sqlx::query("DELETE FROM jobs WHERE parent_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx_error)?;
        sqlx::query("DELETE FROM jobs WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx_error)?;

        tx.commit().await.map_err(map_sqlx_error)?;
        Ok(())
    }

    async fn find_stale_roots(&self, heartbeat_before: i64) -> Result<Vec<Job>> {
        let rows: Vec<JobRow> = sqlx::query_as(
            r#"
            SELECT * FROM jobs
            WHERE parent_id IS NULL
              AND status NOT IN ('COMPLETED', 'FAILED', 'CANCELLED')
              AND last_heartbeat < ?
            ORDER BY last_heartbeat ASC
            "#,
        )
        .bind(heartbeat_before)
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        rows.into_iter().map(JobRow::into_job).collect()
    }

    async fn list_non_terminal_children(&self, root_id: &JobId) -> Result<Vec<Job>> {
        let rows: Vec<JobRow> = sqlx::query_as(
            r#"
            SELECT * FROM jobs
            WHERE parent_id = ?
              AND status NOT IN ('COMPLETED', 'FAILED', 'CANCELLED')
            "#,
        )
        .bind(root_id)
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        rows.into_iter().map(JobRow::into_job).collect()
    }
}

/// `update_status` only needs "now" when the new status is terminal; kept
/// as a free function so the CASE/bind shape above stays legible.
fn now_guard_value() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{create_pool, run_migrations};
    use semantica_core::domain::Job;

    async fn setup() -> SqlitePool {
        let pool = create_pool("sqlite::memory:").await.unwrap();
        run_migrations(&pool).await.unwrap();
        pool
    }

    #[tokio::test]
    async fn create_and_get_round_trips() {
        let pool = setup().await;
        let storage = SqliteJobStorage::new(pool);

        let job = Job::new_root("root-1", "crawl", "crawl example.com", None, 1000, serde_json::json!({}));
        storage.create_job(&job).await.unwrap();

        let fetched = storage.get_job(&"root-1".to_string()).await.unwrap();
        assert_eq!(fetched.id, "root-1");
        assert_eq!(fetched.status, JobStatus::Pending);
    }

    #[tokio::test]
    async fn create_job_rejects_duplicate_id() {
        let pool = setup().await;
        let storage = SqliteJobStorage::new(pool);

        let job = Job::new_root("root-1", "crawl", "crawl", None, 1000, serde_json::json!({}));
        storage.create_job(&job).await.unwrap();

        let err = storage.create_job(&job).await.unwrap_err();
        assert!(matches!(err, AppError::AlreadyExists(_)));
    }

    #[tokio::test]
    async fn progress_counters_clamp_at_zero() {
        let pool = setup().await;
        let storage = SqliteJobStorage::new(pool);

        let job = Job::new_root("root-1", "crawl", "crawl", None, 1000, serde_json::json!({}));
        storage.create_job(&job).await.unwrap();

        let updated = storage
            .update_progress_counters_atomic(
                &"root-1".to_string(),
                ProgressDelta {
                    pending: -5,
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(updated.progress.pending, 0);
    }

    #[tokio::test]
    async fn progress_counters_are_commutative() {
        let pool = setup().await;
        let storage = SqliteJobStorage::new(pool);

        let job = Job::new_root("root-1", "crawl", "crawl", None, 1000, serde_json::json!({}));
        storage.create_job(&job).await.unwrap();

        storage
            .update_progress_counters_atomic(
                &"root-1".to_string(),
                ProgressDelta { total: 5, pending: 5, ..Default::default() },
            )
            .await
            .unwrap();
        storage
            .update_progress_counters_atomic(
                &"root-1".to_string(),
                ProgressDelta { completed: 1, pending: -1, ..Default::default() },
            )
            .await
            .unwrap();
        let final_job = storage
            .update_progress_counters_atomic(
                &"root-1".to_string(),
                ProgressDelta { completed: 1, pending: -1, failed: 1, ..Default::default() },
            )
            .await
            .unwrap();

        assert_eq!(final_job.progress.total, 5);
        assert_eq!(final_job.progress.pending, 3);
        assert_eq!(final_job.progress.completed, 2);
        assert_eq!(final_job.progress.failed, 1);
    }

    #[tokio::test]
    async fn mark_url_seen_is_idempotent() {
        let pool = setup().await;
        let storage = SqliteJobStorage::new(pool);

        let first = storage.mark_url_seen(&"root-1".to_string(), "http://example.com").await.unwrap();
        let second = storage.mark_url_seen(&"root-1".to_string(), "http://example.com").await.unwrap();

        assert!(first);
        assert!(!second);
    }

    #[tokio::test]
    async fn update_status_is_idempotent_once_terminal() {
        let pool = setup().await;
        let storage = SqliteJobStorage::new(pool);

        let job = Job::new_root("root-1", "crawl", "crawl", None, 1000, serde_json::json!({}));
        storage.create_job(&job).await.unwrap();

        storage
            .update_status(
                &"root-1".to_string(),
                StatusUpdate { status: JobStatus::Completed, error: None },
            )
            .await
            .unwrap();
        storage
            .update_status(
                &"root-1".to_string(),
                StatusUpdate { status: JobStatus::Failed, error: Some("late write".to_string()) },
            )
            .await
            .unwrap();

        let fetched = storage.get_job(&"root-1".to_string()).await.unwrap();
        assert_eq!(fetched.status, JobStatus::Completed);
        assert!(fetched.error.is_none());
    }

    #[tokio::test]
    async fn delete_job_rejects_non_terminal_root() {
        let pool = setup().await;
        let storage = SqliteJobStorage::new(pool);

        let job = Job::new_root("root-1", "crawl", "crawl", None, 1000, serde_json::json!({}));
        storage.create_job(&job).await.unwrap();

        let err = storage.delete_job(&"root-1".to_string()).await.unwrap_err();
        assert!(matches!(err, AppError::InvalidState(_)));
    }

    #[tokio::test]
    async fn delete_job_cascades_to_terminal_children() {
        let pool = setup().await;
        let storage = SqliteJobStorage::new(pool);

        let mut root = Job::new_root("root-1", "crawl", "crawl", None, 1000, serde_json::json!({}));
        root.transition_terminal(JobStatus::Completed, 2000);
        storage.create_job(&root).await.unwrap();

        let mut child = Job::new_child("child-1", "root-1", "crawler_url", "child", 1000, serde_json::json!({}));
        child.transition_terminal(JobStatus::Completed, 2000);
        storage.create_job(&child).await.unwrap();

        storage.delete_job(&"root-1".to_string()).await.unwrap();

        assert!(storage.get_job(&"root-1".to_string()).await.is_err());
        assert!(storage.get_job(&"child-1".to_string()).await.is_err());
    }

    #[tokio::test]
    async fn find_stale_roots_only_returns_non_terminal_roots() {
        let pool = setup().await;
        let storage = SqliteJobStorage::new(pool);

        let mut stale_root = Job::new_root("root-1", "crawl", "crawl", None, 1000, serde_json::json!({}));
        stale_root.last_heartbeat = 1000;
        storage.create_job(&stale_root).await.unwrap();

        let mut fresh_root = Job::new_root("root-2", "crawl", "crawl", None, 1000, serde_json::json!({}));
        fresh_root.last_heartbeat = 9_000_000;
        storage.create_job(&fresh_root).await.unwrap();

        let stale = storage.find_stale_roots(5000).await.unwrap();
        assert_eq!(stale.len(), 1);
        assert_eq!(stale[0].id, "root-1");
    }
}
