// SQLite Maintenance Implementation (spec §7): VACUUM, retention GC, and
// point-in-time stats, driven by the orchestrator's maintenance scheduler.
use async_trait::async_trait;
use semantica_core::domain::JobStatus;
use semantica_core::error::{AppError, Result};
use semantica_core::port::{Maintenance, MaintenanceStats, TimeProvider};
use sqlx::SqlitePool;
use std::sync::Arc;
use tracing::info;

/// SQLite maintenance implementation
pub struct SqliteMaintenance {
    pool: SqlitePool,
    time_provider: Arc<dyn TimeProvider>,
}

impl SqliteMaintenance {
    pub fn new(pool: SqlitePool, time_provider: Arc<dyn TimeProvider>) -> Self {
        Self {
            pool,
            time_provider,
        }
    }

    /// Get DB file size in MB
    async fn get_db_size(&self) -> Result<f64> {
        let page_count: i64 = sqlx::query_scalar("PRAGMA page_count")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| AppError::Internal(format!("failed to get page count: {e}")))?;

        let page_size: i64 = sqlx::query_scalar("PRAGMA page_size")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| AppError::Internal(format!("failed to get page size: {e}")))?;

        let size_bytes = page_count * page_size;
        Ok(size_bytes as f64 / (1024.0 * 1024.0))
    }
}

#[async_trait]
impl Maintenance for SqliteMaintenance {
    async fn vacuum(&self) -> Result<f64> {
        info!("running VACUUM to optimize database");

        let size_before = self.get_db_size().await?;

        sqlx::query("VACUUM")
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::Internal(format!("VACUUM failed: {e}")))?;

        let size_after = self.get_db_size().await?;
        let reclaimed = (size_before - size_after).max(0.0);

        info!(
            size_before_mb = size_before,
            size_after_mb = size_after,
            reclaimed_mb = reclaimed,
            "VACUUM completed"
        );

        Ok(reclaimed)
    }

    async fn gc_finished_jobs(&self, retention_days: i64) -> Result<i64> {
        let now = self.time_provider.now_millis();
        let cutoff_time = now - retention_days * 24 * 60 * 60 * 1000;

        info!(retention_days, cutoff_time, "running finished job GC");

        // Only root jobs are deleted directly; children cascade with their
        // parent (spec §9, parent/child hierarchy is flat so every
        // descendant's parent_id already points at the root).
        let result = sqlx::query(
            r#"
            DELETE FROM jobs
            WHERE parent_id IS NULL
            AND status IN (?, ?, ?)
            AND completed_at IS NOT NULL
            AND completed_at < ?
            "#,
        )
        .bind(JobStatus::Completed.to_string())
        .bind(JobStatus::Failed.to_string())
        .bind(JobStatus::Cancelled.to_string())
        .bind(cutoff_time)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::Internal(format!("job GC failed: {e}")))?;

        let roots_deleted = result.rows_affected() as i64;

        let children_deleted = sqlx::query(
            "DELETE FROM jobs WHERE parent_id IS NOT NULL AND parent_id NOT IN (SELECT id FROM jobs)",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::Internal(format!("orphaned child GC failed: {e}")))?
        .rows_affected() as i64;

        sqlx::query(
            "DELETE FROM job_seen_urls WHERE root_job_id NOT IN (SELECT id FROM jobs)",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::Internal(format!("seen-url GC failed: {e}")))?;

        sqlx::query(
            "DELETE FROM job_log_entries WHERE root_job_id NOT IN (SELECT id FROM jobs)",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::Internal(format!("log entry GC failed: {e}")))?;

        let deleted = roots_deleted + children_deleted;
        info!(deleted_jobs = deleted, "finished job GC completed");

        Ok(deleted)
    }

    async fn gc_artifacts(&self, retention_days: i64) -> Result<usize> {
        let now = self.time_provider.now_millis();
        let cutoff_time = now - retention_days * 24 * 60 * 60 * 1000;

        info!(retention_days, cutoff_time, "running document GC");

        // Documents are the only durable artifact this system produces;
        // retention is keyed off their own created_at rather than their
        // source job's lifecycle, which may already be gone.
        let result = sqlx::query("DELETE FROM documents WHERE created_at < ?")
            .bind(cutoff_time)
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::Internal(format!("document GC failed: {e}")))?;

        let deleted = result.rows_affected() as usize;
        info!(deleted_artifacts = deleted, "document GC completed");

        Ok(deleted)
    }

    async fn get_stats(&self) -> Result<MaintenanceStats> {
        let db_size_mb = self.get_db_size().await?;

        let job_count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM jobs")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| AppError::Internal(format!("failed to count jobs: {e}")))?;

        let finished_job_count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM jobs WHERE status IN (?, ?, ?)",
        )
        .bind(JobStatus::Completed.to_string())
        .bind(JobStatus::Failed.to_string())
        .bind(JobStatus::Cancelled.to_string())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::Internal(format!("failed to count finished jobs: {e}")))?;

        let artifact_count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM documents")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| AppError::Internal(format!("failed to count documents: {e}")))?;

        let db_size_bytes = (db_size_mb * 1024.0 * 1024.0) as i64;

        let fragmentation_percent = if job_count > 0 {
            (finished_job_count as f64 / job_count as f64) * 100.0
        } else {
            0.0
        };

        Ok(MaintenanceStats {
            db_size_mb,
            db_size_bytes,
            job_count,
            finished_job_count,
            artifact_count: artifact_count as usize,
            log_files_size_mb: 0.0,
            fragmentation_percent,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{create_pool, run_migrations, SqliteJobStorage};
    use semantica_core::domain::Job;
    use semantica_core::port::time_provider::SystemTimeProvider;
    use semantica_core::port::JobStorage;

    #[tokio::test]
    async fn test_maintenance_stats() {
        let pool = create_pool("sqlite::memory:").await.unwrap();
        run_migrations(&pool).await.unwrap();

        let time_provider = Arc::new(SystemTimeProvider);
        let maintenance = SqliteMaintenance::new(pool, time_provider);

        let stats = maintenance.get_stats().await.unwrap();

        assert!(stats.db_size_mb > 0.0);
        assert_eq!(stats.job_count, 0);
        assert_eq!(stats.finished_job_count, 0);
    }

    #[tokio::test]
    async fn test_vacuum() {
        let pool = create_pool("sqlite::memory:").await.unwrap();
        run_migrations(&pool).await.unwrap();

        let time_provider = Arc::new(SystemTimeProvider);
        let maintenance = SqliteMaintenance::new(pool, time_provider);

        let reclaimed = maintenance.vacuum().await.unwrap();
        assert!(reclaimed >= 0.0);
    }

    #[tokio::test]
    async fn test_gc_finished_jobs() {
        let pool = create_pool("sqlite::memory:").await.unwrap();
        run_migrations(&pool).await.unwrap();

        let time_provider = Arc::new(SystemTimeProvider);
        let job_storage = SqliteJobStorage::new(pool.clone());
        let maintenance = SqliteMaintenance::new(pool, time_provider.clone());

        let now_ms = time_provider.now_millis();
        let ten_days_ago = now_ms - (10 * 24 * 60 * 60 * 1000);

        let mut job = Job::new_root(
            "root-1",
            "crawl",
            "root job",
            None,
            now_ms,
            serde_json::json!({}),
        );
        job.status = JobStatus::Completed;
        job.completed_at = Some(ten_days_ago);

        job_storage.create_job(&job).await.unwrap();

        let deleted = maintenance.gc_finished_jobs(7).await.unwrap();
        assert_eq!(deleted, 1);

        let found = job_storage.get_job(&job.id).await;
        assert!(found.is_err());
    }
}
