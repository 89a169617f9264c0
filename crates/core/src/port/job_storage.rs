// Job Lifecycle Store port (spec §4.1)

use crate::domain::{Job, JobId, JobStatus};
use crate::error::Result;
use async_trait::async_trait;

/// Filter for `list_jobs`.
#[derive(Debug, Clone, Default)]
pub struct JobFilter {
    pub status: Option<JobStatus>,
    pub source_type: Option<String>,
    pub limit: i64,
    pub offset: i64,
    pub order_by: Option<String>,
    pub created_after: Option<i64>,
    pub created_before: Option<i64>,
}

/// Aggregated child stats for a root job, used by the error-tolerance
/// policy and status reporting (spec §4.1, §4.7).
#[derive(Debug, Clone, Copy, Default)]
pub struct ChildStats {
    pub child_count: i64,
    pub failed_children: i64,
    pub running_children: i64,
}

/// Non-counter, non-atomic fields that `update_status` is allowed to touch.
#[derive(Debug, Clone)]
pub struct StatusUpdate {
    pub status: JobStatus,
    pub error: Option<String>,
}

/// Commutative delta applied by `update_progress_counters_atomic`. Every
/// counter is clamped to `>= 0` post-update by the storage implementation;
/// this is the ONLY supported path for counter change on the execution hot
/// path (spec §4.1, §9).
#[derive(Debug, Clone, Copy, Default)]
pub struct ProgressDelta {
    pub completed: i64,
    pub pending: i64,
    pub total: i64,
    pub failed: i64,
}

#[async_trait]
pub trait JobStorage: Send + Sync {
    /// Inserts a record. Fails with `AppError::AlreadyExists` on id collision.
    async fn create_job(&self, job: &Job) -> Result<()>;

    async fn get_job(&self, id: &JobId) -> Result<Job>;

    async fn list_jobs(&self, filter: JobFilter) -> Result<Vec<Job>>;

    /// Full upsert. Callers use it only for non-counter fields (status,
    /// error, timestamps) — never for progress counters.
    async fn save_job(&self, job: &Job) -> Result<()>;

    /// Writes `status`, `error`, and sets `completed_at` iff `status` is
    /// terminal. Idempotent: a job already in a terminal status is
    /// unaffected by a further status write (invariant 5, spec §8).
    async fn update_status(&self, id: &JobId, update: StatusUpdate) -> Result<()>;

    /// MUST be a single atomic write. Concurrent workers on the same root
    /// job converge to the same final counter state regardless of their
    /// serialization order (spec §4.1, §5).
    async fn update_progress_counters_atomic(&self, id: &JobId, delta: ProgressDelta)
        -> Result<Job>;

    async fn update_heartbeat(&self, id: &JobId) -> Result<()>;

    /// Atomic insert-or-ignore against the `(root_id, url)` unique index.
    /// Duplicate callers observe `is_new = false` regardless of interleaving.
    async fn mark_url_seen(&self, root_id: &JobId, url: &str) -> Result<bool>;

    async fn get_child_stats(&self, root_ids: &[JobId]) -> Result<std::collections::HashMap<JobId, ChildStats>>;

    /// Cascades to children, seen-URLs, and log entries. Fails with
    /// `AppError::InvalidState` if the job or any descendant is
    /// `running`/`pending`.
    async fn delete_job(&self, id: &JobId) -> Result<()>;

    /// Finds all root jobs still non-terminal with a stale heartbeat, used
    /// by crash recovery and the maintenance scheduler's stale-job sweep.
    async fn find_stale_roots(&self, heartbeat_before: i64) -> Result<Vec<Job>>;

    /// All of a root's descendants still `pending`/`running`, used by the
    /// `stop_all` error-tolerance action to cancel remaining work (spec §4.7).
    async fn list_non_terminal_children(&self, root_id: &JobId) -> Result<Vec<Job>>;
}
