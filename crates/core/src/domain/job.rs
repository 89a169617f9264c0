// Job Domain Model
//
// A Job is the canonical record for both root (family head) and child work
// items. Every descendant's `parent_id` points at the root, never at an
// intermediate ancestor (flat hierarchy) — see ADR note in application::orchestrator.

use serde::{Deserialize, Serialize};

pub type JobId = String;
pub type JobDefinitionId = String;

/// Job status (user-visible truth, per spec §3/§7)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobStatus::Completed | JobStatus::Failed | JobStatus::Cancelled
        )
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobStatus::Pending => write!(f, "PENDING"),
            JobStatus::Running => write!(f, "RUNNING"),
            JobStatus::Completed => write!(f, "COMPLETED"),
            JobStatus::Failed => write!(f, "FAILED"),
            JobStatus::Cancelled => write!(f, "CANCELLED"),
        }
    }
}

impl std::str::FromStr for JobStatus {
    type Err = crate::domain::DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(JobStatus::Pending),
            "RUNNING" => Ok(JobStatus::Running),
            "COMPLETED" => Ok(JobStatus::Completed),
            "FAILED" => Ok(JobStatus::Failed),
            "CANCELLED" => Ok(JobStatus::Cancelled),
            other => Err(crate::domain::DomainError::Internal(format!(
                "unknown job status: {other}"
            ))),
        }
    }
}

/// Orchestration phase (spec §3): `orchestration` jobs are StepManager
/// parents walked by the Orchestrator; `execution` jobs are children
/// processed by JobKinds off the queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobPhase {
    Orchestration,
    Execution,
}

impl std::fmt::Display for JobPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobPhase::Orchestration => write!(f, "orchestration"),
            JobPhase::Execution => write!(f, "execution"),
        }
    }
}

impl std::str::FromStr for JobPhase {
    type Err = crate::domain::DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "orchestration" => Ok(JobPhase::Orchestration),
            "execution" => Ok(JobPhase::Execution),
            other => Err(crate::domain::DomainError::Internal(format!(
                "unknown job phase: {other}"
            ))),
        }
    }
}

/// Progress counters. `pending + completed == total` at quiescence;
/// every counter is clamped to >= 0 by the storage layer's atomic mutator
/// (spec §3, §9 — commutative deltas, never read-modify-write).
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct Progress {
    pub total: i64,
    pub pending: i64,
    pub completed: i64,
    pub failed: i64,
    pub percentage: f64,
}

impl Progress {
    pub fn recompute_percentage(&mut self) {
        self.percentage = if self.total > 0 {
            ((self.completed + self.failed) as f64 / self.total as f64) * 100.0
        } else {
            0.0
        };
    }
}

/// The canonical Job record (spec §3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    /// Root if `None`. Every descendant stores the ROOT's id here, never an
    /// intermediate ancestor's (flat hierarchy, invariant 4 in spec §8).
    pub parent_id: Option<JobId>,
    pub job_definition_id: Option<JobDefinitionId>,

    /// Routes to a JobKind (e.g. `crawler_url`, `cleanup`).
    pub job_type: String,
    pub name: String,
    pub source_type: Option<String>,
    pub entity_type: Option<String>,
    pub tags: Vec<String>,

    pub phase: JobPhase,
    pub status: JobStatus,

    pub created_at: i64,
    pub started_at: Option<i64>,
    pub completed_at: Option<i64>,
    pub last_heartbeat: i64,

    pub progress: Progress,

    pub result_count: i64,
    pub failed_count: i64,
    pub error: Option<String>,

    /// Opaque serialized config/payload for this job.
    pub payload: serde_json::Value,
    pub metadata: serde_json::Value,
}

impl Job {
    /// Construct a new root job, `pending`, phase `orchestration`.
    pub fn new_root(
        id: impl Into<String>,
        job_type: impl Into<String>,
        name: impl Into<String>,
        job_definition_id: Option<String>,
        now_millis: i64,
        payload: serde_json::Value,
    ) -> Self {
        Self {
            id: id.into(),
            parent_id: None,
            job_definition_id,
            job_type: job_type.into(),
            name: name.into(),
            source_type: None,
            entity_type: None,
            tags: Vec::new(),
            phase: JobPhase::Orchestration,
            status: JobStatus::Pending,
            created_at: now_millis,
            started_at: None,
            completed_at: None,
            last_heartbeat: now_millis,
            progress: Progress::default(),
            result_count: 0,
            failed_count: 0,
            error: None,
            payload,
            metadata: serde_json::json!({}),
        }
    }

    /// Construct a new child job owned by `root_id` (flat hierarchy).
    pub fn new_child(
        id: impl Into<String>,
        root_id: impl Into<String>,
        job_type: impl Into<String>,
        name: impl Into<String>,
        now_millis: i64,
        payload: serde_json::Value,
    ) -> Self {
        Self {
            id: id.into(),
            parent_id: Some(root_id.into()),
            job_definition_id: None,
            job_type: job_type.into(),
            name: name.into(),
            source_type: None,
            entity_type: None,
            tags: Vec::new(),
            phase: JobPhase::Execution,
            status: JobStatus::Pending,
            created_at: now_millis,
            started_at: None,
            completed_at: None,
            last_heartbeat: now_millis,
            progress: Progress::default(),
            result_count: 0,
            failed_count: 0,
            error: None,
            payload,
            metadata: serde_json::json!({}),
        }
    }

    pub fn is_root(&self) -> bool {
        self.parent_id.is_none()
    }

    /// First-touch transition `pending -> running` (spec §4.6 step 4/5).
    /// Idempotent against retries: a job already `running` is a no-op.
    pub fn start(&mut self, now_millis: i64) -> crate::domain::error::Result<()> {
        match self.status {
            JobStatus::Pending => {
                self.status = JobStatus::Running;
                self.started_at = Some(now_millis);
                self.last_heartbeat = now_millis;
                Ok(())
            }
            JobStatus::Running => Ok(()),
            other => Err(crate::domain::error::DomainError::InvalidStateTransition {
                from: other.to_string(),
                to: "RUNNING".to_string(),
            }),
        }
    }

    /// Terminal transition. No-op if already terminal (invariant 5, spec §8).
    pub fn transition_terminal(&mut self, status: JobStatus, now_millis: i64) {
        if self.status.is_terminal() {
            return;
        }
        debug_assert!(status.is_terminal());
        self.status = status;
        self.completed_at = Some(now_millis);
    }
}
