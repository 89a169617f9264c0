// JobKind contract (spec §4.3) — code that processes one queue message,
// optionally spawning more children.

pub mod cleanup;
pub mod common;
pub mod completion_probe;
pub mod crawler_url;
pub mod generic_operation;
pub mod reindex;
pub mod summarizer;

use crate::domain::JobMessage;
use crate::error::Result;
use crate::port::{
    DocumentStorage, EventBus, GeminiClient, GitHubConnector, IdProvider, JobDefinitionStorage,
    JobLogStorage, JobStorage, KeyValueStorage, LlmClient, QueueStorage, Scraper, TimeProvider,
};
use async_trait::async_trait;
use std::sync::Arc;

use super::worker::ShutdownToken;

/// Shared dependencies handed to every JobKind (spec §9: "passed explicitly
/// in the worker's constructed context", never module-level mutable state).
#[derive(Clone)]
pub struct JobContext {
    pub job_storage: Arc<dyn JobStorage>,
    pub queue_storage: Arc<dyn QueueStorage>,
    pub event_bus: Arc<dyn EventBus>,
    pub document_storage: Arc<dyn DocumentStorage>,
    pub job_log_storage: Arc<dyn JobLogStorage>,
    pub job_definition_storage: Arc<dyn JobDefinitionStorage>,
    pub kv_storage: Arc<dyn KeyValueStorage>,
    pub scraper: Arc<dyn Scraper>,
    pub llm_client: Arc<dyn LlmClient>,
    pub github_connector: Arc<dyn GitHubConnector>,
    pub gemini_client: Arc<dyn GeminiClient>,
    pub time_provider: Arc<dyn TimeProvider>,
    pub id_provider: Arc<dyn IdProvider>,
    pub shutdown: ShutdownToken,
}

/// Whether an execution failure should be retried (lease-expiry redelivery)
/// or treated as final (spec §4.3).
#[derive(Debug, Clone)]
pub enum JobKindError {
    Retryable(String),
    Terminal(String),
}

impl std::fmt::Display for JobKindError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobKindError::Retryable(m) => write!(f, "retryable: {m}"),
            JobKindError::Terminal(m) => write!(f, "terminal: {m}"),
        }
    }
}

#[async_trait]
pub trait JobKind: Send + Sync {
    /// Config/shape check (spec §4.3).
    async fn validate(&self, msg: &JobMessage) -> Result<()>;

    /// The body. `ctx.shutdown` MUST be honored promptly so the lease is
    /// released quickly on cancellation (spec §5).
    async fn execute(&self, ctx: &JobContext, msg: &JobMessage) -> Result<(), JobKindError>;
}
