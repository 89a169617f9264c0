// StepManager contract (spec §4.5) — turns one JobDefinition step into a
// parent Job plus its initial child set. Each StepManager differs only in
// how it computes the child set; the shared mechanics (create parent,
// persist child rows before enqueue, set progress.total/pending) live in
// `common`.

pub mod ai_transform;
pub mod cleanup;
pub mod common;
pub mod crawl;
pub mod database_maintenance;
pub mod github_actions;
pub mod github_repo;
pub mod reindex;
pub mod validation_steps;
pub mod web_search;

use async_trait::async_trait;
use std::sync::Arc;

use crate::domain::{JobDefinition, JobId, JobStep};
use crate::error::Result;
use crate::port::{
    AuthStorage, DocumentStorage, EventBus, GeminiClient, GitHubConnector, IdProvider,
    JobDefinitionStorage, JobLogStorage, JobStorage, KeyValueStorage, LlmClient, QueueStorage,
    Scraper, SourceStorage, TimeProvider,
};

/// Shared dependencies handed to every StepManager — passed explicitly,
/// never module-level mutable state (spec §9).
#[derive(Clone)]
pub struct StepContext {
    pub job_storage: Arc<dyn JobStorage>,
    pub queue_storage: Arc<dyn QueueStorage>,
    pub event_bus: Arc<dyn EventBus>,
    pub document_storage: Arc<dyn DocumentStorage>,
    pub job_log_storage: Arc<dyn JobLogStorage>,
    pub job_definition_storage: Arc<dyn JobDefinitionStorage>,
    pub kv_storage: Arc<dyn KeyValueStorage>,
    pub auth_storage: Arc<dyn AuthStorage>,
    pub source_storage: Arc<dyn SourceStorage>,
    pub scraper: Arc<dyn Scraper>,
    pub llm_client: Arc<dyn LlmClient>,
    pub github_connector: Arc<dyn GitHubConnector>,
    pub gemini_client: Arc<dyn GeminiClient>,
    pub time_provider: Arc<dyn TimeProvider>,
    pub id_provider: Arc<dyn IdProvider>,
}

#[async_trait]
pub trait StepManager: Send + Sync {
    /// Validate/decompose/enqueue for one step; returns the new parent's id.
    /// `parent_job_id` is the previous step's returned id (or `None` for
    /// the first step) — available for steps that chain off a prior
    /// step's output, though most StepManagers ignore it.
    async fn create_parent_job(
        &self,
        ctx: &StepContext,
        step: &JobStep,
        definition: &JobDefinition,
        parent_job_id: Option<&str>,
    ) -> Result<JobId>;

    /// Whether the Orchestrator must wait for this step's children to
    /// reach terminal status before moving to the next step (spec §4.4).
    fn returns_child_jobs(&self) -> bool;
}
