// JobDefinition / JobStep domain model (spec §3)
//
// User-authored template; immutable during a run. Created externally
// (JobDefinitionStorage), walked by the Orchestrator.

use serde::{Deserialize, Serialize};

pub type JobDefinitionId = String;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureAction {
    StopAll,
    Continue,
    MarkWarning,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorTolerance {
    pub max_child_failures: i64,
    pub failure_action: FailureAction,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobStep {
    pub name: String,
    /// Selects a StepManager: crawl, ai, web_search, github_repo_fetch,
    /// github_actions_fetch, transform, reindex, cleanup,
    /// database_maintenance, pre_validation, post_summarization.
    pub action: String,
    /// May contain `{var}` placeholders resolved against KeyValueStorage
    /// before dispatch.
    pub config: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobDefinition {
    pub id: JobDefinitionId,
    pub steps: Vec<JobStep>,
    pub source_type: Option<String>,
    pub entity_type: Option<String>,
    pub tags: Vec<String>,
    pub error_tolerance: Option<ErrorTolerance>,
}
