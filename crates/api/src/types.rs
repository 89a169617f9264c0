//! RPC Request/Response Types
//!
//! Defines the JSON-RPC method parameters and results (ADR-020). The admin
//! surface is a thin, deliberately narrow slice (spec §1, §6: the CLI/HTTP
//! admin surface is out of scope as a feature) — three methods cover
//! submitting a definition and reading back job state.

use semantica_core::domain::{Job, JobDefinition};
use serde::{Deserialize, Serialize};

/// definition.submit.v1 - submit a JobDefinition for the Orchestrator to run.
#[derive(Debug, Deserialize)]
pub struct SubmitDefinitionRequest {
    pub definition: JobDefinition,
}

#[derive(Debug, Clone, Serialize)]
pub struct SubmitDefinitionResponse {
    pub job_definition_id: String,
    /// Id of the last step's parent job (the final link in the orchestrator
    /// chain), per `Orchestrator::run`'s return value.
    pub final_job_id: String,
}

/// job.get.v1 - fetch one job record by id.
#[derive(Debug, Deserialize)]
pub struct GetJobRequest {
    pub job_id: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct GetJobResponse {
    pub job: Job,
}

/// job.list.v1 - list job records with the same filter shape as
/// `JobStorage::list_jobs` (spec §4.1).
#[derive(Debug, Deserialize)]
pub struct ListJobsRequest {
    pub status: Option<String>,
    pub source_type: Option<String>,
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
    pub order_by: Option<String>,
    pub created_after: Option<i64>,
    pub created_before: Option<i64>,
}

fn default_limit() -> i64 {
    50
}

#[derive(Debug, Clone, Serialize)]
pub struct ListJobsResponse {
    pub jobs: Vec<Job>,
}
