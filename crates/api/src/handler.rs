//! RPC Method Handlers
//!
//! Implements the business logic for each JSON-RPC method.

use crate::error::to_rpc_error;
use crate::rate_limiter::RateLimiter;
use crate::types::{
    GetJobRequest, GetJobResponse, ListJobsRequest, ListJobsResponse, SubmitDefinitionRequest,
    SubmitDefinitionResponse,
};
use jsonrpsee::types::ErrorObjectOwned;
use semantica_core::application::step_managers::StepContext;
use semantica_core::application::Orchestrator;
use semantica_core::error::AppError;
use semantica_core::port::{JobDefinitionStorage, JobFilter, JobStorage};
use std::str::FromStr;
use std::sync::Arc;

/// RPC Handler with injected dependencies. The Orchestrator is run
/// synchronously here — this admin surface stays deliberately thin (spec
/// §1, §6) so there is no separate job-submission queue of its own; a
/// definition run is bounded by the orchestrator's own per-step timeout
/// (spec §4.4).
pub struct RpcHandler {
    job_definition_storage: Arc<dyn JobDefinitionStorage>,
    job_storage: Arc<dyn JobStorage>,
    orchestrator: Arc<Orchestrator>,
    step_ctx: StepContext,
    rate_limiter: Arc<RateLimiter>,
}

impl RpcHandler {
    pub fn new(
        job_definition_storage: Arc<dyn JobDefinitionStorage>,
        job_storage: Arc<dyn JobStorage>,
        orchestrator: Arc<Orchestrator>,
        step_ctx: StepContext,
    ) -> Self {
        // Default: 200 burst, 100 req/sec (configurable via env)
        let max_burst: u32 = std::env::var("SEMANTICA_RATE_LIMIT_BURST")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(200);

        let rate_per_sec: u32 = std::env::var("SEMANTICA_RATE_LIMIT_RATE")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(100);

        Self {
            job_definition_storage,
            job_storage,
            orchestrator,
            step_ctx,
            rate_limiter: Arc::new(RateLimiter::new(max_burst, rate_per_sec)),
        }
    }

    fn check_rate_limit(allowed: bool) -> Result<(), ErrorObjectOwned> {
        if allowed {
            Ok(())
        } else {
            Err(jsonrpsee::types::error::ErrorObject::owned(
                crate::error::code::THROTTLED,
                "Rate limit exceeded. Please slow down.",
                None::<()>,
            ))
        }
    }

    /// definition.submit.v1
    pub async fn submit_definition(
        &self,
        params: SubmitDefinitionRequest,
    ) -> Result<SubmitDefinitionResponse, ErrorObjectOwned> {
        Self::check_rate_limit(self.rate_limiter.check().await)?;

        self.job_definition_storage
            .save(&params.definition)
            .await
            .map_err(to_rpc_error)?;

        let final_job_id = self
            .orchestrator
            .run(&self.step_ctx, &params.definition)
            .await
            .map_err(to_rpc_error)?;

        Ok(SubmitDefinitionResponse {
            job_definition_id: params.definition.id,
            final_job_id,
        })
    }

    /// job.get.v1
    pub async fn get_job(&self, params: GetJobRequest) -> Result<GetJobResponse, ErrorObjectOwned> {
        let job = self
            .job_storage
            .get_job(&params.job_id)
            .await
            .map_err(to_rpc_error)?;
        Ok(GetJobResponse { job })
    }

    /// job.list.v1
    pub async fn list_jobs(
        &self,
        params: ListJobsRequest,
    ) -> Result<ListJobsResponse, ErrorObjectOwned> {
        let status = params
            .status
            .map(|s| semantica_core::domain::JobStatus::from_str(&s))
            .transpose()
            .map_err(|e| to_rpc_error(AppError::Validation(e.to_string())))?;

        let filter = JobFilter {
            status,
            source_type: params.source_type,
            limit: params.limit,
            offset: params.offset,
            order_by: params.order_by,
            created_after: params.created_after,
            created_before: params.created_before,
        };

        let jobs = self
            .job_storage
            .list_jobs(filter)
            .await
            .map_err(to_rpc_error)?;
        Ok(ListJobsResponse { jobs })
    }
}
