// Cleanup JobKind (spec §4.5, §9 open question 2): sweeps terminal jobs
// older than the configured retention, deleting each via the cascading
// `JobStorage::delete_job` path (never a raw row delete).

use async_trait::async_trait;

use crate::application::job_kinds::common::{first_touch_root, settle_child, SettleOutcome};
use crate::application::step_managers::common::config_i64;
use crate::application::step_managers::cleanup::MIN_RETENTION_DAYS;
use crate::domain::{JobMessage, JobStatus};
use crate::error::Result;
use crate::port::JobFilter;

use super::{JobContext, JobKind, JobKindError};

pub const MESSAGE_TYPE: &str = "cleanup";

const DAY_MS: i64 = 24 * 60 * 60 * 1000;

pub struct Cleanup;

#[async_trait]
impl JobKind for Cleanup {
    async fn validate(&self, msg: &JobMessage) -> Result<()> {
        if msg.parent_id.as_deref().unwrap_or("").is_empty() {
            return Err(crate::error::AppError::Validation(
                "cleanup message requires parent_id (root job id)".to_string(),
            ));
        }
        Ok(())
    }

    async fn execute(&self, ctx: &JobContext, msg: &JobMessage) -> Result<(), JobKindError> {
        let root_id = msg.parent_id.clone().expect("validated");

        let mut root = ctx
            .job_storage
            .get_job(&root_id)
            .await
            .map_err(|e| JobKindError::Retryable(e.to_string()))?;
        first_touch_root(&ctx.job_storage, &ctx.event_bus, &ctx.time_provider, &mut root, None, None)
            .await
            .map_err(|e| JobKindError::Retryable(e.to_string()))?;

        let config = msg.config.as_object().cloned().unwrap_or_default();
        let retention_days = config_i64(&config, "retention_days")
            .unwrap_or(MIN_RETENTION_DAYS)
            .max(MIN_RETENTION_DAYS);
        let cutoff = ctx.time_provider.now_millis() - retention_days * DAY_MS;

        for status in [JobStatus::Completed, JobStatus::Failed, JobStatus::Cancelled] {
            let candidates = ctx
                .job_storage
                .list_jobs(JobFilter {
                    status: Some(status),
                    created_before: Some(cutoff),
                    limit: -1,
                    ..Default::default()
                })
                .await
                .map_err(|e| JobKindError::Retryable(e.to_string()))?;

            for job in candidates {
                if job.id == root_id {
                    continue;
                }
                if let Err(e) = ctx.job_storage.delete_job(&job.id).await {
                    tracing::warn!(job_id = %job.id, error = %e, "cleanup: skipped job still in-flight");
                }
            }
        }

        settle_child(ctx, &root_id, Some(&msg.id), SettleOutcome::Success, None, 0, 0)
            .await
            .map_err(|e| JobKindError::Retryable(e.to_string()))?;

        Ok(())
    }
}
