// Reindex JobKind (spec §4.5): rebuilds the document full-text index via
// `DocumentStorage::rebuild_fts_index`. `dry_run` skips the rebuild but
// still settles the child successfully (spec §9 open question 3).

use async_trait::async_trait;

use crate::application::job_kinds::common::{first_touch_root, settle_child, SettleOutcome};
use crate::application::step_managers::common::config_bool;
use crate::domain::JobMessage;
use crate::error::Result;

use super::{JobContext, JobKind, JobKindError};

pub const MESSAGE_TYPE: &str = "reindex";

pub struct Reindex;

#[async_trait]
impl JobKind for Reindex {
    async fn validate(&self, msg: &JobMessage) -> Result<()> {
        if msg.parent_id.as_deref().unwrap_or("").is_empty() {
            return Err(crate::error::AppError::Validation(
                "reindex message requires parent_id (root job id)".to_string(),
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
        let dry_run = config_bool(&config, "dry_run").unwrap_or(false);

        if !dry_run {
            ctx.document_storage
                .rebuild_fts_index()
                .await
                .map_err(|e| JobKindError::Retryable(e.to_string()))?;
        }

        settle_child(ctx, &root_id, Some(&msg.id), SettleOutcome::Success, None, 0, 0)
            .await
            .map_err(|e| JobKindError::Retryable(e.to_string()))?;

        Ok(())
    }
}
