// Reindex StepManager (spec §4.5, §9 open question 3): a single child that
// rebuilds the document full-text index. `ReindexJob::validate`'s only
// real requirement is that `dry_run`, if present, is a JSON boolean (the
// teacher's original dead tautology `!dry_run && dry_run` is not
// reproduced).

use async_trait::async_trait;

use crate::domain::{JobDefinition, JobId, JobStep};
use crate::error::{AppError, Result};

use super::common::{new_parent_job, plan_child, spawn_children, PlannedChild};
use super::{StepContext, StepManager};

pub const ACTION: &str = "reindex";
pub const JOB_TYPE: &str = "reindex";
pub const MESSAGE_TYPE: &str = "reindex";

pub struct ReindexStepManager;

fn validate_dry_run(step: &JobStep) -> Result<()> {
    if let Some(value) = step.config.get("dry_run") {
        if !value.is_boolean() {
            return Err(AppError::Validation(
                "reindex 'dry_run', if present, must be a boolean".to_string(),
            ));
        }
    }
    Ok(())
}

#[async_trait]
impl StepManager for ReindexStepManager {
    async fn create_parent_job(
        &self,
        ctx: &StepContext,
        step: &JobStep,
        definition: &JobDefinition,
        _parent_job_id: Option<&str>,
    ) -> Result<JobId> {
        validate_dry_run(step)?;

        let payload = serde_json::to_value(&step.config).unwrap_or(serde_json::json!({}));
        let mut parent = new_parent_job(ctx, JOB_TYPE, &step.name, Some(definition.id.clone()), payload.clone());
        ctx.job_storage.create_job(&parent).await?;

        let child: PlannedChild = plan_child(
            &ctx.id_provider,
            &ctx.time_provider,
            &parent.id,
            MESSAGE_TYPE,
            "rebuild fts index",
            MESSAGE_TYPE,
            None,
            None,
            Some(definition.id.clone()),
            payload,
        );

        spawn_children(ctx, &mut parent, vec![child]).await?;
        Ok(parent.id)
    }

    fn returns_child_jobs(&self) -> bool {
        true
    }
}
