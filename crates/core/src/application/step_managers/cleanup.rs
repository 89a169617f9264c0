// Cleanup StepManager (spec §4.5, §9 open question 2): produces a single
// child that performs the whole operation. The child JobKind deletes
// eligible terminal jobs via the cascading `JobStorage::delete_job` path
// (the manager-level cascade, never a raw row delete — see DESIGN.md).

use async_trait::async_trait;

use crate::domain::{JobDefinition, JobId, JobStep};
use crate::error::Result;

use super::common::{new_parent_job, plan_child, spawn_children, PlannedChild};
use super::{StepContext, StepManager};

pub const ACTION: &str = "cleanup";
pub const JOB_TYPE: &str = "cleanup";
pub const MESSAGE_TYPE: &str = "cleanup";

/// Hard minimum retention enforced regardless of config (spec §3).
pub const MIN_RETENTION_DAYS: i64 = 7;

pub struct CleanupStepManager;

#[async_trait]
impl StepManager for CleanupStepManager {
    async fn create_parent_job(
        &self,
        ctx: &StepContext,
        step: &JobStep,
        definition: &JobDefinition,
        _parent_job_id: Option<&str>,
    ) -> Result<JobId> {
        let payload = serde_json::to_value(&step.config).unwrap_or(serde_json::json!({}));
        let mut parent = new_parent_job(ctx, JOB_TYPE, &step.name, Some(definition.id.clone()), payload.clone());
        ctx.job_storage.create_job(&parent).await?;

        let child: PlannedChild = plan_child(
            &ctx.id_provider,
            &ctx.time_provider,
            &parent.id,
            MESSAGE_TYPE,
            "cleanup sweep",
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
