// Pre-validation / post-summarization StepManagers (spec §1, §3): these
// are explicitly modeled only as job kinds with their configuration
// contracts, not their domain logic — the StepManager side just enqueues
// one child of the matching message type; `generic_operation`'s JobKind
// handles the (stub) execution.

use async_trait::async_trait;

use crate::domain::{JobDefinition, JobId, JobStep};
use crate::error::Result;

use super::common::{new_parent_job, plan_child, spawn_children, PlannedChild};
use super::{StepContext, StepManager};

pub struct ContractOnlyStepManager {
    pub job_type: &'static str,
    pub message_type: &'static str,
}

pub const PRE_VALIDATION: ContractOnlyStepManager = ContractOnlyStepManager {
    job_type: "pre_validation",
    message_type: "pre_validation",
};

pub const POST_SUMMARIZATION: ContractOnlyStepManager = ContractOnlyStepManager {
    job_type: "post_summarization",
    message_type: "post_summarization",
};

#[async_trait]
impl StepManager for ContractOnlyStepManager {
    async fn create_parent_job(
        &self,
        ctx: &StepContext,
        step: &JobStep,
        definition: &JobDefinition,
        _parent_job_id: Option<&str>,
    ) -> Result<JobId> {
        let payload = serde_json::to_value(&step.config).unwrap_or(serde_json::json!({}));
        let mut parent = new_parent_job(ctx, self.job_type, &step.name, Some(definition.id.clone()), payload.clone());
        ctx.job_storage.create_job(&parent).await?;

        let child: PlannedChild = plan_child(
            &ctx.id_provider,
            &ctx.time_provider,
            &parent.id,
            self.message_type,
            self.job_type,
            self.message_type,
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
