// Database maintenance StepManager (spec §4.5): enqueues one child per
// operation name, defaulting to the full set if none is supplied.

use async_trait::async_trait;

use crate::domain::{JobDefinition, JobId, JobStep};
use crate::error::Result;

use super::common::{config_str_vec, new_parent_job, plan_child, spawn_children, PlannedChild};
use super::{StepContext, StepManager};

pub const ACTION: &str = "database_maintenance";
pub const JOB_TYPE: &str = "database_maintenance";
pub const MESSAGE_TYPE: &str = "database_maintenance_operation";

const DEFAULT_OPERATIONS: [&str; 4] = ["vacuum", "analyze", "reindex", "optimize"];

pub struct DatabaseMaintenanceStepManager;

#[async_trait]
impl StepManager for DatabaseMaintenanceStepManager {
    async fn create_parent_job(
        &self,
        ctx: &StepContext,
        step: &JobStep,
        definition: &JobDefinition,
        _parent_job_id: Option<&str>,
    ) -> Result<JobId> {
        let mut operations = config_str_vec(&step.config, "operations");
        if operations.is_empty() {
            operations = DEFAULT_OPERATIONS.iter().map(|s| s.to_string()).collect();
        }

        let payload = serde_json::to_value(&step.config).unwrap_or(serde_json::json!({}));
        let mut parent = new_parent_job(ctx, JOB_TYPE, &step.name, Some(definition.id.clone()), payload);
        ctx.job_storage.create_job(&parent).await?;

        let children: Vec<PlannedChild> = operations
            .into_iter()
            .map(|op| {
                let config = serde_json::json!({ "operation": op });
                plan_child(
                    &ctx.id_provider,
                    &ctx.time_provider,
                    &parent.id,
                    MESSAGE_TYPE,
                    &op,
                    MESSAGE_TYPE,
                    None,
                    None,
                    Some(definition.id.clone()),
                    config,
                )
            })
            .collect();

        spawn_children(ctx, &mut parent, children).await?;
        Ok(parent.id)
    }

    fn returns_child_jobs(&self) -> bool {
        true
    }
}
