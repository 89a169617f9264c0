// GitHub Actions StepManager (spec §4.5): enumerates workflow runs via the
// GitHubConnector, capped by `limit`, and enqueues one `github_action_log`
// child per run.

use async_trait::async_trait;

use crate::domain::{JobDefinition, JobId, JobStep};
use crate::error::{AppError, Result};

use super::common::{config_i64, config_str, new_parent_job, plan_child, spawn_children, PlannedChild};
use super::{StepContext, StepManager};

pub const ACTION: &str = "github_actions_fetch";
pub const JOB_TYPE: &str = "github_actions_fetch";
pub const MESSAGE_TYPE: &str = "github_action_log";

const DEFAULT_LIMIT: i64 = 50;

pub struct GitHubActionsStepManager;

#[async_trait]
impl StepManager for GitHubActionsStepManager {
    async fn create_parent_job(
        &self,
        ctx: &StepContext,
        step: &JobStep,
        definition: &JobDefinition,
        _parent_job_id: Option<&str>,
    ) -> Result<JobId> {
        let repo = config_str(&step.config, "repo")
            .ok_or_else(|| AppError::Validation("github_actions_fetch requires 'repo'".to_string()))?
            .to_string();
        let limit = config_i64(&step.config, "limit").unwrap_or(DEFAULT_LIMIT).max(0) as usize;

        let payload = serde_json::to_value(&step.config).unwrap_or(serde_json::json!({}));
        let mut parent = new_parent_job(ctx, JOB_TYPE, &step.name, Some(definition.id.clone()), payload);
        ctx.job_storage.create_job(&parent).await?;

        let runs = ctx
            .github_connector
            .list_workflow_runs(&repo, limit)
            .await
            .map_err(|e| AppError::Internal(format!("github list_workflow_runs failed: {e}")))?;

        let children: Vec<PlannedChild> = runs
            .into_iter()
            .map(|run| {
                let config = serde_json::json!({
                    "repo": repo,
                    "run_id": run.id,
                    "conclusion": run.conclusion,
                    "log_url": run.log_url,
                });
                plan_child(
                    &ctx.id_provider,
                    &ctx.time_provider,
                    &parent.id,
                    MESSAGE_TYPE,
                    &run.name,
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
