// GitHub repo StepManager (spec §4.5): enumerates matching files across
// branches via the GitHubConnector, capped by `max_files`, and enqueues one
// `github_repo_file` child per match.

use async_trait::async_trait;

use crate::domain::{JobDefinition, JobId, JobStep};
use crate::error::{AppError, Result};

use super::common::{config_i64, config_str, config_str_vec, new_parent_job, plan_child, spawn_children, PlannedChild};
use super::{StepContext, StepManager};

pub const ACTION: &str = "github_repo_fetch";
pub const JOB_TYPE: &str = "github_repo_fetch";
pub const MESSAGE_TYPE: &str = "github_repo_file";

const DEFAULT_MAX_FILES: i64 = 200;

pub struct GitHubRepoStepManager;

#[async_trait]
impl StepManager for GitHubRepoStepManager {
    async fn create_parent_job(
        &self,
        ctx: &StepContext,
        step: &JobStep,
        definition: &JobDefinition,
        _parent_job_id: Option<&str>,
    ) -> Result<JobId> {
        let repo = config_str(&step.config, "repo")
            .ok_or_else(|| AppError::Validation("github_repo_fetch requires 'repo'".to_string()))?
            .to_string();
        let mut branches = config_str_vec(&step.config, "branches");
        if branches.is_empty() {
            branches.push("main".to_string());
        }
        let max_files = config_i64(&step.config, "max_files").unwrap_or(DEFAULT_MAX_FILES).max(0) as usize;

        let payload = serde_json::to_value(&step.config).unwrap_or(serde_json::json!({}));
        let mut parent = new_parent_job(ctx, JOB_TYPE, &step.name, Some(definition.id.clone()), payload);
        ctx.job_storage.create_job(&parent).await?;

        let files = ctx
            .github_connector
            .list_files(&repo, &branches)
            .await
            .map_err(|e| AppError::Internal(format!("github list_files failed: {e}")))?;

        let children: Vec<PlannedChild> = files
            .into_iter()
            .take(max_files)
            .map(|path| {
                let config = serde_json::json!({ "repo": repo, "path": path, "branches": branches });
                plan_child(
                    &ctx.id_provider,
                    &ctx.time_provider,
                    &parent.id,
                    MESSAGE_TYPE,
                    &path,
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
