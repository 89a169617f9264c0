// Crawler StepManager (spec §4.5): creates one or more seed URL children
// per definition-provided seed. The per-message config carries everything
// the `crawler_url` JobKind needs to merge against the global Scraper
// config (spec §4.6 step 2).

use async_trait::async_trait;

use crate::domain::{JobDefinition, JobId, JobStep};
use crate::error::{AppError, Result};

use super::common::{config_str_vec, new_parent_job, plan_child, spawn_children, PlannedChild};
use super::{StepContext, StepManager};

pub const ACTION: &str = "crawl";
pub const JOB_TYPE: &str = "crawl";
pub const MESSAGE_TYPE: &str = "crawler_url";

pub struct CrawlStepManager;

#[async_trait]
impl StepManager for CrawlStepManager {
    async fn create_parent_job(
        &self,
        ctx: &StepContext,
        step: &JobStep,
        definition: &JobDefinition,
        _parent_job_id: Option<&str>,
    ) -> Result<JobId> {
        let seed_urls = config_str_vec(&step.config, "seed_urls");
        if seed_urls.is_empty() {
            return Err(AppError::Validation(
                "crawl step requires a non-empty seed_urls[]".to_string(),
            ));
        }

        let payload = serde_json::to_value(&step.config).unwrap_or(serde_json::json!({}));
        let mut parent = new_parent_job(
            ctx,
            JOB_TYPE,
            &step.name,
            Some(definition.id.clone()),
            payload.clone(),
        );
        ctx.job_storage.create_job(&parent).await?;

        let children: Vec<PlannedChild> = seed_urls
            .into_iter()
            .map(|url| {
                let message_config = merge_message_config(&payload, &url);
                plan_child(
                    &ctx.id_provider,
                    &ctx.time_provider,
                    &parent.id,
                    MESSAGE_TYPE,
                    &format!("seed: {url}"),
                    MESSAGE_TYPE,
                    Some(url),
                    Some(0),
                    Some(definition.id.clone()),
                    message_config,
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

fn merge_message_config(step_config: &serde_json::Value, _url: &str) -> serde_json::Value {
    step_config.clone()
}
