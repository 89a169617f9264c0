// Web search StepManager (spec §4.5): synchronous — performs the grounded
// search itself via GeminiClient, writes one Document, and returns.
// `returns_child_jobs = false`: there is no child fan-out to wait on.

use async_trait::async_trait;

use crate::domain::{Event, JobDefinition, JobId, JobStatus, JobStep};
use crate::error::{AppError, Result};
use crate::port::{Document, StatusUpdate};

use super::common::new_parent_job;
use super::{StepContext, StepManager};

pub const ACTION: &str = "web_search";
pub const JOB_TYPE: &str = "web_search";

pub struct WebSearchStepManager;

#[async_trait]
impl StepManager for WebSearchStepManager {
    async fn create_parent_job(
        &self,
        ctx: &StepContext,
        step: &JobStep,
        definition: &JobDefinition,
        _parent_job_id: Option<&str>,
    ) -> Result<JobId> {
        let query = step
            .config
            .get("query")
            .and_then(|v| v.as_str())
            .ok_or_else(|| AppError::Validation("web_search requires 'query'".to_string()))?
            .to_string();

        let payload = serde_json::to_value(&step.config).unwrap_or(serde_json::json!({}));
        let mut parent = new_parent_job(ctx, JOB_TYPE, &step.name, Some(definition.id.clone()), payload);
        parent.start(ctx.time_provider.now_millis())?;
        ctx.job_storage.create_job(&parent).await?;

        ctx.event_bus
            .publish(Event::JobStarted {
                job_id: parent.id.clone(),
                status: parent.status.to_string(),
                source_type: definition.source_type.clone(),
                entity_type: definition.entity_type.clone(),
                timestamp: ctx.time_provider.now_millis(),
                url: None,
                depth: None,
            })
            .await;

        let result = ctx.gemini_client.grounded_search(&query).await;

        let now = ctx.time_provider.now_millis();
        match result {
            Ok(content) => {
                let doc = Document {
                    id: ctx.id_provider.generate_id(),
                    source_id: query.clone(),
                    source_type: definition
                        .source_type
                        .clone()
                        .unwrap_or_else(|| "web_search".to_string()),
                    title: Some(query.clone()),
                    content_markdown: content,
                    detail_level: "full".to_string(),
                    metadata: serde_json::json!({ "query": query }),
                    created_at: now,
                };
                ctx.document_storage.save(&doc).await?;
                ctx.event_bus
                    .publish(Event::DocumentSaved {
                        job_id: parent.id.clone(),
                        parent_job_id: None,
                        document_id: doc.id.clone(),
                        timestamp: now,
                    })
                    .await;

                parent.transition_terminal(JobStatus::Completed, now);
                parent.result_count = 1;
                ctx.job_storage.save_job(&parent).await?;
            }
            Err(e) => {
                let error = crate::application::error_formatter::format_job_error(
                    crate::application::error_formatter::ErrorCategory::Network,
                    &e.to_string(),
                    None,
                    None,
                );
                ctx.job_storage
                    .update_status(
                        &parent.id,
                        StatusUpdate {
                            status: JobStatus::Failed,
                            error: Some(error),
                        },
                    )
                    .await?;
            }
        }

        Ok(parent.id)
    }

    fn returns_child_jobs(&self) -> bool {
        false
    }
}
