// Summarizer JobKind (spec §4.5, §4.3 message inventory): condenses one
// document into a summary Document via the LLM client. Listed as its own
// message type alongside `ai`/`transform` rather than folded into
// `generic_operation` because it's produced by its own StepManager action
// (`summarizer`, see `step_managers::ai_transform::SUMMARIZER`).

use async_trait::async_trait;

use crate::application::job_kinds::common::{first_touch_root, settle_child, SettleOutcome};
use crate::application::step_managers::common::config_str;
use crate::domain::JobMessage;
use crate::error::Result;
use crate::port::Document;

use super::{JobContext, JobKind, JobKindError};

pub const MESSAGE_TYPE: &str = "summarizer";

pub struct Summarizer;

#[async_trait]
impl JobKind for Summarizer {
    async fn validate(&self, msg: &JobMessage) -> Result<()> {
        if msg.parent_id.as_deref().unwrap_or("").is_empty() {
            return Err(crate::error::AppError::Validation(
                "summarizer message requires parent_id (root job id)".to_string(),
            ));
        }
        let config = msg.config.as_object().cloned().unwrap_or_default();
        if config_str(&config, "document_id").is_none() {
            return Err(crate::error::AppError::Validation(
                "summarizer message requires document_id".to_string(),
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
        let document_id = config_str(&config, "document_id").expect("validated");

        let source = ctx
            .document_storage
            .get(document_id)
            .await
            .map_err(|e| JobKindError::Terminal(e.to_string()))?;

        let summary_text = ctx
            .llm_client
            .chat(&[format!("Summarize:\n{}", source.content_markdown)])
            .await
            .map_err(|e| JobKindError::Retryable(e.to_string()))?;

        let summary = Document {
            id: ctx.id_provider.generate_id(),
            source_id: source.id.clone(),
            source_type: source.source_type.clone(),
            title: source.title.clone(),
            content_markdown: summary_text,
            detail_level: "summary".to_string(),
            metadata: serde_json::json!({ "derived_from": source.id }),
            created_at: ctx.time_provider.now_millis(),
        };
        ctx.document_storage
            .save(&summary)
            .await
            .map_err(|e| JobKindError::Retryable(e.to_string()))?;

        settle_child(ctx, &root_id, Some(&msg.id), SettleOutcome::Success, None, 0, 0)
            .await
            .map_err(|e| JobKindError::Retryable(e.to_string()))?;

        Ok(())
    }
}
