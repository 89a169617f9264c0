// Generic operation JobKind (spec §1, §4.5): backs every message type whose
// domain logic is deliberately out of scope — only its configuration
// contract is implemented. One struct, several message types, matching the
// worker router's `&'static str -> Arc<dyn JobKind>` shape (the same
// instance is registered under each of the message types it understands).

use async_trait::async_trait;

use crate::application::error_formatter::{format_job_error, ErrorCategory};
use crate::application::job_kinds::common::{first_touch_root, settle_child, SettleOutcome};
use crate::application::step_managers::common::config_str;
use crate::domain::JobMessage;
use crate::error::Result;
use crate::port::{CollaboratorError, Document};

use super::{JobContext, JobKind, JobKindError};

pub const MESSAGE_TYPE_AI: &str = "ai";
pub const MESSAGE_TYPE_TRANSFORM: &str = "transform";
pub const MESSAGE_TYPE_GITHUB_REPO_FILE: &str = "github_repo_file";
pub const MESSAGE_TYPE_GITHUB_ACTION_LOG: &str = "github_action_log";
pub const MESSAGE_TYPE_DATABASE_MAINTENANCE_OPERATION: &str = "database_maintenance_operation";
pub const MESSAGE_TYPE_PRE_VALIDATION: &str = "pre_validation";
pub const MESSAGE_TYPE_POST_SUMMARIZATION: &str = "post_summarization";

pub struct GenericOperation;

#[async_trait]
impl JobKind for GenericOperation {
    async fn validate(&self, msg: &JobMessage) -> Result<()> {
        if msg.parent_id.as_deref().unwrap_or("").is_empty() {
            return Err(crate::error::AppError::Validation(format!(
                "{} message requires parent_id (root job id)",
                msg.message_type
            )));
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

        let outcome = self.perform(ctx, msg).await;

        let (settle_outcome, formatted_error) = match outcome {
            Ok(()) => (SettleOutcome::Success, None),
            Err(err) => {
                let formatted = format_job_error(ErrorCategory::System, &err.to_string(), None, None);
                (SettleOutcome::Failure, Some(formatted))
            }
        };

        if let Some(error) = &formatted_error {
            let mut root_row = ctx
                .job_storage
                .get_job(&root_id)
                .await
                .map_err(|e| JobKindError::Retryable(e.to_string()))?;
            root_row.error = Some(error.clone());
            ctx.job_storage
                .save_job(&root_row)
                .await
                .map_err(|e| JobKindError::Retryable(e.to_string()))?;
        }

        settle_child(ctx, &root_id, Some(&msg.id), settle_outcome, formatted_error, 0, 0)
            .await
            .map_err(|e| JobKindError::Retryable(e.to_string()))?;

        Ok(())
    }
}

impl GenericOperation {
    async fn perform(&self, ctx: &JobContext, msg: &JobMessage) -> Result<()> {
        match msg.message_type.as_str() {
            MESSAGE_TYPE_AI => self.run_ai(ctx, msg).await,
            MESSAGE_TYPE_TRANSFORM => self.run_transform(ctx, msg).await,
            MESSAGE_TYPE_GITHUB_REPO_FILE => self.run_github_repo_file(ctx, msg).await,
            MESSAGE_TYPE_GITHUB_ACTION_LOG => self.run_github_action_log(ctx, msg).await,
            MESSAGE_TYPE_DATABASE_MAINTENANCE_OPERATION => self.run_database_maintenance(ctx, msg).await,
            MESSAGE_TYPE_PRE_VALIDATION | MESSAGE_TYPE_POST_SUMMARIZATION => {
                // Contract-only per spec §1: the configuration shape is
                // the whole point, no domain logic runs here.
                Ok(())
            }
            other => Err(crate::error::AppError::Validation(format!(
                "generic_operation has no handler for message type {other}"
            ))),
        }
    }

    async fn run_ai(&self, ctx: &JobContext, msg: &JobMessage) -> Result<()> {
        let config = msg.config.as_object().cloned().unwrap_or_default();
        let document_id = config_str(&config, "document_id")
            .ok_or_else(|| crate::error::AppError::Validation("ai message requires document_id".to_string()))?;

        let source = ctx.document_storage.get(document_id).await?;
        let reply = ctx
            .llm_client
            .chat(&[source.content_markdown.clone()])
            .await
            .map_err(collaborator_to_app_error)?;

        let derived = Document {
            id: ctx.id_provider.generate_id(),
            source_id: source.id.clone(),
            source_type: source.source_type.clone(),
            title: source.title.clone(),
            content_markdown: reply,
            detail_level: "ai_derived".to_string(),
            metadata: serde_json::json!({ "derived_from": source.id }),
            created_at: ctx.time_provider.now_millis(),
        };
        ctx.document_storage.save(&derived).await?;
        Ok(())
    }

    async fn run_transform(&self, ctx: &JobContext, msg: &JobMessage) -> Result<()> {
        let config = msg.config.as_object().cloned().unwrap_or_default();
        let document_id = config_str(&config, "document_id").ok_or_else(|| {
            crate::error::AppError::Validation("transform message requires document_id".to_string())
        })?;

        let mut doc = ctx.document_storage.get(document_id).await?;
        let transformed = ctx
            .llm_client
            .chat(&[doc.content_markdown.clone()])
            .await
            .map_err(collaborator_to_app_error)?;
        doc.content_markdown = transformed;
        ctx.document_storage.update(&doc).await?;
        Ok(())
    }

    async fn run_github_repo_file(&self, ctx: &JobContext, msg: &JobMessage) -> Result<()> {
        let config = msg.config.as_object().cloned().unwrap_or_default();
        let repo = config_str(&config, "repo")
            .ok_or_else(|| crate::error::AppError::Validation("github_repo_file requires repo".to_string()))?;
        let path = config_str(&config, "path")
            .ok_or_else(|| crate::error::AppError::Validation("github_repo_file requires path".to_string()))?;

        let files = ctx
            .github_connector
            .fetch_files_batch(repo, &[path.to_string()])
            .await
            .map_err(collaborator_to_app_error)?;

        let Some(file) = files.into_iter().next() else {
            return Err(crate::error::AppError::NotFound(format!("{repo}:{path} not returned by connector")));
        };

        let doc = Document {
            id: ctx.id_provider.generate_id(),
            source_id: format!("{repo}:{path}"),
            source_type: "github_repo".to_string(),
            title: Some(path.to_string()),
            content_markdown: file.content,
            detail_level: "full".to_string(),
            metadata: serde_json::json!({ "repo": repo, "branch": file.branch }),
            created_at: ctx.time_provider.now_millis(),
        };
        ctx.document_storage.save(&doc).await?;
        Ok(())
    }

    async fn run_github_action_log(&self, ctx: &JobContext, msg: &JobMessage) -> Result<()> {
        let config = msg.config.as_object().cloned().unwrap_or_default();
        let repo = config_str(&config, "repo")
            .ok_or_else(|| crate::error::AppError::Validation("github_action_log requires repo".to_string()))?;
        let run_id = config_str(&config, "run_id")
            .ok_or_else(|| crate::error::AppError::Validation("github_action_log requires run_id".to_string()))?;

        let doc = Document {
            id: ctx.id_provider.generate_id(),
            source_id: format!("{repo}#{run_id}"),
            source_type: "github_action_log".to_string(),
            title: Some(format!("{repo} run {run_id}")),
            content_markdown: serde_json::to_string_pretty(&msg.config).unwrap_or_default(),
            detail_level: "full".to_string(),
            metadata: serde_json::json!({ "repo": repo, "run_id": run_id }),
            created_at: ctx.time_provider.now_millis(),
        };
        ctx.document_storage.save(&doc).await?;
        Ok(())
    }

    /// Database maintenance is run for real by `MaintenanceScheduler`
    /// against `Maintenance` directly (spec §4.5, ambient maintenance
    /// port) — this message settles the per-operation child contract
    /// without re-running the operation inline from a worker.
    async fn run_database_maintenance(&self, ctx: &JobContext, msg: &JobMessage) -> Result<()> {
        let config = msg.config.as_object().cloned().unwrap_or_default();
        let operation = config_str(&config, "operation").unwrap_or("unknown");
        tracing::info!(operation, job_id = %msg.id, "database maintenance operation acknowledged");
        Ok(())
    }
}

fn collaborator_to_app_error(err: CollaboratorError) -> crate::error::AppError {
    crate::error::AppError::Transient(err.to_string())
}
