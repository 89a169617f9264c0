// AI / Transform StepManager (spec §4.5): queries the DocumentStore with a
// filter and enqueues one child per matching document. `ai` and `transform`
// share this shape — they differ only in which message type (and
// therefore which generic_operation branch) processes each child.

use async_trait::async_trait;

use crate::domain::{JobDefinition, JobId, JobStep};
use crate::error::Result;
use crate::port::DocumentFilter;

use super::common::{config_str, new_parent_job, plan_child, spawn_children, PlannedChild};
use super::{StepContext, StepManager};

pub struct DocumentQueryStepManager {
    pub action: &'static str,
    pub job_type: &'static str,
    pub message_type: &'static str,
}

pub const AI: DocumentQueryStepManager = DocumentQueryStepManager {
    action: "ai",
    job_type: "ai",
    message_type: "ai",
};

pub const TRANSFORM: DocumentQueryStepManager = DocumentQueryStepManager {
    action: "transform",
    job_type: "transform",
    message_type: "transform",
};

pub const SUMMARIZER: DocumentQueryStepManager = DocumentQueryStepManager {
    action: "summarizer",
    job_type: "summarizer",
    message_type: "summarizer",
};

#[async_trait]
impl StepManager for DocumentQueryStepManager {
    async fn create_parent_job(
        &self,
        ctx: &StepContext,
        step: &JobStep,
        definition: &JobDefinition,
        _parent_job_id: Option<&str>,
    ) -> Result<JobId> {
        let source_type = config_str(&step.config, "source_type").map(str::to_string);

        let payload = serde_json::to_value(&step.config).unwrap_or(serde_json::json!({}));
        let mut parent = new_parent_job(ctx, self.job_type, &step.name, Some(definition.id.clone()), payload.clone());
        ctx.job_storage.create_job(&parent).await?;

        let documents = ctx
            .document_storage
            .list(DocumentFilter {
                source_type,
                limit: -1,
                offset: 0,
            })
            .await?;

        let children: Vec<PlannedChild> = documents
            .into_iter()
            .map(|doc| {
                let mut config = payload.clone();
                if let Some(obj) = config.as_object_mut() {
                    obj.insert("document_id".to_string(), serde_json::json!(doc.id));
                }
                plan_child(
                    &ctx.id_provider,
                    &ctx.time_provider,
                    &parent.id,
                    self.message_type,
                    &doc.id,
                    self.message_type,
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
