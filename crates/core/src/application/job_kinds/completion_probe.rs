// Completion probe (spec §4.7): a self-re-arming message that verifies
// quiescence after a grace period before transitioning a root to
// `completed`. Replaces in-process timers entirely — re-arming happens via
// `QueueStorage::enqueue_with_delay`, never a sleeping task.

use async_trait::async_trait;
use std::time::Duration;

use super::{JobContext, JobKind, JobKindError};
use crate::application::error_formatter::{format_job_error, ErrorCategory};
use crate::application::error_tolerance::{self, ToleranceOutcome};
use crate::application::worker::constants::{COMPLETION_PROBE_GRACE, STALE_JOB_TIMEOUT_MS};
use crate::domain::{Event, JobMessage, JobStatus};
use crate::error::Result;
use crate::port::StatusUpdate;

pub const MESSAGE_TYPE: &str = "completion_probe";

pub struct CompletionProbe;

fn format_duration_ms(ms: i64) -> String {
    if ms < 1000 {
        return format!("{ms}ms");
    }
    let total_secs = ms / 1000;
    let mins = total_secs / 60;
    let secs = total_secs % 60;
    if mins > 0 {
        format!("{mins}m{secs}s")
    } else {
        format!("{secs}s")
    }
}

#[async_trait]
impl JobKind for CompletionProbe {
    async fn validate(&self, msg: &JobMessage) -> Result<()> {
        if msg.parent_id.is_none() {
            return Err(crate::error::AppError::Validation(
                "completion_probe message requires parent_id (root job id)".to_string(),
            ));
        }
        Ok(())
    }

    async fn execute(&self, ctx: &JobContext, msg: &JobMessage) -> Result<(), JobKindError> {
        let root_id = msg
            .parent_id
            .clone()
            .ok_or_else(|| JobKindError::Terminal("missing root id".to_string()))?;

        let mut root = match ctx.job_storage.get_job(&root_id).await {
            Ok(j) => j,
            Err(e) => return Err(JobKindError::Retryable(e.to_string())),
        };

        // Step 1: already terminal (includes `completed`) — nothing to do.
        if root.status.is_terminal() {
            return Ok(());
        }

        let now = ctx.time_provider.now_millis();
        let elapsed = now - root.last_heartbeat;

        // Step 2: stale-job timeout.
        if elapsed > STALE_JOB_TIMEOUT_MS && root.progress.pending > 0 {
            let error = format_job_error(
                ErrorCategory::Timeout,
                &format!(
                    "No activity for {} (pending: {})",
                    format_duration_ms(elapsed),
                    root.progress.pending
                ),
                None,
                None,
            );
            if let Err(e) = ctx
                .job_storage
                .update_status(
                    &root_id,
                    StatusUpdate {
                        status: JobStatus::Failed,
                        error: Some(error.clone()),
                    },
                )
                .await
            {
                return Err(JobKindError::Retryable(e.to_string()));
            }
            ctx.event_bus
                .publish(Event::JobFailed {
                    job_id: root_id,
                    status: JobStatus::Failed.to_string(),
                    error,
                    timestamp: now,
                    result_count: root.result_count,
                    failed_count: root.progress.failed,
                    total_urls: root.progress.total,
                    progress_text: format!(
                        "{}/{} complete",
                        root.progress.completed, root.progress.total
                    ),
                    errors: Vec::new(),
                    warnings: Vec::new(),
                    running_children: 0,
                })
                .await;
            return Ok(());
        }

        // Step 3: children appeared during the grace period — exit; the
        // worker that drains them re-arms the probe.
        if root.progress.pending > 0 {
            return Ok(());
        }

        // Step 4: still within the grace period — re-enqueue a follow-up.
        let grace_ms = COMPLETION_PROBE_GRACE.as_millis() as i64;
        if elapsed < grace_ms {
            let delay_ms = (grace_ms - elapsed + 1000).max(0) as u64;
            let mut follow_up = JobMessage::new(ctx.id_provider.generate_id(), MESSAGE_TYPE);
            follow_up.parent_id = Some(root.id.clone());
            follow_up.job_definition_id = root.job_definition_id.clone();
            if let Err(e) = ctx
                .queue_storage
                .enqueue_with_delay(follow_up, Duration::from_millis(delay_ms))
                .await
            {
                return Err(JobKindError::Retryable(e.to_string()));
            }
            return Ok(());
        }

        // Step 5: error-tolerance check, same action table as the hot path.
        let tolerance = match &root.job_definition_id {
            Some(def_id) => match ctx.job_definition_storage.get(def_id).await {
                Ok(def) => def.error_tolerance,
                Err(_) => None,
            },
            None => None,
        };

        let outcome = match error_tolerance::check_and_apply(
            &ctx.job_storage,
            &ctx.event_bus,
            &ctx.time_provider,
            &root,
            tolerance.as_ref(),
        )
        .await
        {
            Ok(o) => o,
            Err(e) => return Err(JobKindError::Retryable(e.to_string())),
        };

        if outcome == ToleranceOutcome::Stopped {
            return Ok(());
        }

        root.transition_terminal(JobStatus::Completed, now);
        // `progress.completed` counts every settled child, success or
        // failure (see application::job_kinds::common); `result_count` is
        // the successful subset.
        root.result_count = root.progress.completed - root.progress.failed;
        root.failed_count = root.progress.failed;
        if let Err(e) = ctx.job_storage.save_job(&root).await {
            return Err(JobKindError::Retryable(e.to_string()));
        }

        let duration_seconds = root
            .started_at
            .map(|started| (now - started) / 1000)
            .unwrap_or(0);

        ctx.event_bus
            .publish(Event::JobCompleted {
                job_id: root.id.clone(),
                status: JobStatus::Completed.to_string(),
                result_count: root.result_count,
                failed_count: root.failed_count,
                total_urls: root.progress.total,
                duration_seconds,
                progress_text: format!(
                    "{}/{} complete",
                    root.progress.completed, root.progress.total
                ),
                errors: Vec::new(),
                warnings: Vec::new(),
                running_children: 0,
                timestamp: now,
            })
            .await;

        let mut summarization = JobMessage::new(ctx.id_provider.generate_id(), "post_summarization");
        summarization.parent_id = Some(root.id.clone());
        summarization.job_definition_id = root.job_definition_id.clone();
        if let Err(e) = ctx.queue_storage.enqueue(summarization).await {
            // Best-effort: a missed post-summarization enqueue does not
            // revert the root's completion (spec §7: per-URL/secondary
            // failures never change root status after the fact).
            tracing::warn!(root_job_id = %root.id, error = %e, "failed to enqueue post_summarization");
        }

        Ok(())
    }
}
