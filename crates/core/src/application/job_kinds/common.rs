// Shared progress/completion mechanics used by every JobKind that settles
// one child of a root job (spec §4.6 steps 8-11, applied identically by
// crawler_url, generic_operation, cleanup, reindex, summarizer).
//
// `progress.completed` counts every SETTLED child (success or failure);
// `progress.failed` is the subset of those that failed. This is what makes
// invariant 2 (`pending + completed == total` at quiescence) hold even
// when some children fail — see spec §8 scenario S3 (`completed=5,
// failed=2` for 5 seeds with 2 failures).

use std::sync::Arc;

use crate::application::error_tolerance::{self, ToleranceOutcome};
use crate::application::job_kinds::completion_probe;
use crate::application::worker::constants::COMPLETION_PROBE_GRACE;
use crate::domain::{Job, JobId, JobMessage, JobStatus};
use crate::error::Result;
use crate::port::{JobStorage, ProgressDelta, QueueStorage, StatusUpdate};

use super::JobContext;

/// Applies the settle delta, marks the child row terminal if it exists,
/// updates the root's heartbeat, arms a completion probe if the root just
/// went quiescent, and runs the error-tolerance check. Returns the
/// refreshed root job.
#[allow(clippy::too_many_arguments)]
pub async fn settle_child(
    ctx: &JobContext,
    root_id: &JobId,
    child_id: Option<&str>,
    outcome: SettleOutcome,
    error: Option<String>,
    extra_total: i64,
    extra_pending: i64,
) -> Result<Job> {
    let root = ctx.job_storage.get_job(root_id).await?;
    if root.status.is_terminal() {
        // Root already settled (e.g. `stop_all`) — no further children are
        // processed past this point (spec §4.7, invariant 8).
        return Ok(root);
    }

    if let Some(child_id) = child_id {
        if let Ok(child) = ctx.job_storage.get_job(&child_id.to_string()).await {
            if child.status.is_terminal() {
                // Redelivery of an already-settled message (invariant 7):
                // counters are keyed off child status transitions, not raw
                // deliveries, so a repeat dispatch is a no-op here.
                return ctx.job_storage.get_job(root_id).await;
            }
        }
    }

    let delta = match outcome {
        SettleOutcome::Success => ProgressDelta {
            completed: 1,
            pending: extra_pending - 1,
            total: extra_total,
            failed: 0,
        },
        SettleOutcome::Failure => ProgressDelta {
            completed: 1,
            pending: -1,
            total: 0,
            failed: 1,
        },
    };

    let root = ctx.job_storage.update_progress_counters_atomic(root_id, delta).await?;

    if let Some(child_id) = child_id {
        if ctx.job_storage.get_job(&child_id.to_string()).await.is_ok() {
            let status = match outcome {
                SettleOutcome::Success => JobStatus::Completed,
                SettleOutcome::Failure => JobStatus::Failed,
            };
            let _ = ctx
                .job_storage
                .update_status(&child_id.to_string(), StatusUpdate { status, error })
                .await;
        }
    }

    ctx.job_storage.update_heartbeat(root_id).await?;

    maybe_arm_completion_probe(&ctx.queue_storage, &ctx.id_provider, &root).await?;

    run_tolerance_check(ctx, &root).await?;

    Ok(root)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettleOutcome {
    Success,
    Failure,
}

/// Completion candidacy (spec §4.6 step 10): quiescent and not yet
/// terminal.
pub async fn maybe_arm_completion_probe(
    queue_storage: &Arc<dyn QueueStorage>,
    id_provider: &Arc<dyn crate::port::IdProvider>,
    root: &Job,
) -> Result<()> {
    if root.progress.pending == 0 && root.progress.total > 0 && root.status != JobStatus::Completed {
        let mut probe = JobMessage::new(id_provider.generate_id(), completion_probe::MESSAGE_TYPE);
        probe.parent_id = Some(root.id.clone());
        probe.job_definition_id = root.job_definition_id.clone();
        queue_storage
            .enqueue_with_delay(probe, COMPLETION_PROBE_GRACE)
            .await?;
    }
    Ok(())
}

/// Error-tolerance check (spec §4.6 step 11): run identically from every
/// hot-path settle.
pub async fn run_tolerance_check(ctx: &JobContext, root: &Job) -> Result<ToleranceOutcome> {
    let tolerance = match &root.job_definition_id {
        Some(def_id) => match ctx.job_definition_storage.get(def_id).await {
            Ok(def) => def.error_tolerance,
            Err(_) => None,
        },
        None => None,
    };

    error_tolerance::check_and_apply(
        &ctx.job_storage,
        &ctx.event_bus,
        &ctx.time_provider,
        root,
        tolerance.as_ref(),
    )
    .await
}

/// First-touch root transition (spec §4.6 step 4): `pending -> running`,
/// publishes `JobStarted`. No-op (besides the publish) if already running.
pub async fn first_touch_root(
    job_storage: &Arc<dyn JobStorage>,
    event_bus: &Arc<dyn crate::port::EventBus>,
    time_provider: &Arc<dyn crate::port::TimeProvider>,
    root: &mut Job,
    url: Option<String>,
    depth: Option<u32>,
) -> Result<()> {
    if root.status == JobStatus::Pending {
        let now = time_provider.now_millis();
        root.start(now).map_err(crate::error::AppError::Domain)?;
        job_storage.save_job(root).await?;

        event_bus
            .publish(crate::domain::Event::JobStarted {
                job_id: root.id.clone(),
                status: root.status.to_string(),
                source_type: root.source_type.clone(),
                entity_type: root.entity_type.clone(),
                timestamp: now,
                url,
                depth,
            })
            .await;
    }
    Ok(())
}

/// Transitions a persisted child row `pending -> running` on first touch
/// (spec §4.6 step 5). Tolerates a missing row (spec §9).
pub async fn first_touch_child(job_storage: &Arc<dyn JobStorage>, child_id: &str, now: i64) {
    if let Ok(mut child) = job_storage.get_job(&child_id.to_string()).await {
        if child.status == JobStatus::Pending {
            let _ = child.start(now);
            let _ = job_storage.save_job(&child).await;
        }
    }
}
