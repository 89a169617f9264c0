// Error-tolerance policy engine (spec §4.7).
//
// Run identically from the crawler hot path (spec §4.6 step 11) and from
// the completion probe (spec §4.7 step 5).

use crate::domain::{FailureAction, Job, JobStatus};
use crate::error::Result;
use crate::port::{ChildStats, Event, EventBus, JobStorage, StatusUpdate, TimeProvider};
use std::sync::Arc;

pub use crate::domain::ErrorTolerance;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToleranceOutcome {
    /// Nothing tripped; caller should keep running (or, for the probe,
    /// proceed to complete).
    Unaffected,
    /// `stop_all` tripped: the root has been transitioned to `failed`.
    Stopped,
}

/// Evaluates `tolerance` against the root's current child stats and applies
/// the configured action (spec §4.7 action table). Returns `Stopped` when
/// the root was just transitioned to `failed` by this call.
pub async fn check_and_apply(
    job_storage: &Arc<dyn JobStorage>,
    event_bus: &Arc<dyn EventBus>,
    time_provider: &Arc<dyn TimeProvider>,
    root: &Job,
    tolerance: Option<&ErrorTolerance>,
) -> Result<ToleranceOutcome> {
    let Some(tolerance) = tolerance else {
        return Ok(ToleranceOutcome::Unaffected);
    };
    if root.status.is_terminal() {
        return Ok(ToleranceOutcome::Unaffected);
    }

    let stats_map = job_storage.get_child_stats(&[root.id.clone()]).await?;
    let stats = stats_map.get(&root.id).copied().unwrap_or_default();

    if stats.failed_children < tolerance.max_child_failures {
        return Ok(ToleranceOutcome::Unaffected);
    }

    match tolerance.failure_action {
        FailureAction::Continue => {
            tracing::warn!(
                root_job_id = %root.id,
                failed_children = stats.failed_children,
                threshold = tolerance.max_child_failures,
                "error tolerance threshold reached, continuing (action=continue)"
            );
            Ok(ToleranceOutcome::Unaffected)
        }
        FailureAction::MarkWarning => {
            let warning = format!(
                "Warning: {}/{} children failed (threshold {})",
                stats.failed_children,
                stats.child_count,
                tolerance.max_child_failures
            );
            let combined = match &root.error {
                Some(existing) => format!("{existing}; {warning}"),
                None => warning,
            };
            job_storage
                .update_status(
                    &root.id,
                    StatusUpdate {
                        status: root.status,
                        error: Some(combined),
                    },
                )
                .await?;
            Ok(ToleranceOutcome::Unaffected)
        }
        FailureAction::StopAll => {
            stop_all(job_storage, event_bus, time_provider, root, &stats, tolerance).await?;
            Ok(ToleranceOutcome::Stopped)
        }
    }
}

async fn stop_all(
    job_storage: &Arc<dyn JobStorage>,
    event_bus: &Arc<dyn EventBus>,
    time_provider: &Arc<dyn TimeProvider>,
    root: &Job,
    stats: &ChildStats,
    tolerance: &ErrorTolerance,
) -> Result<()> {
    let now = time_provider.now_millis();
    let error = format!(
        "Error tolerance exceeded: {}/{}",
        stats.failed_children, stats.child_count
    );

    // Cancel every remaining running/pending child (spec §4.7: "cancel ...
    // all running/pending children of the root"). Combined with the
    // root-terminal short-circuit in `settle_child`/`CrawlerUrl::run`, no
    // in-flight message for this root can spawn further children or move a
    // counter once this returns (invariant 8).
    for child in job_storage.list_non_terminal_children(&root.id).await? {
        job_storage
            .update_status(
                &child.id,
                StatusUpdate {
                    status: JobStatus::Cancelled,
                    error: Some(error.clone()),
                },
            )
            .await?;
    }

    job_storage
        .update_status(
            &root.id,
            StatusUpdate {
                status: JobStatus::Failed,
                error: Some(error.clone()),
            },
        )
        .await?;

    event_bus
        .publish(Event::JobFailed {
            job_id: root.id.clone(),
            status: JobStatus::Failed.to_string(),
            error,
            timestamp: now,
            result_count: root.result_count,
            failed_count: stats.failed_children,
            total_urls: root.progress.total,
            progress_text: format!(
                "{}/{} complete",
                root.progress.completed, root.progress.total
            ),
            errors: Vec::new(),
            warnings: Vec::new(),
            running_children: stats.running_children,
        })
        .await;

    let _ = tolerance;
    Ok(())
}
