// Crash recovery — on daemon startup, reconcile root jobs left non-terminal
// by a worker crash that happened before a completion probe could observe
// them (spec §4.7 only runs once a probe is armed; a crash between
// "pending reached 0" and "probe fires", or a crash that leaves heartbeats
// stale with pending > 0, needs a sweep at boot).
//
// Grounded in the teacher's `application/recovery.rs` (RecoveryService),
// generalized from subprocess-PID liveness checks to heartbeat staleness —
// this domain has no subprocess jobs to re-attach to, only jobs whose last
// heartbeat predates the stale-job threshold.

use crate::application::error_formatter::{format_job_error, ErrorCategory};
use crate::application::worker::constants::{COMPLETION_PROBE_GRACE, STALE_JOB_TIMEOUT_MS};
use crate::domain::{Event, JobMessage, JobStatus};
use crate::error::Result;
use crate::port::{EventBus, IdProvider, JobStorage, QueueStorage, StatusUpdate, TimeProvider};
use std::sync::Arc;
use tracing::{info, warn};

pub struct RecoveryService {
    job_storage: Arc<dyn JobStorage>,
    queue_storage: Arc<dyn QueueStorage>,
    event_bus: Arc<dyn EventBus>,
    time_provider: Arc<dyn TimeProvider>,
    id_provider: Arc<dyn IdProvider>,
}

impl RecoveryService {
    pub fn new(
        job_storage: Arc<dyn JobStorage>,
        queue_storage: Arc<dyn QueueStorage>,
        event_bus: Arc<dyn EventBus>,
        time_provider: Arc<dyn TimeProvider>,
        id_provider: Arc<dyn IdProvider>,
    ) -> Self {
        Self {
            job_storage,
            queue_storage,
            event_bus,
            time_provider,
            id_provider,
        }
    }

    /// Returns the number of root jobs reconciled.
    pub async fn recover_stale_roots(&self) -> Result<usize> {
        let now = self.time_provider.now_millis();
        let stale_before = now - STALE_JOB_TIMEOUT_MS;
        let stale_roots = self.job_storage.find_stale_roots(stale_before).await?;

        let mut recovered = 0;
        for mut root in stale_roots {
            if root.status.is_terminal() {
                continue;
            }

            if root.progress.pending > 0 {
                let error = format_job_error(
                    ErrorCategory::Timeout,
                    &format!(
                        "No activity since last heartbeat (pending: {})",
                        root.progress.pending
                    ),
                    None,
                    None,
                );
                self.job_storage
                    .update_status(
                        &root.id,
                        StatusUpdate {
                            status: JobStatus::Failed,
                            error: Some(error.clone()),
                        },
                    )
                    .await?;
                self.event_bus
                    .publish(Event::JobFailed {
                        job_id: root.id.clone(),
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
                warn!(root_job_id = %root.id, "recovered stale root job as failed (no activity, children still pending)");
            } else {
                // pending == 0 but not terminal: a probe should have fired
                // and never did (crash between the two). Re-arm one.
                let mut probe = JobMessage::new(
                    self.id_provider.generate_id(),
                    crate::application::job_kinds::completion_probe::MESSAGE_TYPE,
                );
                probe.parent_id = Some(root.id.clone());
                probe.job_definition_id = root.job_definition_id.clone();
                self.queue_storage
                    .enqueue_with_delay(probe, COMPLETION_PROBE_GRACE)
                    .await?;
                info!(root_job_id = %root.id, "re-armed completion probe for stale-but-quiescent root");
            }
            root.last_heartbeat = now;
            recovered += 1;
        }

        Ok(recovered)
    }
}
