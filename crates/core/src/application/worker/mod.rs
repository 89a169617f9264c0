// Worker pool — drains the Queue Layer and dispatches each message to the
// JobKind registered for its `type` (spec §4.3, §5).

pub mod constants;
mod panic_guard;
mod shutdown;

use constants::*;
pub use panic_guard::{execute_guarded_async, PanicGuardResult};
pub use shutdown::{shutdown_channel, ShutdownSender, ShutdownToken};

use crate::application::error_formatter::{format_job_error, ErrorCategory};
use crate::application::job_kinds::common::{settle_child, SettleOutcome};
use crate::application::job_kinds::{JobContext, JobKind, JobKindError};
use crate::domain::{Event, JobStatus, ReceivedMessage};
use crate::port::StatusUpdate;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::time::sleep;
use tracing::{error, info, warn};

/// Maps a message's `type` field to the `JobKind` that processes it.
pub type JobKindRouter = HashMap<&'static str, Arc<dyn JobKind>>;

/// A fixed-size pool of shared-nothing workers (spec §5: "parallel workers,
/// shared-nothing except the Lifecycle Store and Queue").
pub struct WorkerPool {
    router: Arc<JobKindRouter>,
    ctx: JobContext,
    num_workers: usize,
}

impl WorkerPool {
    pub fn new(router: JobKindRouter, ctx: JobContext, num_workers: usize) -> Self {
        Self {
            router: Arc::new(router),
            ctx,
            num_workers: num_workers.max(1),
        }
    }

    /// Spawns `num_workers` tasks and waits for all of them to exit
    /// (triggered by `shutdown`).
    pub async fn run(&self, shutdown: ShutdownToken) {
        info!(workers = self.num_workers, "worker pool starting");
        let mut handles = Vec::with_capacity(self.num_workers);
        for id in 0..self.num_workers {
            let router = Arc::clone(&self.router);
            let ctx = self.ctx.clone();
            let shutdown = shutdown.clone();
            handles.push(tokio::spawn(Self::worker_loop(id, router, ctx, shutdown)));
        }
        for handle in handles {
            let _ = handle.await;
        }
        info!("worker pool stopped");
    }

    async fn worker_loop(
        id: usize,
        router: Arc<JobKindRouter>,
        ctx: JobContext,
        mut shutdown: ShutdownToken,
    ) {
        loop {
            if shutdown.is_shutdown() {
                break;
            }
            match ctx.queue_storage.receive(DEFAULT_VISIBILITY_TIMEOUT).await {
                Ok(Some(received)) => {
                    Self::process_message(&router, &ctx, received).await;
                }
                Ok(None) => {
                    tokio::select! {
                        _ = sleep(IDLE_SLEEP_DURATION) => {},
                        _ = shutdown.wait() => break,
                    }
                }
                Err(e) => {
                    error!(worker = id, error = %e, "queue receive failed");
                    tokio::select! {
                        _ = sleep(ERROR_RECOVERY_SLEEP_DURATION) => {},
                        _ = shutdown.wait() => break,
                    }
                }
            }
        }
        info!(worker = id, "worker stopped");
    }

    async fn process_message(router: &JobKindRouter, ctx: &JobContext, received: ReceivedMessage) {
        let msg = received.message.payload.clone();

        // Dead-letter path (spec §4.2): a message that has exceeded the
        // configured delivery budget is given up on regardless of which
        // JobKind would have handled it.
        if received.message.delivery_count > DEFAULT_MAX_DELIVERIES {
            Self::dead_letter_and_fail(ctx, &received).await;
            return;
        }

        let Some(kind) = router.get(msg.message_type.as_str()).cloned() else {
            // No route: dead-letter via the queue's own delivery-count
            // enforcement rather than acking a message nobody understands.
            error!(message_type = %msg.message_type, "no JobKind registered for message type");
            return;
        };

        if let Err(e) = kind.validate(&msg).await {
            warn!(message_id = %msg.id, error = %e, "message failed validation, marking child failed");
            // spec §7: "Validation failures on a child's message -> child
            // marked failed, parent counters updated, does NOT fail root
            // directly."
            Self::fail_and_settle(ctx, &msg, ErrorCategory::Validation, &e.to_string()).await;
            let _ = ctx.queue_storage.ack(&received.ack_token).await;
            return;
        }

        let kind_for_exec = Arc::clone(&kind);
        let ctx_for_exec = ctx.clone();
        let msg_for_exec = msg.clone();
        let future = async move { kind_for_exec.execute(&ctx_for_exec, &msg_for_exec).await };

        match execute_guarded_async(future).await {
            PanicGuardResult::Success(Ok(())) => {
                let _ = ctx.queue_storage.ack(&received.ack_token).await;
            }
            PanicGuardResult::Success(Err(JobKindError::Terminal(reason))) => {
                error!(message_id = %msg.id, reason = %reason, "job kind reported terminal failure");
                // spec §4.3: "marks the Job failed with a formatted error
                // and ACKs" — settles the child and parent counters so
                // conservation (invariant 2) holds instead of stranding the
                // child `running` until the stale-timeout probe.
                Self::fail_and_settle(ctx, &msg, ErrorCategory::System, &reason).await;
                let _ = ctx.queue_storage.ack(&received.ack_token).await;
            }
            PanicGuardResult::Success(Err(JobKindError::Retryable(reason))) => {
                warn!(message_id = %msg.id, reason = %reason, "job kind reported retryable failure, leaving for redelivery");
            }
            PanicGuardResult::Panicked(reason) => {
                error!(message_id = %msg.id, reason = %reason, "job kind panicked, leaving for redelivery");
            }
        }
    }

    /// Formats `detail` under `category`, marks the message's job `failed`,
    /// and applies the settle delta to its root so a terminal `JobKind`
    /// error or a validation failure never leaves a child stuck `running`
    /// with a parent whose `pending` count never decrements.
    async fn fail_and_settle(ctx: &JobContext, msg: &crate::domain::JobMessage, category: ErrorCategory, detail: &str) {
        let Some(root_id) = msg.parent_id.clone() else {
            // No root to settle against (e.g. a malformed message missing
            // its own parent_id) — nothing more can be done than drop it.
            return;
        };
        let error = format_job_error(category, detail, msg.url.as_deref(), None);

        // `settle_child` below performs the child's terminal transition
        // (with this error text attached) as part of applying the delta —
        // marking it failed here first would make `settle_child` mistake
        // this for an already-settled redelivery and skip the delta.
        if let Ok(mut root) = ctx.job_storage.get_job(&root_id).await {
            root.error = Some(error.clone());
            let _ = ctx.job_storage.save_job(&root).await;
        }

        if let Err(e) = settle_child(
            ctx,
            &root_id,
            Some(&msg.id),
            SettleOutcome::Failure,
            Some(error),
            0,
            0,
        )
        .await
        {
            error!(message_id = %msg.id, root_id = %root_id, error = %e, "failed to settle child after terminal/validation failure");
        }
    }

    /// Moves an over-delivered message to the dead-letter store and fails
    /// the Job it belonged to (spec §4.2: `"Giving up after N deliveries"`).
    async fn dead_letter_and_fail(ctx: &JobContext, received: &ReceivedMessage) {
        let deliveries = received.message.delivery_count;
        let reason = format!("exceeded max_deliveries ({deliveries} deliveries)");
        let dead = match ctx.queue_storage.dead_letter(&received.ack_token, &reason).await {
            Ok(msg) => msg,
            Err(e) => {
                error!(message_id = %received.message.id, error = %e, "failed to dead-letter message");
                return;
            }
        };

        let error = format!("Giving up after {deliveries} deliveries");
        let now = ctx.time_provider.now_millis();
        if let Err(e) = ctx
            .job_storage
            .update_status(
                &dead.job_id,
                StatusUpdate {
                    status: JobStatus::Failed,
                    error: Some(error.clone()),
                },
            )
            .await
        {
            error!(job_id = %dead.job_id, error = %e, "failed to mark dead-lettered job as failed");
            return;
        }

        ctx.event_bus
            .publish(Event::JobError {
                job_id: dead.job_id.clone(),
                parent_job_id: Some(dead.job_id.clone()),
                error_message: error,
                timestamp: now,
            })
            .await;
    }
}
