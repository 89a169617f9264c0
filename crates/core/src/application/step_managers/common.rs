// Shared StepManager mechanics (spec §4.5 steps 2-4): create the parent Job
// row, then for every planned child: persist its row BEFORE enqueuing its
// message (spec §9's one write-ordering constraint), publish `JobSpawn`,
// and finally fold the total/pending delta into the parent atomically.

use std::sync::Arc;

use crate::domain::{Event, Job, JobDefinitionId, JobId, JobMessage, JobPhase, JobStatus};
use crate::error::Result;
use crate::port::{IdProvider, JobStorage, ProgressDelta, QueueStorage, TimeProvider};

use super::StepContext;

/// One planned child: the row to persist and the message to enqueue.
pub struct PlannedChild {
    pub job: Job,
    pub message: JobMessage,
}

/// Builds a fresh parent Job, `pending`, phase `orchestration`, owned by no
/// root (it IS the root for its own family unless `parent_job_id` chains it
/// under a prior step's job, in which case it stays a root of its own
/// family — the flat hierarchy is per-family, not across the whole
/// definition run).
pub fn new_parent_job(
    ctx: &StepContext,
    job_type: &str,
    name: &str,
    job_definition_id: Option<JobDefinitionId>,
    payload: serde_json::Value,
) -> Job {
    Job::new_root(
        ctx.id_provider.generate_id(),
        job_type,
        name,
        job_definition_id,
        ctx.time_provider.now_millis(),
        payload,
    )
}

/// Persists every child row, enqueues its message, publishes `JobSpawn`,
/// then atomically applies the aggregate total/pending delta to `parent`.
/// A child whose row insert fails is skipped with a warning (spec §4.5
/// step 3's tolerance for the message/row race does not apply here — this
/// is the authoring side, which controls ordering directly).
pub async fn spawn_children(ctx: &StepContext, parent: &mut Job, children: Vec<PlannedChild>) -> Result<()> {
    let mut spawned = 0i64;
    for planned in children {
        ctx.job_storage.create_job(&planned.job).await?;
        ctx.queue_storage.enqueue(planned.message.clone()).await?;
        ctx.event_bus
            .publish(Event::JobSpawn {
                parent_job_id: parent.id.clone(),
                child_job_id: planned.job.id.clone(),
                job_type: planned.job.job_type.clone(),
                url: planned.message.url.clone(),
                depth: planned.message.depth,
                timestamp: ctx.time_provider.now_millis(),
            })
            .await;
        spawned += 1;
    }

    if spawned > 0 {
        let updated = ctx
            .job_storage
            .update_progress_counters_atomic(
                &parent.id,
                ProgressDelta {
                    total: spawned,
                    pending: spawned,
                    ..Default::default()
                },
            )
            .await?;
        *parent = updated;
    }

    Ok(())
}

/// Builds a child Job row plus its queue message for a single unit of
/// work. `url`/`depth` are only meaningful for crawl children; other
/// StepManagers leave them `None`.
#[allow(clippy::too_many_arguments)]
pub fn plan_child(
    id_provider: &Arc<dyn IdProvider>,
    time_provider: &Arc<dyn TimeProvider>,
    root_id: &JobId,
    job_type: &str,
    name: &str,
    message_type: &str,
    url: Option<String>,
    depth: Option<u32>,
    job_definition_id: Option<JobDefinitionId>,
    config: serde_json::Value,
) -> PlannedChild {
    let child_id = id_provider.generate_id();
    let mut job = Job::new_child(
        child_id.clone(),
        root_id.clone(),
        job_type,
        name,
        time_provider.now_millis(),
        config.clone(),
    );
    job.phase = JobPhase::Execution;
    job.status = JobStatus::Pending;

    let mut message = JobMessage::new(child_id, message_type);
    message.url = url;
    message.depth = depth;
    message.parent_id = Some(root_id.clone());
    message.job_definition_id = job_definition_id;
    message.config = config;

    PlannedChild { job, message }
}

pub fn config_str<'a>(config: &'a serde_json::Map<String, serde_json::Value>, key: &str) -> Option<&'a str> {
    config.get(key).and_then(|v| v.as_str())
}

pub fn config_i64(config: &serde_json::Map<String, serde_json::Value>, key: &str) -> Option<i64> {
    config.get(key).and_then(|v| v.as_i64())
}

pub fn config_bool(config: &serde_json::Map<String, serde_json::Value>, key: &str) -> Option<bool> {
    config.get(key).and_then(|v| v.as_bool())
}

pub fn config_str_vec(config: &serde_json::Map<String, serde_json::Value>, key: &str) -> Vec<String> {
    config
        .get(key)
        .and_then(|v| v.as_array())
        .map(|arr| {
            arr.iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default()
}
