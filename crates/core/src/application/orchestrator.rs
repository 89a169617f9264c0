// Orchestrator (spec §4.4): walks a JobDefinition's step list in
// declaration order, resolves `{placeholder}` config substitutions against
// the KeyValueStorage, and invokes the StepManager registered for each
// step's `action`. The returned parent id becomes the `parent_job_id`
// handed to the next step, forming a linear chain of root-job handoffs.
//
// Modeled on the teacher's validate -> transact -> insert use-case
// structure (see step_managers for the per-step half of that pattern),
// extended here into a step-walking loop with a wait-for-children barrier.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{error, info, warn};

use crate::application::step_managers::{StepContext, StepManager};
use crate::application::worker::constants::{ORCHESTRATOR_POLL_TICK, ORCHESTRATOR_WAIT_TIMEOUT};
use crate::domain::{FailureAction, JobDefinition, JobId, JobStatus};
use crate::error::{AppError, Result};
use crate::port::{JobStorage, KeyValueStorage, StatusUpdate, TimeProvider};

/// Maps a `JobStep.action` to the `StepManager` that handles it.
pub type StepManagerRegistry = HashMap<&'static str, Arc<dyn StepManager>>;

pub struct Orchestrator {
    registry: StepManagerRegistry,
    job_storage: Arc<dyn JobStorage>,
    kv_storage: Arc<dyn KeyValueStorage>,
    time_provider: Arc<dyn TimeProvider>,
}

impl Orchestrator {
    pub fn new(
        registry: StepManagerRegistry,
        job_storage: Arc<dyn JobStorage>,
        kv_storage: Arc<dyn KeyValueStorage>,
        time_provider: Arc<dyn TimeProvider>,
    ) -> Self {
        Self {
            registry,
            job_storage,
            kv_storage,
            time_provider,
        }
    }

    /// Runs a definition end to end. Returns the id of the last step's
    /// parent job (the final link in the chain) on success.
    pub async fn run(&self, ctx: &StepContext, definition: &JobDefinition) -> Result<JobId> {
        let mut parent_job_id: Option<JobId> = None;

        for step in &definition.steps {
            let Some(manager) = self.registry.get(step.action.as_str()).cloned() else {
                return Err(AppError::Validation(format!(
                    "no StepManager registered for action '{}'",
                    step.action
                )));
            };

            let resolved_step = self.resolve_placeholders(step).await?;

            info!(step = %step.name, action = %step.action, "orchestrator dispatching step");
            let new_parent_id = manager
                .create_parent_job(ctx, &resolved_step, definition, parent_job_id.as_deref())
                .await?;

            if manager.returns_child_jobs() {
                let outcome = self.wait_for_children(&new_parent_id, definition).await?;
                if outcome == WaitOutcome::StopChain {
                    return Err(AppError::InvalidState(format!(
                        "step '{}' failed definition run (error tolerance stop_all or timeout)",
                        step.name
                    )));
                }
            }

            parent_job_id = Some(new_parent_id);
        }

        parent_job_id.ok_or_else(|| AppError::Validation("definition has no steps".to_string()))
    }

    async fn resolve_placeholders(
        &self,
        step: &crate::domain::JobStep,
    ) -> Result<crate::domain::JobStep> {
        let mut resolved = step.clone();
        for value in resolved.config.values_mut() {
            if let serde_json::Value::String(s) = value {
                *s = self.resolve_string(s).await?;
            }
        }
        Ok(resolved)
    }

    /// Replaces every `{key}` substring with the KeyValueStorage's value
    /// for `key`. An unresolved placeholder is an orchestrator-level
    /// failure (spec §7: "unresolved secret" fails the chain).
    async fn resolve_string(&self, input: &str) -> Result<String> {
        let mut out = String::with_capacity(input.len());
        let mut rest = input;
        while let Some(open) = rest.find('{') {
            let Some(close_rel) = rest[open..].find('}') else {
                out.push_str(rest);
                rest = "";
                break;
            };
            let close = open + close_rel;
            out.push_str(&rest[..open]);
            let key = &rest[open + 1..close];
            match self.kv_storage.get(key).await? {
                Some(value) => out.push_str(&value),
                None => {
                    return Err(AppError::Validation(format!(
                        "unresolved placeholder '{{{key}}}' in step config"
                    )))
                }
            }
            rest = &rest[close + 1..];
        }
        out.push_str(rest);
        Ok(out)
    }

    /// Polls `get_child_stats` until the parent's directly enqueued
    /// children all reach terminal status (spec §4.4).
    async fn wait_for_children(
        &self,
        parent_id: &JobId,
        definition: &JobDefinition,
    ) -> Result<WaitOutcome> {
        let deadline = self.time_provider.now_millis() + ORCHESTRATOR_WAIT_TIMEOUT.as_millis() as i64;

        loop {
            let parent = self.job_storage.get_job(parent_id).await?;
            if parent.status.is_terminal() {
                return Ok(match parent.status {
                    JobStatus::Failed | JobStatus::Cancelled => {
                        self.tolerance_outcome(definition, &parent)
                    }
                    _ => WaitOutcome::Continue,
                });
            }

            if parent.progress.total > 0 && parent.progress.pending == 0 {
                return Ok(WaitOutcome::Continue);
            }

            if self.time_provider.now_millis() >= deadline {
                error!(parent_job_id = %parent_id, "orchestrator timed out waiting for children");
                self.job_storage
                    .update_status(
                        parent_id,
                        StatusUpdate {
                            status: JobStatus::Failed,
                            error: Some("timeout waiting for children".to_string()),
                        },
                    )
                    .await?;
                return Ok(self.tolerance_outcome(definition, &parent));
            }

            tokio::time::sleep(ORCHESTRATOR_POLL_TICK).await;
        }
    }

    fn tolerance_outcome(&self, definition: &JobDefinition, _parent: &crate::domain::Job) -> WaitOutcome {
        match &definition.error_tolerance {
            Some(t) if t.failure_action == FailureAction::StopAll => WaitOutcome::StopChain,
            _ => {
                warn!("step failed but error tolerance is not stop_all; continuing chain");
                WaitOutcome::Continue
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WaitOutcome {
    Continue,
    StopChain,
}
