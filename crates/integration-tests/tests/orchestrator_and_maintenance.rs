// Orchestrator step-chaining and database maintenance (spec §4.4, §4.5,
// §7): the step-walking loop, placeholder resolution against
// KeyValueStorage, and the maintenance StepManager/port pairing.

mod common;

use std::collections::HashMap;
use std::sync::Arc;

use common::Harness;
use semantica_core::application::orchestrator::StepManagerRegistry;
use semantica_core::application::step_managers::database_maintenance::DatabaseMaintenanceStepManager;
use semantica_core::application::step_managers::web_search::WebSearchStepManager;
use semantica_core::application::step_managers::StepManager;
use semantica_core::application::Orchestrator;
use semantica_core::domain::{Event, JobDefinition, JobStatus, JobStep};
use semantica_core::port::{
    JobDefinitionStorage, JobFilter, JobStorage, KeyValueStorage, Maintenance, MaintenanceConfig,
    TimeProvider,
};
use semantica_infra_sqlite::SqliteMaintenance;

fn config(value: serde_json::Value) -> serde_json::Map<String, serde_json::Value> {
    value.as_object().cloned().unwrap()
}

fn definition(id: &str, steps: Vec<JobStep>) -> JobDefinition {
    JobDefinition {
        id: id.to_string(),
        steps,
        source_type: Some("web".to_string()),
        entity_type: None,
        tags: Vec::new(),
        error_tolerance: None,
    }
}

fn registry() -> StepManagerRegistry {
    let mut registry: StepManagerRegistry = HashMap::new();
    registry.insert("web_search", Arc::new(WebSearchStepManager));
    registry.insert(
        "database_maintenance",
        Arc::new(DatabaseMaintenanceStepManager),
    );
    registry
}

#[tokio::test]
async fn chains_two_synchronous_steps_in_order() {
    let h = Harness::new().await;
    h.step_ctx.kv_storage.set("topic", "rust ownership").await.unwrap();

    let def = definition(
        "def-chain",
        vec![
            JobStep {
                name: "first search".to_string(),
                action: "web_search".to_string(),
                config: config(serde_json::json!({ "query": "{topic}" })),
            },
            JobStep {
                name: "second search".to_string(),
                action: "web_search".to_string(),
                config: config(serde_json::json!({ "query": "borrow checker" })),
            },
        ],
    );
    h.step_ctx.job_definition_storage.save(&def).await.unwrap();

    let orchestrator = Orchestrator::new(
        registry(),
        h.job_storage.clone(),
        h.step_ctx.kv_storage.clone(),
        h.time.clone(),
    );

    let final_id = orchestrator.run(&h.step_ctx, &def).await.unwrap();
    let final_job = h.job_storage.get_job(&final_id).await.unwrap();
    assert_eq!(final_job.status, JobStatus::Completed);
    assert_eq!(final_job.result_count, 1);

    // Both steps ran; each created its own completed root (web_search
    // never waits on children, so the chain never blocks).
    let started: Vec<_> = h
        .events
        .events()
        .into_iter()
        .filter_map(|e| match e {
            Event::JobStarted { url: None, .. } => Some(()),
            _ => None,
        })
        .collect();
    assert_eq!(started.len(), 2, "both web_search steps should have started a root job");
}

#[tokio::test]
async fn resolves_placeholders_against_kv_storage() {
    let h = Harness::new().await;
    h.step_ctx.kv_storage.set("query", "async runtimes").await.unwrap();

    let def = definition(
        "def-resolve",
        vec![JobStep {
            name: "search".to_string(),
            action: "web_search".to_string(),
            config: config(serde_json::json!({ "query": "{query}" })),
        }],
    );
    h.step_ctx.job_definition_storage.save(&def).await.unwrap();

    let orchestrator = Orchestrator::new(
        registry(),
        h.job_storage.clone(),
        h.step_ctx.kv_storage.clone(),
        h.time.clone(),
    );

    let job_id = orchestrator.run(&h.step_ctx, &def).await.unwrap();
    let job = h.job_storage.get_job(&job_id).await.unwrap();
    assert_eq!(job.status, JobStatus::Completed);
}

#[tokio::test]
async fn unresolved_placeholder_fails_the_chain_before_dispatch() {
    let h = Harness::new().await;

    let def = definition(
        "def-missing-secret",
        vec![JobStep {
            name: "search".to_string(),
            action: "web_search".to_string(),
            config: config(serde_json::json!({ "query": "{missing_key}" })),
        }],
    );
    h.step_ctx.job_definition_storage.save(&def).await.unwrap();

    let orchestrator = Orchestrator::new(
        registry(),
        h.job_storage.clone(),
        h.step_ctx.kv_storage.clone(),
        h.time.clone(),
    );

    let err = orchestrator.run(&h.step_ctx, &def).await.unwrap_err();
    assert!(
        err.to_string().contains("unresolved placeholder"),
        "unexpected error: {err}"
    );

    // resolve_placeholders runs before create_parent_job, so no root job
    // was ever created for the failing step.
    let jobs = h.job_storage.list_jobs(JobFilter::default()).await.unwrap();
    assert!(jobs.is_empty());
}

#[tokio::test]
async fn unregistered_action_fails_with_validation_error() {
    let h = Harness::new().await;
    let def = definition(
        "def-unknown-action",
        vec![JobStep {
            name: "mystery".to_string(),
            action: "does_not_exist".to_string(),
            config: config(serde_json::json!({})),
        }],
    );
    h.step_ctx.job_definition_storage.save(&def).await.unwrap();

    let orchestrator = Orchestrator::new(
        StepManagerRegistry::new(),
        h.job_storage.clone(),
        h.step_ctx.kv_storage.clone(),
        h.time.clone(),
    );

    let err = orchestrator.run(&h.step_ctx, &def).await.unwrap_err();
    assert!(err.to_string().contains("does_not_exist"));
}

#[tokio::test]
async fn database_maintenance_step_fans_out_one_child_per_operation() {
    let h = Harness::new().await;
    let def = definition(
        "def-maintenance",
        vec![JobStep {
            name: "nightly maintenance".to_string(),
            action: "database_maintenance".to_string(),
            config: config(serde_json::json!({ "operations": ["vacuum", "analyze"] })),
        }],
    );
    h.step_ctx.job_definition_storage.save(&def).await.unwrap();

    let root_id = DatabaseMaintenanceStepManager
        .create_parent_job(&h.step_ctx, &def.steps[0], &def, None)
        .await
        .unwrap();
    let processed = h.drain().await;
    assert_eq!(processed, 2, "one child per configured operation");

    h.run_completion_probe(&root_id).await;
    let root = h.job_storage.get_job(&root_id).await.unwrap();
    assert_eq!(root.status, JobStatus::Completed);
    assert_eq!(root.progress.total, 2);
    assert_eq!(root.progress.completed, 2);
    assert_eq!(root.progress.failed, 0);
}

#[tokio::test]
async fn database_maintenance_step_defaults_to_full_operation_set() {
    let h = Harness::new().await;
    let def = definition(
        "def-maintenance-default",
        vec![JobStep {
            name: "nightly maintenance".to_string(),
            action: "database_maintenance".to_string(),
            config: config(serde_json::json!({})),
        }],
    );
    h.step_ctx.job_definition_storage.save(&def).await.unwrap();

    let root_id = DatabaseMaintenanceStepManager
        .create_parent_job(&h.step_ctx, &def.steps[0], &def, None)
        .await
        .unwrap();
    let processed = h.drain().await;
    assert_eq!(processed, 4, "vacuum, analyze, reindex, optimize");

    let root = h.job_storage.get_job(&root_id).await.unwrap();
    assert_eq!(root.progress.total, 4);
    assert_eq!(root.progress.pending, 0);
}

#[tokio::test]
async fn sqlite_maintenance_full_pass_reports_stats_and_gcs_old_jobs() {
    let h = Harness::new().await;
    let maintenance = SqliteMaintenance::new(h.pool.clone(), h.time.clone());

    let old_cutoff = h.time.now_millis() - (30 * 24 * 60 * 60 * 1000);
    let mut stale = semantica_core::domain::Job::new_root(
        "stale-root",
        "crawl",
        "old job",
        None,
        old_cutoff,
        serde_json::json!({}),
    );
    stale.status = JobStatus::Completed;
    stale.completed_at = Some(old_cutoff);
    h.job_storage.create_job(&stale).await.unwrap();

    let stats_before = maintenance.get_stats().await.unwrap();
    assert_eq!(stats_before.job_count, 1);

    let maintenance_config = MaintenanceConfig::default();
    let stats_after = maintenance.run_full_maintenance(&maintenance_config).await.unwrap();

    assert_eq!(stats_after.job_count, 0, "stale completed root past retention is gc'd");
    assert!(h.job_storage.get_job(&stale.id).await.is_err());
}
