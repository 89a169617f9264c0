// End-to-end crawl scenarios (spec §8 S1-S4, S6): CrawlStepManager builds
// the root + seed children, the harness drains crawler_url messages
// through the real JobKind, and the completion probe settles the root.

mod common;

use common::Harness;
use semantica_core::application::step_managers::crawl::CrawlStepManager;
use semantica_core::application::step_managers::StepManager;
use semantica_core::domain::{ErrorTolerance, FailureAction, JobDefinition, JobStatus, JobStep};
use semantica_core::port::{JobDefinitionStorage, JobStorage};

fn config(value: serde_json::Value) -> serde_json::Map<String, serde_json::Value> {
    value.as_object().cloned().unwrap()
}

fn crawl_step(cfg: serde_json::Value) -> JobStep {
    JobStep {
        name: "crawl".to_string(),
        action: "crawl".to_string(),
        config: config(cfg),
    }
}

fn definition(id: &str, step: JobStep, tolerance: Option<ErrorTolerance>) -> JobDefinition {
    JobDefinition {
        id: id.to_string(),
        steps: vec![step],
        source_type: Some("web".to_string()),
        entity_type: None,
        tags: Vec::new(),
        error_tolerance: tolerance,
    }
}

#[tokio::test]
async fn s1_single_url_crawl() {
    let h = Harness::new().await;
    let def = definition(
        "def-s1",
        crawl_step(serde_json::json!({
            "seed_urls": ["http://a"],
            "max_depth": 0,
            "follow_links": false,
        })),
        None,
    );
    h.step_ctx.job_definition_storage.save(&def).await.unwrap();

    let root_id = CrawlStepManager.create_parent_job(&h.step_ctx, &def.steps[0], &def, None).await.unwrap();
    let processed = h.drain().await;
    assert_eq!(processed, 1);

    h.run_completion_probe(&root_id).await;

    let root = h.job_storage.get_job(&root_id).await.unwrap();
    assert_eq!(root.status, JobStatus::Completed);
    assert_eq!(root.progress.total, 1);
    assert_eq!(root.progress.completed, 1);
    assert_eq!(root.progress.pending, 0);
    assert_eq!(root.progress.failed, 0);

    let doc_saved = h
        .events
        .events()
        .into_iter()
        .filter(|e| matches!(e, semantica_core::domain::Event::DocumentSaved { .. }))
        .count();
    assert_eq!(doc_saved, 1);
}

#[tokio::test]
async fn s2_depth1_fanout_dedups_links() {
    let h = Harness::new().await;
    h.scraper.set_links("http://a", vec![
        "http://a/x".to_string(),
        "http://a/x".to_string(),
        "http://a/y".to_string(),
    ]);

    let def = definition(
        "def-s2",
        crawl_step(serde_json::json!({
            "seed_urls": ["http://a"],
            "max_depth": 1,
            "follow_links": true,
        })),
        None,
    );
    h.step_ctx.job_definition_storage.save(&def).await.unwrap();

    let root_id = CrawlStepManager.create_parent_job(&h.step_ctx, &def.steps[0], &def, None).await.unwrap();
    h.drain().await;
    h.run_completion_probe(&root_id).await;

    let root = h.job_storage.get_job(&root_id).await.unwrap();
    assert_eq!(root.status, JobStatus::Completed);
    assert_eq!(root.progress.total, 3);
    assert_eq!(root.progress.completed, 3);
    assert_eq!(root.progress.failed, 0);
}

#[tokio::test]
async fn s3_mixed_failures_under_continue_tolerance() {
    let h = Harness::new().await;
    h.scraper.fail("http://s2");
    h.scraper.fail("http://s4");

    let tolerance = ErrorTolerance {
        max_child_failures: 3,
        failure_action: FailureAction::Continue,
    };
    let def = definition(
        "def-s3",
        crawl_step(serde_json::json!({
            "seed_urls": ["http://s1", "http://s2", "http://s3", "http://s4", "http://s5"],
            "max_depth": 0,
            "follow_links": false,
        })),
        Some(tolerance),
    );
    h.step_ctx.job_definition_storage.save(&def).await.unwrap();

    let root_id = CrawlStepManager.create_parent_job(&h.step_ctx, &def.steps[0], &def, None).await.unwrap();
    h.drain().await;
    h.run_completion_probe(&root_id).await;

    let root = h.job_storage.get_job(&root_id).await.unwrap();
    assert_eq!(root.status, JobStatus::Completed);
    assert_eq!(root.progress.completed, 5);
    assert_eq!(root.progress.failed, 2);
    assert_eq!(root.result_count, 3);
    assert_eq!(root.failed_count, 2);
    assert!(root.error.is_some());
}

#[tokio::test]
async fn s4_threshold_trip_with_stop_all() {
    let h = Harness::new().await;
    h.scraper.fail("http://s2");
    h.scraper.fail("http://s4");

    let tolerance = ErrorTolerance {
        max_child_failures: 2,
        failure_action: FailureAction::StopAll,
    };
    let def = definition(
        "def-s4",
        crawl_step(serde_json::json!({
            "seed_urls": ["http://s1", "http://s2", "http://s3", "http://s4", "http://s5"],
            "max_depth": 0,
            "follow_links": false,
        })),
        Some(tolerance),
    );
    h.step_ctx.job_definition_storage.save(&def).await.unwrap();

    let root_id = CrawlStepManager.create_parent_job(&h.step_ctx, &def.steps[0], &def, None).await.unwrap();
    h.drain().await;

    let root = h.job_storage.get_job(&root_id).await.unwrap();
    assert_eq!(root.status, JobStatus::Failed);
    let error = root.error.expect("stop_all sets an error string");
    assert!(error.contains("Error tolerance exceeded: 2/5"), "unexpected error text: {error}");

    let failed_events = h
        .events
        .events()
        .into_iter()
        .filter(|e| matches!(e, semantica_core::domain::Event::JobFailed { .. }))
        .count();
    assert_eq!(failed_events, 1, "JobFailed must fire exactly once");
}

#[tokio::test]
async fn s6_late_child_spawn_delays_completion() {
    let h = Harness::new().await;
    // The seed discovers two children; the first child's scrape discovers
    // a third right as it settles, simulating a spawn racing the probe.
    h.scraper.set_links("http://seed", vec!["http://c1".to_string(), "http://c2".to_string()]);
    h.scraper.set_links("http://c1", vec!["http://c3".to_string()]);

    let def = definition(
        "def-s6",
        crawl_step(serde_json::json!({
            "seed_urls": ["http://seed"],
            "max_depth": 2,
            "follow_links": true,
        })),
        None,
    );
    h.step_ctx.job_definition_storage.save(&def).await.unwrap();

    let root_id = CrawlStepManager.create_parent_job(&h.step_ctx, &def.steps[0], &def, None).await.unwrap();
    h.drain().await;

    let root = h.job_storage.get_job(&root_id).await.unwrap();
    assert_eq!(root.progress.total, 4, "seed + c1 + c2 + c3");
    assert_eq!(root.progress.completed, 4);
    assert_eq!(root.progress.pending, 0);

    h.run_completion_probe(&root_id).await;
    let root = h.job_storage.get_job(&root_id).await.unwrap();
    assert_eq!(root.status, JobStatus::Completed);
}
