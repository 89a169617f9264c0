// Structural invariants (spec §9): flat parent/child hierarchy, seen-URL
// uniqueness, terminal-status finality, non-negative counters, and
// at-least-once redelivery being a no-op on final job state.

mod common;

use common::Harness;
use semantica_core::application::job_kinds::{crawler_url, JobKind};
use semantica_core::application::step_managers::crawl::CrawlStepManager;
use semantica_core::application::step_managers::StepManager;
use semantica_core::domain::{JobDefinition, JobMessage, JobStatus, JobStep};
use semantica_core::port::{
    JobDefinitionStorage, JobStorage, ProgressDelta, QueueStorage, StatusUpdate, TimeProvider,
};

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

fn definition(id: &str, step: JobStep) -> JobDefinition {
    JobDefinition {
        id: id.to_string(),
        steps: vec![step],
        source_type: Some("web".to_string()),
        entity_type: None,
        tags: Vec::new(),
        error_tolerance: None,
    }
}

#[tokio::test]
async fn every_descendant_parent_id_points_at_the_root() {
    let h = Harness::new().await;
    // seed -> [c1, c2]; c1 -> [c3]; a depth-2 descendant must still carry
    // parent_id == root, never c1's id.
    h.scraper.set_links("http://seed", vec!["http://c1".to_string(), "http://c2".to_string()]);
    h.scraper.set_links("http://c1", vec!["http://c3".to_string()]);

    let def = definition(
        "def-hierarchy",
        crawl_step(serde_json::json!({
            "seed_urls": ["http://seed"],
            "max_depth": 2,
            "follow_links": true,
        })),
    );
    h.step_ctx.job_definition_storage.save(&def).await.unwrap();

    let root_id = CrawlStepManager
        .create_parent_job(&h.step_ctx, &def.steps[0], &def, None)
        .await
        .unwrap();
    h.drain().await;

    let root = h.job_storage.get_job(&root_id).await.unwrap();
    assert_eq!(root.progress.total, 4, "seed + c1 + c2 + c3");

    let stats = h.job_storage.get_child_stats(&[root_id.clone()]).await.unwrap();
    let child_count = stats.get(&root_id).map(|s| s.child_count).unwrap_or(0);
    assert_eq!(child_count, 4, "all descendants, including c3, are tracked against the root directly");
}

#[tokio::test]
async fn seen_url_is_claimed_exactly_once() {
    let h = Harness::new().await;
    let root_id = "root-seen".to_string();
    let root = semantica_core::domain::Job::new_root(
        root_id.clone(),
        "crawl",
        "crawl",
        None,
        h.time.now_millis(),
        serde_json::json!({}),
    );
    h.job_storage.create_job(&root).await.unwrap();

    let first = h.job_storage.mark_url_seen(&root_id, "http://dup").await.unwrap();
    let second = h.job_storage.mark_url_seen(&root_id, "http://dup").await.unwrap();
    let other = h.job_storage.mark_url_seen(&root_id, "http://not-dup").await.unwrap();

    assert!(first, "first claim of a URL succeeds");
    assert!(!second, "repeat claim of the same URL under the same root fails");
    assert!(other, "a distinct URL is unaffected by the first claim");
}

#[tokio::test]
async fn duplicate_links_within_one_scrape_are_only_claimed_once() {
    let h = Harness::new().await;
    h.scraper.set_links(
        "http://a",
        vec!["http://a/x".to_string(), "http://a/x".to_string(), "http://a/y".to_string()],
    );

    let def = definition(
        "def-dedup",
        crawl_step(serde_json::json!({
            "seed_urls": ["http://a"],
            "max_depth": 1,
            "follow_links": true,
        })),
    );
    h.step_ctx.job_definition_storage.save(&def).await.unwrap();

    let root_id = CrawlStepManager
        .create_parent_job(&h.step_ctx, &def.steps[0], &def, None)
        .await
        .unwrap();
    h.drain().await;

    let root = h.job_storage.get_job(&root_id).await.unwrap();
    // seed + x + y: the repeated /x link is discovered but not re-spawned.
    assert_eq!(root.progress.total, 3);
}

#[tokio::test]
async fn terminal_status_is_final_against_a_later_conflicting_update() {
    let h = Harness::new().await;
    let root = semantica_core::domain::Job::new_root(
        "root-final",
        "crawl",
        "crawl",
        None,
        h.time.now_millis(),
        serde_json::json!({}),
    );
    h.job_storage.create_job(&root).await.unwrap();

    h.job_storage
        .update_status(
            &root.id,
            StatusUpdate { status: JobStatus::Completed, error: None },
        )
        .await
        .unwrap();

    h.job_storage
        .update_status(
            &root.id,
            StatusUpdate { status: JobStatus::Failed, error: Some("too late".to_string()) },
        )
        .await
        .unwrap();

    let reloaded = h.job_storage.get_job(&root.id).await.unwrap();
    assert_eq!(reloaded.status, JobStatus::Completed, "a terminal job's status cannot be overwritten");
    assert!(reloaded.error.is_none(), "the stale update's error must not land either");
}

#[tokio::test]
async fn progress_counters_never_go_negative_end_to_end() {
    let h = Harness::new().await;
    let root = semantica_core::domain::Job::new_root(
        "root-clamp",
        "crawl",
        "crawl",
        None,
        h.time.now_millis(),
        serde_json::json!({}),
    );
    h.job_storage.create_job(&root).await.unwrap();

    let updated = h
        .job_storage
        .update_progress_counters_atomic(
            &root.id,
            ProgressDelta { completed: -5, pending: -5, total: -5, failed: -5 },
        )
        .await
        .unwrap();

    assert_eq!(updated.progress.completed, 0);
    assert_eq!(updated.progress.pending, 0);
    assert_eq!(updated.progress.total, 0);
    assert_eq!(updated.progress.failed, 0);
}

#[tokio::test]
async fn redelivered_crawler_url_message_does_not_double_count_progress() {
    let h = Harness::new().await;
    let def = definition(
        "def-redelivery",
        crawl_step(serde_json::json!({
            "seed_urls": ["http://a"],
            "max_depth": 0,
            "follow_links": false,
        })),
    );
    h.step_ctx.job_definition_storage.save(&def).await.unwrap();

    let root_id = CrawlStepManager
        .create_parent_job(&h.step_ctx, &def.steps[0], &def, None)
        .await
        .unwrap();

    // Pull the single seed message out directly instead of draining, so
    // its exact JobMessage (and therefore its id) can be replayed.
    let received = h
        .queue_storage
        .receive(std::time::Duration::from_secs(30))
        .await
        .unwrap()
        .expect("seed message is visible");
    let msg: JobMessage = received.message.payload.clone();
    h.queue_storage.ack(&received.ack_token).await.unwrap();

    crawler_url::CrawlerUrl.execute(&h.job_ctx, &msg).await.unwrap();
    let after_first = h.job_storage.get_job(&root_id).await.unwrap();
    assert_eq!(after_first.progress.completed, 1);
    assert_eq!(after_first.progress.pending, 0);

    // A crash before ack would redeliver the same message; the consumer
    // processes it again with the same id.
    crawler_url::CrawlerUrl.execute(&h.job_ctx, &msg).await.unwrap();
    let after_second = h.job_storage.get_job(&root_id).await.unwrap();
    assert_eq!(after_second.progress.completed, 1, "redelivery must not double-count");
    assert_eq!(after_second.progress.pending, 0);
    assert_eq!(after_second.progress.total, after_first.progress.total);
}
