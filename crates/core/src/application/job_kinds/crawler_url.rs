// Crawler JobKind (spec §4.6) — the most intricate worker. One message in,
// zero or more `crawler_url` children out, one Document written on success.

use async_trait::async_trait;

use crate::application::error_formatter::{format_job_error, ErrorCategory};
use crate::application::link_filter::LinkFilter;
use crate::application::step_managers::common::{config_bool, config_i64, config_str, config_str_vec};
use crate::domain::{Event, Job, JobMessage, JobPhase, JobStatus};
use crate::error::Result;
use crate::port::external::{CollaboratorError, ScrapeConfig};
use crate::port::{Document, ProgressDelta};

use super::common::{first_touch_child, first_touch_root, maybe_arm_completion_probe, run_tolerance_check};
use super::{JobContext, JobKind, JobKindError};

pub const MESSAGE_TYPE: &str = "crawler_url";

const MAX_DEPTH_CEILING: i64 = 10;
const DEFAULT_MAX_DEPTH: u32 = 3;
const DEFAULT_CONCURRENCY: u8 = 4;
const MAX_CONCURRENCY: u8 = 10;

pub struct CrawlerUrl;

fn config_object(msg: &JobMessage) -> serde_json::Map<String, serde_json::Value> {
    msg.config.as_object().cloned().unwrap_or_default()
}

fn merged_scrape_config(config: &serde_json::Map<String, serde_json::Value>) -> ScrapeConfig {
    let concurrency = config_i64(config, "concurrency")
        .map(|c| c.clamp(1, MAX_CONCURRENCY as i64) as u8)
        .unwrap_or(DEFAULT_CONCURRENCY);
    ScrapeConfig {
        rate_limit_ms: config_i64(config, "rate_limit").unwrap_or(0).max(0) as u64,
        concurrency,
        max_depth: config_i64(config, "max_depth")
            .map(|d| d.clamp(0, MAX_DEPTH_CEILING) as u32)
            .unwrap_or(DEFAULT_MAX_DEPTH),
        enable_javascript: config_bool(config, "javascript_rendering").unwrap_or(false),
        timeout_secs: config_i64(config, "timeout").unwrap_or(30).max(1) as u64,
    }
}

#[async_trait]
impl JobKind for CrawlerUrl {
    async fn validate(&self, msg: &JobMessage) -> Result<()> {
        if msg.url.as_deref().unwrap_or("").is_empty() {
            return Err(crate::error::AppError::Validation(
                "crawler_url message requires a non-empty url".to_string(),
            ));
        }
        if msg.parent_id.as_deref().unwrap_or("").is_empty() {
            return Err(crate::error::AppError::Validation(
                "crawler_url message requires parent_id (root job id)".to_string(),
            ));
        }
        if !msg.config.is_object() {
            return Err(crate::error::AppError::Validation(
                "crawler_url message requires a config object".to_string(),
            ));
        }
        let config = config_object(msg);
        if let Some(max_depth) = config_i64(&config, "max_depth") {
            if !(0..=MAX_DEPTH_CEILING).contains(&max_depth) {
                return Err(crate::error::AppError::Validation(format!(
                    "crawler_url max_depth must be within [0,{MAX_DEPTH_CEILING}], got {max_depth}"
                )));
            }
        }
        Ok(())
    }

    async fn execute(&self, ctx: &JobContext, msg: &JobMessage) -> Result<(), JobKindError> {
        // Every fallible step in `run` is store/queue I/O after validation
        // already passed, so a failure here is a transient storage hiccup,
        // not a bad message — redeliver rather than terminally failing the
        // child (spec §7: "storage transient errors ... warn and continue").
        self.run(ctx, msg)
            .await
            .map_err(|e| JobKindError::Retryable(e.to_string()))
    }
}

impl CrawlerUrl {
    async fn run(&self, ctx: &JobContext, msg: &JobMessage) -> Result<()> {
        let root_id = msg.parent_id.clone().expect("validated");
        let url = msg.url.clone().expect("validated");
        let depth = msg.depth.unwrap_or(0);
        let config = config_object(msg);
        let scrape_config = merged_scrape_config(&config);

        let mut root = ctx.job_storage.get_job(&root_id).await?;

        // Root already settled (e.g. `stop_all` tripped concurrently) — ACK
        // without scraping, writing a Document, or spawning children (spec
        // §4.7, invariant 8: "no further children are processed").
        if root.status.is_terminal() {
            return Ok(());
        }

        // Redelivery of an already-settled message (invariant 7): the
        // child row transitioned terminal on a prior delivery, so this
        // dispatch is a no-op rather than double-counting progress.
        if let Ok(child) = ctx.job_storage.get_job(&msg.id).await {
            if child.status.is_terminal() {
                return Ok(());
            }
        }

        // Step 3: depth beyond max_depth is a silent ACK, no side effects.
        if depth as i64 > scrape_config.max_depth as i64 {
            return Ok(());
        }

        // Step 4: first-touch root pending -> running.
        first_touch_root(
            &ctx.job_storage,
            &ctx.event_bus,
            &ctx.time_provider,
            &mut root,
            Some(url.clone()),
            Some(depth),
        )
        .await?;

        // Step 5: first-touch the persisted child row, tolerating a missing one.
        let now = ctx.time_provider.now_millis();
        first_touch_child(&ctx.job_storage, &msg.id, now).await;

        // Step 6: scrape.
        let scrape_result = ctx.scraper.scrape(&url, &scrape_config).await;

        match scrape_result {
            Ok(result) if result.success && result.status < 400 => {
                self.on_success(ctx, &root, &msg.id, &url, depth, &config, &scrape_config, result)
                    .await
            }
            Ok(result) => {
                let err = format_job_error(
                    ErrorCategory::Http(result.status),
                    "non-success status returned by scraper",
                    Some(&url),
                    None,
                );
                self.on_failure(ctx, &root, &msg.id, err).await
            }
            Err(collab_err) => {
                let category = match &collab_err {
                    CollaboratorError::Network(_) => ErrorCategory::Network,
                    CollaboratorError::Http { status, .. } => ErrorCategory::Http(*status),
                    CollaboratorError::Timeout(_) => ErrorCategory::Timeout,
                    CollaboratorError::Scraping(_) => ErrorCategory::Scraping,
                };
                let timeout_ms = match &collab_err {
                    CollaboratorError::Timeout(ms) => Some(*ms),
                    _ => None,
                };
                let err = format_job_error(category, &collab_err.to_string(), Some(&url), timeout_ms);
                self.on_failure(ctx, &root, &msg.id, err).await
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    async fn on_success(
        &self,
        ctx: &JobContext,
        root: &Job,
        child_id: &str,
        url: &str,
        depth: u32,
        config: &serde_json::Map<String, serde_json::Value>,
        scrape_config: &ScrapeConfig,
        result: crate::port::external::ScrapeResult,
    ) -> Result<()> {
        if result.content_markdown.trim().is_empty() {
            tracing::warn!(url, root_id = %root.id, "scrape succeeded with empty content");
        }

        let source_type = config_str(config, "source_type").unwrap_or("web").to_string();
        let doc = Document {
            id: ctx.id_provider.generate_id(),
            source_id: url.to_string(),
            source_type,
            title: result.title.clone(),
            content_markdown: result.content_markdown.clone(),
            detail_level: "full".to_string(),
            metadata: serde_json::json!({
                "description": result.description,
                "language": result.language,
                "duration_ms": result.duration_ms,
            }),
            created_at: ctx.time_provider.now_millis(),
        };
        ctx.document_storage.save(&doc).await?;
        ctx.event_bus
            .publish(Event::DocumentSaved {
                job_id: child_id.to_string(),
                parent_job_id: Some(root.id.clone()),
                document_id: doc.id.clone(),
                timestamp: ctx.time_provider.now_millis(),
            })
            .await;

        // Step 7: link expansion.
        let follow_links = config_bool(config, "follow_links").unwrap_or(false);
        let mut spawned = 0i64;
        if follow_links && depth < scrape_config.max_depth {
            let max_pages = config_i64(config, "max_pages").unwrap_or(i64::MAX);
            let include = config_str_vec(config, "include_patterns");
            let exclude = config_str_vec(config, "exclude_patterns");
            let filter = LinkFilter::new(&include, &exclude).unwrap_or_else(|_| LinkFilter::empty());

            for link in &result.links {
                if spawned >= max_pages {
                    break;
                }
                if !filter.allows(link) {
                    continue;
                }
                let is_new = ctx.job_storage.mark_url_seen(&root.id, link).await?;
                if !is_new {
                    continue;
                }

                let child_id = ctx.id_provider.generate_id();
                let now = ctx.time_provider.now_millis();
                let mut child_job = Job::new_child(
                    child_id.clone(),
                    root.id.clone(),
                    "crawler_url",
                    format!("crawl: {link}"),
                    now,
                    serde_json::Value::Object(config.clone()),
                );
                child_job.phase = JobPhase::Execution;
                child_job.status = JobStatus::Pending;
                ctx.job_storage.create_job(&child_job).await?;

                let mut child_msg = JobMessage::new(child_id.clone(), MESSAGE_TYPE);
                child_msg.url = Some(link.clone());
                child_msg.depth = Some(depth + 1);
                child_msg.parent_id = Some(root.id.clone());
                child_msg.job_definition_id = root.job_definition_id.clone();
                child_msg.config = serde_json::Value::Object(config.clone());
                ctx.queue_storage.enqueue(child_msg).await?;

                ctx.event_bus
                    .publish(Event::JobSpawn {
                        parent_job_id: root.id.clone(),
                        child_job_id: child_id,
                        job_type: "crawler_url".to_string(),
                        url: Some(link.clone()),
                        depth: Some(depth + 1),
                        timestamp: now,
                    })
                    .await;

                spawned += 1;
            }
        }

        let updated_root = ctx
            .job_storage
            .update_progress_counters_atomic(
                &root.id,
                ProgressDelta {
                    completed: 1,
                    pending: spawned - 1,
                    total: spawned,
                    failed: 0,
                },
            )
            .await?;

        if ctx.job_storage.get_job(&child_id.to_string()).await.is_ok() {
            let _ = ctx
                .job_storage
                .update_status(
                    &child_id.to_string(),
                    crate::port::StatusUpdate {
                        status: JobStatus::Completed,
                        error: None,
                    },
                )
                .await;
        }

        ctx.job_storage.update_heartbeat(&root.id).await?;
        maybe_arm_completion_probe(&ctx.queue_storage, &ctx.id_provider, &updated_root).await?;
        run_tolerance_check(ctx, &updated_root).await?;

        Ok(())
    }

    async fn on_failure(&self, ctx: &JobContext, root: &Job, child_id: &str, error: String) -> Result<()> {
        let mut root_row = ctx.job_storage.get_job(&root.id).await?;
        root_row.error = Some(error.clone());
        ctx.job_storage.save_job(&root_row).await?;

        let updated_root = ctx
            .job_storage
            .update_progress_counters_atomic(
                &root.id,
                ProgressDelta {
                    completed: 1,
                    pending: -1,
                    total: 0,
                    failed: 1,
                },
            )
            .await?;

        if ctx.job_storage.get_job(&child_id.to_string()).await.is_ok() {
            let _ = ctx
                .job_storage
                .update_status(
                    &child_id.to_string(),
                    crate::port::StatusUpdate {
                        status: JobStatus::Failed,
                        error: Some(error.clone()),
                    },
                )
                .await;
        }

        ctx.event_bus
            .publish(Event::JobError {
                job_id: child_id.to_string(),
                parent_job_id: Some(root.id.clone()),
                error_message: error,
                timestamp: ctx.time_provider.now_millis(),
            })
            .await;

        ctx.job_storage.update_heartbeat(&root.id).await?;
        run_tolerance_check(ctx, &updated_root).await?;
        maybe_arm_completion_probe(&ctx.queue_storage, &ctx.id_provider, &updated_root).await?;

        Ok(())
    }
}
