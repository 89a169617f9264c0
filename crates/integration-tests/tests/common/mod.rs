// Shared harness for the end-to-end scenario suites: a controllable clock,
// deterministic ids, an in-memory sqlite pool, and a scripted Scraper so
// crawl fan-out can be driven without a real HTTP stack or wall-clock
// sleeps.

use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use sqlx::SqlitePool;

use semantica_core::application::job_kinds::{self, JobContext, JobKind};
use semantica_core::application::step_managers::StepContext;
use semantica_core::domain::JobMessage;
use semantica_core::error::Result;
use semantica_core::port::auth_storage::mocks::{InMemoryAuthStorage, InMemorySourceStorage};
use semantica_core::port::event_bus::mocks::RecordingEventBus;
use semantica_core::port::external::mocks::{EchoGeminiClient, EchoLlmClient, EmptyGitHubConnector};
use semantica_core::port::external::{CollaboratorError, ScrapeConfig, ScrapeResult, Scraper};
use semantica_core::port::kv_storage::mocks::InMemoryKeyValueStorage;
use semantica_core::port::{EventBus, IdProvider, QueueStorage, TimeProvider};
use semantica_infra_sqlite::{
    create_pool, run_migrations, SqliteDocumentStorage, SqliteJobDefinitionStorage,
    SqliteJobLogStorage, SqliteJobStorage, SqliteQueueStorage,
};

/// Clock fully controlled by the test — every port in this harness takes
/// `TimeProvider` explicitly, so advancing this never races real time.
pub struct FixedTimeProvider {
    millis: AtomicI64,
}

impl FixedTimeProvider {
    pub fn new(start_millis: i64) -> Arc<Self> {
        Arc::new(Self {
            millis: AtomicI64::new(start_millis),
        })
    }

    pub fn advance(&self, delta_ms: i64) {
        self.millis.fetch_add(delta_ms, Ordering::SeqCst);
    }

    pub fn set(&self, value: i64) {
        self.millis.store(value, Ordering::SeqCst);
    }
}

impl TimeProvider for FixedTimeProvider {
    fn now_millis(&self) -> i64 {
        self.millis.load(Ordering::SeqCst)
    }
}

pub struct SeqIdProvider {
    next: AtomicUsize,
    prefix: &'static str,
}

impl SeqIdProvider {
    pub fn new(prefix: &'static str) -> Arc<Self> {
        Arc::new(Self {
            next: AtomicUsize::new(0),
            prefix,
        })
    }
}

impl IdProvider for SeqIdProvider {
    fn generate_id(&self) -> String {
        let n = self.next.fetch_add(1, Ordering::SeqCst);
        format!("{}-{n}", self.prefix)
    }
}

/// Scraper keyed by URL: returns a scripted response or, absent one, an
/// empty success. `fail_urls` simulates S3/S4's mixed-failure scenarios.
#[derive(Default)]
pub struct ScriptedScraper {
    links: Mutex<HashMap<String, Vec<String>>>,
    fail_urls: Mutex<std::collections::HashSet<String>>,
}

impl ScriptedScraper {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set_links(&self, url: impl Into<String>, links: Vec<String>) {
        self.links.lock().unwrap().insert(url.into(), links);
    }

    pub fn fail(&self, url: impl Into<String>) {
        self.fail_urls.lock().unwrap().insert(url.into());
    }
}

#[async_trait]
impl Scraper for ScriptedScraper {
    async fn scrape(&self, url: &str, _config: &ScrapeConfig) -> Result<ScrapeResult, CollaboratorError> {
        if self.fail_urls.lock().unwrap().contains(url) {
            return Err(CollaboratorError::Network(format!("scripted failure for {url}")));
        }
        let links = self.links.lock().unwrap().get(url).cloned().unwrap_or_default();
        Ok(ScrapeResult {
            success: true,
            status: 200,
            title: Some(format!("title for {url}")),
            content_markdown: format!("content for {url}"),
            description: None,
            language: Some("en".to_string()),
            links,
            timestamp: 0,
            duration_ms: 1,
        })
    }
}

pub struct Harness {
    pub pool: SqlitePool,
    pub time: Arc<FixedTimeProvider>,
    pub ids: Arc<SeqIdProvider>,
    pub scraper: Arc<ScriptedScraper>,
    pub events: Arc<RecordingEventBus>,
    pub job_storage: Arc<SqliteJobStorage>,
    pub queue_storage: Arc<SqliteQueueStorage>,
    pub step_ctx: StepContext,
    pub job_ctx: JobContext,
}

impl Harness {
    pub async fn new() -> Self {
        let pool = create_pool("sqlite::memory:").await.unwrap();
        run_migrations(&pool).await.unwrap();

        let time = FixedTimeProvider::new(1_000_000);
        let ids = SeqIdProvider::new("job");
        let scraper = ScriptedScraper::new();
        let events: Arc<RecordingEventBus> = Arc::new(RecordingEventBus::new());
        let event_bus: Arc<dyn EventBus> = events.clone();

        let job_storage = Arc::new(SqliteJobStorage::new(pool.clone()));
        let queue_storage = Arc::new(SqliteQueueStorage::new(pool.clone()));
        let document_storage = Arc::new(SqliteDocumentStorage::new(pool.clone()));
        let job_log_storage = Arc::new(SqliteJobLogStorage::new(pool.clone()));
        let job_definition_storage = Arc::new(SqliteJobDefinitionStorage::new(pool.clone()));
        let kv_storage = Arc::new(InMemoryKeyValueStorage::new());
        let llm_client = Arc::new(EchoLlmClient);
        let github_connector = Arc::new(EmptyGitHubConnector);
        let gemini_client = Arc::new(EchoGeminiClient);

        let (shutdown_tx, shutdown_rx) = semantica_core::application::worker::shutdown_channel();
        // Keep the sender alive for the harness's lifetime; tests never
        // exercise shutdown mid-drain.
        std::mem::forget(shutdown_tx);

        let step_ctx = StepContext {
            job_storage: job_storage.clone(),
            queue_storage: queue_storage.clone(),
            event_bus: event_bus.clone(),
            document_storage: document_storage.clone(),
            job_log_storage: job_log_storage.clone(),
            job_definition_storage: job_definition_storage.clone(),
            kv_storage: kv_storage.clone(),
            auth_storage: Arc::new(InMemoryAuthStorage(HashMap::new())),
            source_storage: Arc::new(InMemorySourceStorage(HashMap::new())),
            scraper: scraper.clone(),
            llm_client: llm_client.clone(),
            github_connector: github_connector.clone(),
            gemini_client: gemini_client.clone(),
            time_provider: time.clone(),
            id_provider: ids.clone(),
        };

        let job_ctx = JobContext {
            job_storage: job_storage.clone(),
            queue_storage: queue_storage.clone(),
            event_bus,
            document_storage,
            job_log_storage,
            job_definition_storage,
            kv_storage,
            scraper: scraper.clone(),
            llm_client,
            github_connector,
            gemini_client,
            time_provider: time.clone(),
            id_provider: ids.clone(),
            shutdown: shutdown_rx,
        };

        Self {
            pool,
            time,
            ids,
            scraper,
            events,
            job_storage,
            queue_storage,
            step_ctx,
            job_ctx,
        }
    }

    /// Drains every currently-visible queue message through the real
    /// `JobKindRouter`, acking each on success, until `receive` returns
    /// `None`. A delayed completion probe stays invisible and is left in
    /// the queue — tests drive probes directly via `run_completion_probe`.
    pub async fn drain(&self) -> usize {
        let mut processed = 0;
        loop {
            let Some(received) = self.queue_storage.receive(Duration::from_secs(30)).await.unwrap() else {
                break;
            };
            let msg = received.message.payload.clone();
            if msg.message_type == job_kinds::completion_probe::MESSAGE_TYPE {
                // Leave probes queued; scenario tests invoke them directly
                // so the 5-second grace period never needs a real sleep.
                self.queue_storage.ack(&received.ack_token).await.unwrap();
                continue;
            }
            self.dispatch(&msg).await;
            self.queue_storage.ack(&received.ack_token).await.unwrap();
            processed += 1;
        }
        processed
    }

    async fn dispatch(&self, msg: &JobMessage) {
        use job_kinds::{cleanup, crawler_url, generic_operation, reindex, summarizer};
        let outcome = match msg.message_type.as_str() {
            crawler_url::MESSAGE_TYPE => crawler_url::CrawlerUrl.execute(&self.job_ctx, msg).await,
            reindex::MESSAGE_TYPE => reindex::Reindex.execute(&self.job_ctx, msg).await,
            summarizer::MESSAGE_TYPE => summarizer::Summarizer.execute(&self.job_ctx, msg).await,
            cleanup::MESSAGE_TYPE => cleanup::Cleanup.execute(&self.job_ctx, msg).await,
            _ => generic_operation::GenericOperation.execute(&self.job_ctx, msg).await,
        };
        outcome.expect("job kind execution should not fail in these scenarios");
    }

    /// Directly invokes the completion probe JobKind against `root_id`,
    /// bypassing the queue's delayed visibility so tests control timing
    /// purely through `FixedTimeProvider`.
    pub async fn run_completion_probe(&self, root_id: &str) {
        let mut msg = JobMessage::new(self.ids.generate_id(), job_kinds::completion_probe::MESSAGE_TYPE);
        msg.parent_id = Some(root_id.to_string());
        job_kinds::completion_probe::CompletionProbe
            .execute(&self.job_ctx, &msg)
            .await
            .expect("completion probe should not fail");
    }
}
