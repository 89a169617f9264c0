//! Semantica Task Engine - Main Entry Point
//!
//! Composition root (ADR-001): wires the SQLite-backed ports, the
//! in-memory EventBus, and the out-of-scope external collaborators (spec
//! §1) behind their mock implementations, then starts the JSON-RPC admin
//! surface, the worker pool, crash recovery, and the maintenance scheduler.

use anyhow::Result;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use semantica_api_rpc::{server::RpcServerConfig, RpcServer};
use semantica_core::application::job_kinds::{self, JobContext};
use semantica_core::application::orchestrator::StepManagerRegistry;
use semantica_core::application::recovery::RecoveryService;
use semantica_core::application::step_managers::{self, StepContext};
use semantica_core::application::worker::{shutdown_channel, JobKindRouter, WorkerPool};
use semantica_core::application::{MaintenanceScheduler, Orchestrator};
use semantica_core::port::auth_storage::mocks::{InMemoryAuthStorage, InMemorySourceStorage};
use semantica_core::port::external::mocks::{
    EchoGeminiClient, EchoLlmClient, EmptyGitHubConnector, StaticScraper,
};
use semantica_core::port::id_provider::UuidProvider;
use semantica_core::port::kv_storage::mocks::InMemoryKeyValueStorage;
use semantica_core::port::time_provider::SystemTimeProvider;
use semantica_core::port::MaintenanceConfig;
use semantica_infra_events::InMemoryEventBus;
use semantica_infra_sqlite::{
    create_pool, run_migrations, SqliteDocumentStorage, SqliteJobDefinitionStorage,
    SqliteJobLogStorage, SqliteJobStorage, SqliteMaintenance, SqliteQueueStorage,
};

const VERSION: &str = env!("CARGO_PKG_VERSION");
const DEFAULT_DB_PATH: &str = "~/.semantica/meta.db";
const NUM_WORKERS: usize = 8;

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Initialize logging
    let log_format = std::env::var("SEMANTICA_LOG_FORMAT").unwrap_or_else(|_| "pretty".to_string());

    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("semantica=info"))
        .expect("Failed to create env filter");

    match log_format.as_str() {
        "json" => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().json())
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().pretty())
                .init();
        }
    }

    info!("Semantica Task Engine v{} starting...", VERSION);

    // 2. Load configuration
    let db_path = std::env::var("SEMANTICA_DB_PATH")
        .unwrap_or_else(|_| shellexpand::tilde(DEFAULT_DB_PATH).into_owned());

    let rpc_port: u16 = std::env::var("SEMANTICA_RPC_PORT")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(9527);

    info!(db_path = %db_path, "Initializing database...");

    // 3. Initialize database
    let pool = create_pool(&db_path)
        .await
        .map_err(|e| anyhow::anyhow!("DB pool creation failed: {}", e))?;
    run_migrations(&pool)
        .await
        .map_err(|e| anyhow::anyhow!("Migration failed: {}", e))?;

    // 4. Setup dependencies (DI wiring)
    let time_provider = Arc::new(SystemTimeProvider);
    let id_provider = Arc::new(UuidProvider);

    let job_storage = Arc::new(SqliteJobStorage::new(pool.clone()));
    let queue_storage = Arc::new(SqliteQueueStorage::new(pool.clone()));
    let document_storage = Arc::new(SqliteDocumentStorage::new(pool.clone()));
    let job_log_storage = Arc::new(SqliteJobLogStorage::new(pool.clone()));
    let job_definition_storage = Arc::new(SqliteJobDefinitionStorage::new(pool.clone()));
    let maintenance = Arc::new(SqliteMaintenance::new(pool.clone(), time_provider.clone()));

    let event_bus = Arc::new(InMemoryEventBus::default());

    // Out-of-scope external collaborators (spec §1): the HTML fetcher,
    // the LLM client, the connector libraries, the credential/source
    // stores. Referenced only through their contracts, backed by
    // deterministic mocks — a production deployment swaps these for real
    // adapters without touching the orchestrator or worker pool.
    let kv_storage = Arc::new(InMemoryKeyValueStorage::new());
    let auth_storage = Arc::new(InMemoryAuthStorage(HashMap::new()));
    let source_storage = Arc::new(InMemorySourceStorage(HashMap::new()));
    let scraper = Arc::new(StaticScraper::empty());
    let llm_client = Arc::new(EchoLlmClient);
    let github_connector = Arc::new(EmptyGitHubConnector);
    let gemini_client = Arc::new(EchoGeminiClient);

    // 5. Run crash recovery (spec §4.7, §9: reconcile roots left
    // non-terminal by a crash before a probe could observe them)
    info!("Running crash recovery...");
    let recovery_service = RecoveryService::new(
        job_storage.clone(),
        queue_storage.clone(),
        event_bus.clone(),
        time_provider.clone(),
        id_provider.clone(),
    );
    match recovery_service.recover_stale_roots().await {
        Ok(count) => info!(recovered_jobs = count, "Crash recovery completed"),
        Err(e) => tracing::error!(error = ?e, "Crash recovery failed"),
    }

    // 6. Build the StepManager registry (Orchestrator side) and the
    // JobKind router (Worker side) — spec §4.5/§4.3.
    let step_ctx = StepContext {
        job_storage: job_storage.clone(),
        queue_storage: queue_storage.clone(),
        event_bus: event_bus.clone(),
        document_storage: document_storage.clone(),
        job_log_storage: job_log_storage.clone(),
        job_definition_storage: job_definition_storage.clone(),
        kv_storage: kv_storage.clone(),
        auth_storage,
        source_storage,
        scraper: scraper.clone(),
        llm_client: llm_client.clone(),
        github_connector: github_connector.clone(),
        gemini_client: gemini_client.clone(),
        time_provider: time_provider.clone(),
        id_provider: id_provider.clone(),
    };

    let mut step_registry: StepManagerRegistry = HashMap::new();
    step_registry.insert(step_managers::crawl::ACTION, Arc::new(step_managers::crawl::CrawlStepManager));
    step_registry.insert(
        step_managers::github_repo::ACTION,
        Arc::new(step_managers::github_repo::GitHubRepoStepManager),
    );
    step_registry.insert(
        step_managers::github_actions::ACTION,
        Arc::new(step_managers::github_actions::GitHubActionsStepManager),
    );
    step_registry.insert(step_managers::ai_transform::AI.action, Arc::new(step_managers::ai_transform::AI));
    step_registry.insert(
        step_managers::ai_transform::TRANSFORM.action,
        Arc::new(step_managers::ai_transform::TRANSFORM),
    );
    step_registry.insert(
        step_managers::web_search::ACTION,
        Arc::new(step_managers::web_search::WebSearchStepManager),
    );
    step_registry.insert(
        step_managers::database_maintenance::ACTION,
        Arc::new(step_managers::database_maintenance::DatabaseMaintenanceStepManager),
    );
    step_registry.insert(
        step_managers::reindex::ACTION,
        Arc::new(step_managers::reindex::ReindexStepManager),
    );
    step_registry.insert(step_managers::cleanup::ACTION, Arc::new(step_managers::cleanup::CleanupStepManager));
    step_registry.insert(
        step_managers::validation_steps::PRE_VALIDATION.job_type,
        Arc::new(step_managers::validation_steps::PRE_VALIDATION),
    );
    step_registry.insert(
        step_managers::validation_steps::POST_SUMMARIZATION.job_type,
        Arc::new(step_managers::validation_steps::POST_SUMMARIZATION),
    );

    let orchestrator = Arc::new(Orchestrator::new(
        step_registry,
        job_storage.clone(),
        kv_storage.clone(),
        time_provider.clone(),
    ));

    let (shutdown_tx, shutdown_rx) = shutdown_channel();

    let job_ctx = JobContext {
        job_storage: job_storage.clone(),
        queue_storage: queue_storage.clone(),
        event_bus: event_bus.clone(),
        document_storage: document_storage.clone(),
        job_log_storage: job_log_storage.clone(),
        job_definition_storage: job_definition_storage.clone(),
        kv_storage: kv_storage.clone(),
        scraper,
        llm_client,
        github_connector,
        gemini_client,
        time_provider: time_provider.clone(),
        id_provider: id_provider.clone(),
        shutdown: shutdown_rx.clone(),
    };

    let mut job_kind_router: JobKindRouter = HashMap::new();
    job_kind_router.insert(job_kinds::crawler_url::MESSAGE_TYPE, Arc::new(job_kinds::crawler_url::CrawlerUrl));
    job_kind_router.insert(
        job_kinds::completion_probe::MESSAGE_TYPE,
        Arc::new(job_kinds::completion_probe::CompletionProbe),
    );
    job_kind_router.insert(job_kinds::reindex::MESSAGE_TYPE, Arc::new(job_kinds::reindex::Reindex));
    job_kind_router.insert(job_kinds::summarizer::MESSAGE_TYPE, Arc::new(job_kinds::summarizer::Summarizer));
    job_kind_router.insert(job_kinds::cleanup::MESSAGE_TYPE, Arc::new(job_kinds::cleanup::Cleanup));
    for message_type in [
        job_kinds::generic_operation::MESSAGE_TYPE_AI,
        job_kinds::generic_operation::MESSAGE_TYPE_TRANSFORM,
        job_kinds::generic_operation::MESSAGE_TYPE_GITHUB_REPO_FILE,
        job_kinds::generic_operation::MESSAGE_TYPE_GITHUB_ACTION_LOG,
        job_kinds::generic_operation::MESSAGE_TYPE_DATABASE_MAINTENANCE_OPERATION,
        job_kinds::generic_operation::MESSAGE_TYPE_PRE_VALIDATION,
        job_kinds::generic_operation::MESSAGE_TYPE_POST_SUMMARIZATION,
    ] {
        job_kind_router.insert(message_type, Arc::new(job_kinds::generic_operation::GenericOperation));
    }

    // 7. Start JSON-RPC server (thin admin surface, spec §1/§6)
    info!("Starting JSON-RPC server...");
    let rpc_config = RpcServerConfig {
        port: rpc_port,
        ..Default::default()
    };
    let rpc_server = RpcServer::new(
        rpc_config,
        job_definition_storage.clone(),
        job_storage.clone(),
        orchestrator.clone(),
        step_ctx,
    );
    let rpc_handle = rpc_server
        .start()
        .await
        .map_err(|e| anyhow::anyhow!("RPC server start failed: {}", e))?;

    // 8. Start the worker pool (spec §4.3, §5)
    info!(workers = NUM_WORKERS, "Starting worker pool...");
    let worker_pool = WorkerPool::new(job_kind_router, job_ctx, NUM_WORKERS);
    let pool_shutdown = shutdown_rx.clone();
    let worker_handle = tokio::spawn(async move {
        worker_pool.run(pool_shutdown).await;
    });

    // 9. Start maintenance scheduler (gc + vacuum, spec §4.1 delete_job cascade)
    info!("Starting maintenance scheduler...");
    let maintenance_config = MaintenanceConfig::default();
    let maintenance_scheduler = MaintenanceScheduler::new(maintenance, maintenance_config, 24);
    tokio::spawn(async move {
        maintenance_scheduler.run().await;
    });

    info!("System ready. Waiting for tasks...");
    info!("Press Ctrl+C to shutdown");

    // 10. Wait for shutdown signal
    tokio::signal::ctrl_c().await?;

    info!("Shutdown signal received. Exiting gracefully...");

    shutdown_tx.shutdown();
    rpc_handle
        .stop()
        .map_err(|e| anyhow::anyhow!("RPC server stop failed: {}", e))?;
    let _ = tokio::time::timeout(std::time::Duration::from_secs(5), worker_handle).await;

    info!("Shutdown complete.");

    Ok(())
}
