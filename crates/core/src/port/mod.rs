// Port Layer - Interfaces for external dependencies

pub mod auth_storage;
pub mod document_storage;
pub mod event_bus;
pub mod external;
pub mod id_provider;
pub mod job_definition_storage;
pub mod job_log_storage;
pub mod job_storage;
pub mod kv_storage;
pub mod maintenance;
pub mod queue;
pub mod time_provider;

// Re-exports
pub use auth_storage::{AuthStorage, SourceStorage};
pub use document_storage::{Document, DocumentFilter, DocumentStorage};
pub use event_bus::{Event, EventBus};
pub use external::{
    CollaboratorError, GeminiClient, GitHubConnector, LlmClient, RepoFile, ScrapeConfig,
    ScrapeResult, Scraper, WorkflowRun,
};
pub use id_provider::IdProvider;
pub use job_definition_storage::JobDefinitionStorage;
pub use job_log_storage::JobLogStorage;
pub use job_storage::{ChildStats, JobFilter, JobStorage, ProgressDelta, StatusUpdate};
pub use kv_storage::KeyValueStorage;
pub use maintenance::{Maintenance, MaintenanceConfig, MaintenanceStats};
pub use queue::QueueStorage;
pub use time_provider::TimeProvider;
