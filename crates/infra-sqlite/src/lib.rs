// Semantica Infrastructure - SQLite Adapter
// Implements every storage port from semantica-core: JobStorage, QueueStorage,
// JobLogStorage, JobDefinitionStorage, DocumentStorage, Maintenance.

mod connection;
mod document_storage;
mod job_definition_storage;
mod job_log_storage;
mod job_storage;
mod maintenance_impl;
mod migration;
mod queue_storage;

pub use connection::create_pool;
pub use document_storage::SqliteDocumentStorage;
pub use job_definition_storage::SqliteJobDefinitionStorage;
pub use job_log_storage::SqliteJobLogStorage;
pub use job_storage::SqliteJobStorage;
pub use maintenance_impl::SqliteMaintenance;
pub use migration::run_migrations;
pub use queue_storage::SqliteQueueStorage;

// Note: sqlx::Error conversion is handled by wrapping in helper functions
// due to Rust's orphan rules (cannot implement From<sqlx::Error> for AppError here)
