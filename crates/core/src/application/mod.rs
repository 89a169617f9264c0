// Application Layer - Use Cases and Business Logic

pub mod error_formatter;
pub mod error_tolerance;
pub mod job_kinds;
pub mod link_filter;
pub mod maintenance;
pub mod orchestrator;
pub mod recovery;
pub mod step_managers;
pub mod worker;

// Re-exports
pub use maintenance::MaintenanceScheduler;
pub use orchestrator::Orchestrator;
pub use recovery::RecoveryService;
pub use worker::{shutdown_channel, ShutdownSender, ShutdownToken, WorkerPool};
