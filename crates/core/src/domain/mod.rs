// Domain Layer - Pure business logic and entities

pub mod error;
pub mod job;
pub mod job_definition;
pub mod log_entry;
pub mod queue;
pub mod seen_url;

// Re-exports
pub use error::DomainError;
pub use job::{Job, JobId, JobPhase, JobStatus, Progress};
pub use job_definition::{ErrorTolerance, FailureAction, JobDefinition, JobDefinitionId, JobStep};
pub use log_entry::{JobLogEntry, LogLevel};
pub use queue::{AckToken, JobMessage, MessageId, QueueMessage, QueueStats, ReceivedMessage};
pub use seen_url::JobSeenUrl;

/// Re-exported for callers that otherwise only touch domain types — `Event`
/// itself lives in the port layer (it's the EventBus's wire contract).
pub use crate::port::event_bus::Event;
