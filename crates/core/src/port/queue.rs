// Queue Layer port (spec §4.2)

use crate::domain::{AckToken, JobMessage, QueueMessage, QueueStats, ReceivedMessage};
use crate::error::Result;
use async_trait::async_trait;
use std::time::Duration;

#[async_trait]
pub trait QueueStorage: Send + Sync {
    /// Persists the message, visible immediately.
    async fn enqueue(&self, msg: JobMessage) -> Result<()>;

    /// Persists the message, visible at `now + delay`. Used for completion
    /// probes — this replaces in-process timers entirely (spec §5, §9).
    async fn enqueue_with_delay(&self, msg: JobMessage, delay: Duration) -> Result<()>;

    /// Atomically leases one visible message for `visibility_timeout`,
    /// incrementing `delivery_count`. Returns `None` if nothing is visible.
    async fn receive(&self, visibility_timeout: Duration) -> Result<Option<ReceivedMessage>>;

    /// Permanent delete (message processed successfully).
    async fn ack(&self, token: &AckToken) -> Result<()>;

    /// Extends the current lease by `d`.
    async fn extend(&self, token: &AckToken, d: Duration) -> Result<()>;

    async fn stats(&self) -> Result<QueueStats>;

    /// Permanently removes the leased message from the queue and records it
    /// in the dead-letter store (spec §4.2: `delivery_count` exceeded a
    /// configured `max_deliveries`). Returns the message so the caller
    /// (the Worker Pool) can mark the corresponding Job `failed` — the
    /// queue layer has no `JobStorage` handle of its own (spec §9: ports
    /// stay narrow, dependencies passed explicitly by the caller).
    async fn dead_letter(&self, token: &AckToken, reason: &str) -> Result<QueueMessage>;
}
