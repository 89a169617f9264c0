// In-memory EventBus (spec §6) — the production `EventBus` port
// implementation. The WebSocket transport that would relay these events to
// external subscribers is out of scope (spec §1); this crate only satisfies
// the publish contract via a broadcast channel, which is what a WS relay
// would subscribe to if one existed.

use async_trait::async_trait;
use semantica_core::port::{Event, EventBus};
use tokio::sync::broadcast;

/// Bounded broadcast channel backing the EventBus port. A lagging or absent
/// subscriber NEVER blocks or fails a publisher (spec §1, §6) — excess
/// events are simply dropped for subscribers that fall behind the
/// channel's capacity, which is the same trade-off `tokio::broadcast`
/// already makes.
pub struct InMemoryEventBus {
    sender: broadcast::Sender<Event>,
}

impl InMemoryEventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Subscribes a fresh receiver. Intended for an eventual WS relay or
    /// for tests that want to observe published events without the
    /// `RecordingEventBus` mock.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.sender.subscribe()
    }
}

impl Default for InMemoryEventBus {
    fn default() -> Self {
        Self::new(1024)
    }
}

#[async_trait]
impl EventBus for InMemoryEventBus {
    async fn publish(&self, event: Event) {
        // `send` only errs when there are zero receivers, which is a
        // perfectly normal state (no WS relay attached) — not a failure.
        if self.sender.send(event).is_err() {
            tracing::trace!("event published with no active subscribers");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn publish_is_fire_and_forget_with_no_subscribers() {
        let bus = InMemoryEventBus::default();
        bus.publish(Event::JobError {
            job_id: "job-1".to_string(),
            parent_job_id: None,
            error_message: "boom".to_string(),
            timestamp: 0,
        })
        .await;
    }

    #[tokio::test]
    async fn subscriber_receives_published_events() {
        let bus = InMemoryEventBus::default();
        let mut rx = bus.subscribe();

        bus.publish(Event::JobSpawn {
            parent_job_id: "root-1".to_string(),
            child_job_id: "child-1".to_string(),
            job_type: "crawler_url".to_string(),
            url: Some("http://example.com".to_string()),
            depth: Some(1),
            timestamp: 0,
        })
        .await;

        let received = rx.recv().await.unwrap();
        match received {
            Event::JobSpawn { child_job_id, .. } => assert_eq!(child_job_id, "child-1"),
            other => panic!("unexpected event: {other:?}"),
        }
    }
}
