// EventBus port (spec §6) — produced events.
//
// The WebSocket transport is out of scope; only the publish contract is
// implemented (see infra-events::InMemoryEventBus).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum Event {
    JobStarted {
        job_id: String,
        status: String,
        source_type: Option<String>,
        entity_type: Option<String>,
        timestamp: i64,
        url: Option<String>,
        depth: Option<u32>,
    },
    JobSpawn {
        parent_job_id: String,
        child_job_id: String,
        job_type: String,
        url: Option<String>,
        depth: Option<u32>,
        timestamp: i64,
    },
    JobCompleted {
        job_id: String,
        status: String,
        result_count: i64,
        failed_count: i64,
        total_urls: i64,
        duration_seconds: i64,
        progress_text: String,
        errors: Vec<String>,
        warnings: Vec<String>,
        running_children: i64,
        timestamp: i64,
    },
    JobFailed {
        job_id: String,
        status: String,
        error: String,
        timestamp: i64,
        result_count: i64,
        failed_count: i64,
        total_urls: i64,
        progress_text: String,
        errors: Vec<String>,
        warnings: Vec<String>,
        running_children: i64,
    },
    JobError {
        job_id: String,
        parent_job_id: Option<String>,
        error_message: String,
        timestamp: i64,
    },
    DocumentSaved {
        job_id: String,
        parent_job_id: Option<String>,
        document_id: String,
        timestamp: i64,
    },
}

/// Narrow publish contract. Implementations MUST NOT fail the caller on a
/// slow/absent subscriber — publishing is best-effort observability, never
/// load-bearing for job state (spec §1, §6).
#[async_trait]
pub trait EventBus: Send + Sync {
    async fn publish(&self, event: Event);
}

pub mod mocks {
    use super::*;
    use std::sync::Mutex;

    /// Records every published event for assertions in tests.
    #[derive(Default)]
    pub struct RecordingEventBus {
        events: Mutex<Vec<Event>>,
    }

    impl RecordingEventBus {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn events(&self) -> Vec<Event> {
            self.events.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl EventBus for RecordingEventBus {
        async fn publish(&self, event: Event) {
            self.events.lock().unwrap().push(event);
        }
    }
}
