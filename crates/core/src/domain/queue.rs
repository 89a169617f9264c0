// Queue Domain Model (spec §3, §4.2)

use serde::{Deserialize, Serialize};

pub type MessageId = String;
pub type AckToken = String;

/// The canonical job message payload (spec §6): `{id, type, url?, depth?,
/// parent_id (root), job_definition_id?, config}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobMessage {
    pub id: String,
    #[serde(rename = "type")]
    pub message_type: String,
    pub url: Option<String>,
    pub depth: Option<u32>,
    /// Root job id (flat hierarchy — never an intermediate ancestor).
    pub parent_id: Option<String>,
    pub job_definition_id: Option<String>,
    pub config: serde_json::Value,
}

impl JobMessage {
    pub fn new(id: impl Into<String>, message_type: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            message_type: message_type.into(),
            url: None,
            depth: None,
            parent_id: None,
            job_definition_id: None,
            config: serde_json::json!({}),
        }
    }
}

/// A queue record as persisted by the Queue Layer.
#[derive(Debug, Clone)]
pub struct QueueMessage {
    pub id: MessageId,
    pub job_id: String,
    pub message_type: String,
    pub payload: JobMessage,
    pub visible_at: i64,
    pub delivery_count: i64,
}

/// Returned by `QueueStorage::receive`: a leased message plus the token
/// required to ack/extend/nack it.
#[derive(Debug, Clone)]
pub struct ReceivedMessage {
    pub message: QueueMessage,
    pub ack_token: AckToken,
}

#[derive(Debug, Clone, Default)]
pub struct QueueStats {
    pub queued: i64,
    pub in_flight: i64,
    pub delayed: i64,
    pub dead_lettered: i64,
}
