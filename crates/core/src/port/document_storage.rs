// DocumentStorage port (spec §6). Real, sqlite-backed implementation:
// it's load-bearing for the ai/transform/summarizer StepManagers, which
// enumerate documents via `list` to compute their child set (spec §4.5).

use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub source_id: String,
    pub source_type: String,
    pub title: Option<String>,
    pub content_markdown: String,
    pub detail_level: String,
    pub metadata: serde_json::Value,
    pub created_at: i64,
}

#[derive(Debug, Clone, Default)]
pub struct DocumentFilter {
    pub source_type: Option<String>,
    pub limit: i64,
    pub offset: i64,
}

#[async_trait]
pub trait DocumentStorage: Send + Sync {
    async fn save(&self, doc: &Document) -> Result<()>;
    async fn get(&self, id: &str) -> Result<Document>;
    async fn list(&self, filter: DocumentFilter) -> Result<Vec<Document>>;
    async fn update(&self, doc: &Document) -> Result<()>;
    async fn count(&self) -> Result<i64>;
    async fn rebuild_fts_index(&self) -> Result<()>;
}
