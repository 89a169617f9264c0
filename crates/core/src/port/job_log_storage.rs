// JobLogStorage port (spec §3, §6).

use crate::domain::JobLogEntry;
use crate::error::Result;
use async_trait::async_trait;

#[async_trait]
pub trait JobLogStorage: Send + Sync {
    async fn append(&self, entry: JobLogEntry) -> Result<()>;
    async fn list_for_root(&self, root_job_id: &str) -> Result<Vec<JobLogEntry>>;
}
