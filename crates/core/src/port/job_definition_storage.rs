// JobDefinitionStorage port (spec §6) — real sqlite-backed implementation
// since the Orchestrator loads definitions through it on every run.

use crate::domain::JobDefinition;
use crate::error::Result;
use async_trait::async_trait;

#[async_trait]
pub trait JobDefinitionStorage: Send + Sync {
    async fn save(&self, definition: &JobDefinition) -> Result<()>;
    async fn get(&self, id: &str) -> Result<JobDefinition>;
    async fn list(&self) -> Result<Vec<JobDefinition>>;
}
