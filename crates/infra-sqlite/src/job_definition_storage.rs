// SQLite JobDefinitionStorage Implementation (spec §6) — the Orchestrator
// and every hot-path tolerance check load definitions through this.

use async_trait::async_trait;
use semantica_core::domain::{ErrorTolerance, JobDefinition, JobStep};
use semantica_core::error::{AppError, Result};
use semantica_core::port::JobDefinitionStorage;
use sqlx::SqlitePool;

fn map_sqlx_error(err: sqlx::Error) -> AppError {
    match err {
        sqlx::Error::RowNotFound => AppError::NotFound("job definition not found".to_string()),
        other => AppError::Database(other.to_string()),
    }
}

pub struct SqliteJobDefinitionStorage {
    pool: SqlitePool,
}

impl SqliteJobDefinitionStorage {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct JobDefinitionRow {
    id: String,
    steps: String,
    source_type: Option<String>,
    entity_type: Option<String>,
    tags: String,
    error_tolerance: Option<String>,
}

impl JobDefinitionRow {
    fn into_definition(self) -> Result<JobDefinition> {
        let steps: Vec<JobStep> = serde_json::from_str(&self.steps).map_err(AppError::Serialization)?;
        let error_tolerance: Option<ErrorTolerance> = match self.error_tolerance {
            Some(raw) => Some(serde_json::from_str(&raw).map_err(AppError::Serialization)?),
            None => None,
        };
        Ok(JobDefinition {
            id: self.id,
            steps,
            source_type: self.source_type,
            entity_type: self.entity_type,
            tags: serde_json::from_str(&self.tags).unwrap_or_default(),
            error_tolerance,
        })
    }
}

#[async_trait]
impl JobDefinitionStorage for SqliteJobDefinitionStorage {
    async fn save(&self, definition: &JobDefinition) -> Result<()> {
        let steps = serde_json::to_string(&definition.steps).map_err(AppError::Serialization)?;
        let tags = serde_json::to_string(&definition.tags).unwrap_or_else(|_| "[]".to_string());
        let error_tolerance = match &definition.error_tolerance {
            Some(t) => Some(serde_json::to_string(t).map_err(AppError::Serialization)?),
            None => None,
        };

        sqlx::query(
            r#"
            INSERT INTO job_definitions (id, steps, source_type, entity_type, tags, error_tolerance)
            VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                steps = excluded.steps,
                source_type = excluded.source_type,
                entity_type = excluded.entity_type,
                tags = excluded.tags,
                error_tolerance = excluded.error_tolerance
            "#,
        )
        .bind(&definition.id)
        .bind(steps)
        .bind(&definition.source_type)
        .bind(&definition.entity_type)
        .bind(tags)
        .bind(error_tolerance)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(())
    }

    async fn get(&self, id: &str) -> Result<JobDefinition> {
        let row = sqlx::query_as::<_, JobDefinitionRow>("SELECT * FROM job_definitions WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx_error)?
            .ok_or_else(|| AppError::NotFound(format!("job definition {id} not found")))?;

        row.into_definition()
    }

    async fn list(&self) -> Result<Vec<JobDefinition>> {
        let rows: Vec<JobDefinitionRow> =
            sqlx::query_as("SELECT * FROM job_definitions ORDER BY id ASC")
                .fetch_all(&self.pool)
                .await
                .map_err(map_sqlx_error)?;

        rows.into_iter().map(JobDefinitionRow::into_definition).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{create_pool, run_migrations};
    use semantica_core::domain::FailureAction;

    async fn setup() -> SqlitePool {
        let pool = create_pool("sqlite::memory:").await.unwrap();
        run_migrations(&pool).await.unwrap();
        pool
    }

    #[tokio::test]
    async fn save_and_get_round_trips() {
        let pool = setup().await;
        let storage = SqliteJobDefinitionStorage::new(pool);

        let definition = JobDefinition {
            id: "def-1".to_string(),
            steps: vec![JobStep {
                name: "crawl".to_string(),
                action: "crawl".to_string(),
                config: Default::default(),
            }],
            source_type: Some("web".to_string()),
            entity_type: None,
            tags: vec!["news".to_string()],
            error_tolerance: Some(ErrorTolerance {
                max_child_failures: 3,
                failure_action: FailureAction::StopAll,
            }),
        };

        storage.save(&definition).await.unwrap();
        let fetched = storage.get("def-1").await.unwrap();
        assert_eq!(fetched.steps.len(), 1);
        assert_eq!(
            fetched.error_tolerance.unwrap().max_child_failures,
            3
        );
    }

    #[tokio::test]
    async fn get_missing_definition_is_not_found() {
        let pool = setup().await;
        let storage = SqliteJobDefinitionStorage::new(pool);
        assert!(matches!(storage.get("nope").await, Err(AppError::NotFound(_))));
    }
}
