// SQLite DocumentStorage Implementation (spec §6). Load-bearing for the
// ai/transform/summarizer StepManagers, which enumerate documents via
// `list` to compute their child set.

use async_trait::async_trait;
use semantica_core::error::{AppError, Result};
use semantica_core::port::{Document, DocumentFilter, DocumentStorage};
use sqlx::{QueryBuilder, Sqlite, SqlitePool};

fn map_sqlx_error(err: sqlx::Error) -> AppError {
    match err {
        sqlx::Error::RowNotFound => AppError::NotFound("document not found".to_string()),
        other => AppError::Database(other.to_string()),
    }
}

pub struct SqliteDocumentStorage {
    pool: SqlitePool,
}

impl SqliteDocumentStorage {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct DocumentRow {
    id: String,
    source_id: String,
    source_type: String,
    title: Option<String>,
    content_markdown: String,
    detail_level: String,
    metadata: String,
    created_at: i64,
}

impl DocumentRow {
    fn into_document(self) -> Document {
        Document {
            id: self.id,
            source_id: self.source_id,
            source_type: self.source_type,
            title: self.title,
            content_markdown: self.content_markdown,
            detail_level: self.detail_level,
            metadata: serde_json::from_str(&self.metadata).unwrap_or(serde_json::json!({})),
            created_at: self.created_at,
        }
    }
}

#[async_trait]
impl DocumentStorage for SqliteDocumentStorage {
    async fn save(&self, doc: &Document) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO documents (id, source_id, source_type, title, content_markdown, detail_level, metadata, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                source_id = excluded.source_id,
                source_type = excluded.source_type,
                title = excluded.title,
                content_markdown = excluded.content_markdown,
                detail_level = excluded.detail_level,
                metadata = excluded.metadata
            "#,
        )
        .bind(&doc.id)
        .bind(&doc.source_id)
        .bind(&doc.source_type)
        .bind(&doc.title)
        .bind(&doc.content_markdown)
        .bind(&doc.detail_level)
        .bind(doc.metadata.to_string())
        .bind(doc.created_at)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Document> {
        let row = sqlx::query_as::<_, DocumentRow>("SELECT * FROM documents WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx_error)?
            .ok_or_else(|| AppError::NotFound(format!("document {id} not found")))?;

        Ok(row.into_document())
    }

    async fn list(&self, filter: DocumentFilter) -> Result<Vec<Document>> {
        let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new("SELECT * FROM documents WHERE 1 = 1");

        if let Some(source_type) = &filter.source_type {
            qb.push(" AND source_type = ").push_bind(source_type.clone());
        }

        qb.push(" ORDER BY created_at DESC");

        let limit = if filter.limit > 0 { filter.limit } else { 100 };
        qb.push(" LIMIT ").push_bind(limit);
        if filter.offset > 0 {
            qb.push(" OFFSET ").push_bind(filter.offset);
        }

        let rows: Vec<DocumentRow> = qb
            .build_query_as()
            .fetch_all(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        Ok(rows.into_iter().map(DocumentRow::into_document).collect())
    }

    async fn update(&self, doc: &Document) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE documents
            SET source_id = ?, source_type = ?, title = ?, content_markdown = ?,
                detail_level = ?, metadata = ?
            WHERE id = ?
            "#,
        )
        .bind(&doc.source_id)
        .bind(&doc.source_type)
        .bind(&doc.title)
        .bind(&doc.content_markdown)
        .bind(&doc.detail_level)
        .bind(doc.metadata.to_string())
        .bind(&doc.id)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("document {} not found", doc.id)));
        }
        Ok(())
    }

    async fn count(&self) -> Result<i64> {
        sqlx::query_scalar("SELECT COUNT(*) FROM documents")
            .fetch_one(&self.pool)
            .await
            .map_err(map_sqlx_error)
    }

    async fn rebuild_fts_index(&self) -> Result<()> {
        let mut tx = self.pool.begin().await.map_err(map_sqlx_error)?;

        sqlx::query("DELETE FROM documents_fts")
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx_error)?;

        sqlx::query(
            "INSERT INTO documents_fts (id, title, content_markdown) \
             SELECT id, title, content_markdown FROM documents",
        )
        .execute(&mut *tx)
        .await
        .map_err(map_sqlx_error)?;

        tx.commit().await.map_err(map_sqlx_error)?;
        Ok(())
    }
}
