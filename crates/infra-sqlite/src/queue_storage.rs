// SQLite QueueStorage Implementation (spec §4.2): durable, at-least-once
// delivery via a visibility-timeout lease held in the same table rather
// than a separate claims table (grounded on the teacher's
// `pop_next`/`UPDATE ... RETURNING` atomic-claim idiom).

use async_trait::async_trait;
use semantica_core::domain::{AckToken, JobMessage, QueueMessage, QueueStats, ReceivedMessage};
use semantica_core::error::{AppError, Result};
use semantica_core::port::QueueStorage;
use sqlx::SqlitePool;
use std::time::Duration;

fn map_sqlx_error(err: sqlx::Error) -> AppError {
    match err {
        sqlx::Error::RowNotFound => AppError::NotFound("queue message not found".to_string()),
        other => AppError::Database(other.to_string()),
    }
}

pub struct SqliteQueueStorage {
    pool: SqlitePool,
}

impl SqliteQueueStorage {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct QueueRow {
    id: String,
    job_id: String,
    message_type: String,
    payload: String,
    visible_at: i64,
    delivery_count: i64,
}

impl QueueRow {
    fn into_message(self) -> Result<QueueMessage> {
        let payload: JobMessage =
            serde_json::from_str(&self.payload).map_err(AppError::Serialization)?;
        Ok(QueueMessage {
            id: self.id,
            job_id: self.job_id,
            message_type: self.message_type,
            payload,
            visible_at: self.visible_at,
            delivery_count: self.delivery_count,
        })
    }
}

#[async_trait]
impl QueueStorage for SqliteQueueStorage {
    async fn enqueue(&self, msg: JobMessage) -> Result<()> {
        let now = chrono::Utc::now().timestamp_millis();
        self.insert_message(msg, now).await
    }

    async fn enqueue_with_delay(&self, msg: JobMessage, delay: Duration) -> Result<()> {
        let visible_at = chrono::Utc::now().timestamp_millis() + delay.as_millis() as i64;
        self.insert_message(msg, visible_at).await
    }

    async fn receive(&self, visibility_timeout: Duration) -> Result<Option<ReceivedMessage>> {
        let now = chrono::Utc::now().timestamp_millis();
        let leased_until = now + visibility_timeout.as_millis() as i64;
        let ack_token = uuid::Uuid::new_v4().to_string();

        let row = sqlx::query_as::<_, QueueRow>(
            r#"
            UPDATE queue_messages
            SET leased_until = ?, ack_token = ?, delivery_count = delivery_count + 1
            WHERE id = (
                SELECT id FROM queue_messages
                WHERE visible_at <= ? AND (leased_until IS NULL OR leased_until <= ?)
                ORDER BY visible_at ASC
                LIMIT 1
            )
            RETURNING id, job_id, message_type, payload, visible_at, delivery_count
            "#,
        )
        .bind(leased_until)
        .bind(&ack_token)
        .bind(now)
        .bind(now)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        let Some(row) = row else { return Ok(None) };
        let message = row.into_message()?;
        Ok(Some(ReceivedMessage { message, ack_token }))
    }

    async fn ack(&self, token: &AckToken) -> Result<()> {
        sqlx::query("DELETE FROM queue_messages WHERE ack_token = ?")
            .bind(token)
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_error)?;
        Ok(())
    }

    async fn extend(&self, token: &AckToken, d: Duration) -> Result<()> {
        let leased_until = chrono::Utc::now().timestamp_millis() + d.as_millis() as i64;
        sqlx::query("UPDATE queue_messages SET leased_until = ? WHERE ack_token = ?")
            .bind(leased_until)
            .bind(token)
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_error)?;
        Ok(())
    }

    async fn stats(&self) -> Result<QueueStats> {
        let now = chrono::Utc::now().timestamp_millis();

        let queued: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM queue_messages \
             WHERE visible_at <= ? AND (leased_until IS NULL OR leased_until <= ?)",
        )
        .bind(now)
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        let in_flight: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM queue_messages WHERE leased_until IS NOT NULL AND leased_until > ?",
        )
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        let delayed: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM queue_messages WHERE visible_at > ?")
            .bind(now)
            .fetch_one(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        let dead_lettered: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM dead_letter_messages")
            .fetch_one(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        Ok(QueueStats {
            queued,
            in_flight,
            delayed,
            dead_lettered,
        })
    }

    async fn dead_letter(&self, token: &AckToken, reason: &str) -> Result<QueueMessage> {
        let mut tx = self.pool.begin().await.map_err(map_sqlx_error)?;

        let row = sqlx::query_as::<_, QueueRow>(
            "SELECT id, job_id, message_type, payload, visible_at, delivery_count \
             FROM queue_messages WHERE ack_token = ?",
        )
        .bind(token)
        .fetch_optional(&mut *tx)
        .await
        .map_err(map_sqlx_error)?
        .ok_or_else(|| AppError::NotFound("leased message not found for ack token".to_string()))?;

        let now = chrono::Utc::now().timestamp_millis();
        sqlx::query(
            "INSERT INTO dead_letter_messages \
             (id, job_id, message_type, payload, delivery_count, reason, dead_lettered_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&row.id)
        .bind(&row.job_id)
        .bind(&row.message_type)
        .bind(&row.payload)
        .bind(row.delivery_count)
        .bind(reason)
        .bind(now)
        .execute(&mut *tx)
        .await
        .map_err(map_sqlx_error)?;

        sqlx::query("DELETE FROM queue_messages WHERE ack_token = ?")
            .bind(token)
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx_error)?;

        tx.commit().await.map_err(map_sqlx_error)?;

        row.into_message()
    }
}

impl SqliteQueueStorage {
    async fn insert_message(&self, msg: JobMessage, visible_at: i64) -> Result<()> {
        let now = chrono::Utc::now().timestamp_millis();
        let payload = serde_json::to_string(&msg).map_err(AppError::Serialization)?;

        sqlx::query(
            "INSERT INTO queue_messages (id, job_id, message_type, payload, visible_at, delivery_count, created_at) \
             VALUES (?, ?, ?, ?, ?, 0, ?)",
        )
        .bind(&msg.id)
        .bind(&msg.id)
        .bind(&msg.message_type)
        .bind(payload)
        .bind(visible_at)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{create_pool, run_migrations};

    async fn setup() -> SqlitePool {
        let pool = create_pool("sqlite::memory:").await.unwrap();
        run_migrations(&pool).await.unwrap();
        pool
    }

    #[tokio::test]
    async fn enqueue_then_receive_round_trips() {
        let pool = setup().await;
        let storage = SqliteQueueStorage::new(pool);

        let msg = JobMessage::new("job-1", "crawler_url");
        storage.enqueue(msg).await.unwrap();

        let received = storage.receive(Duration::from_secs(30)).await.unwrap().unwrap();
        assert_eq!(received.message.job_id, "job-1");
        assert_eq!(received.message.delivery_count, 1);
    }

    #[tokio::test]
    async fn receive_skips_messages_not_yet_visible() {
        let pool = setup().await;
        let storage = SqliteQueueStorage::new(pool);

        let msg = JobMessage::new("job-1", "crawler_url");
        storage.enqueue_with_delay(msg, Duration::from_secs(3600)).await.unwrap();

        let received = storage.receive(Duration::from_secs(30)).await.unwrap();
        assert!(received.is_none());
    }

    #[tokio::test]
    async fn ack_removes_the_message() {
        let pool = setup().await;
        let storage = SqliteQueueStorage::new(pool);

        storage.enqueue(JobMessage::new("job-1", "crawler_url")).await.unwrap();
        let received = storage.receive(Duration::from_secs(30)).await.unwrap().unwrap();
        storage.ack(&received.ack_token).await.unwrap();

        let stats = storage.stats().await.unwrap();
        assert_eq!(stats.queued, 0);
        assert_eq!(stats.in_flight, 0);
    }

    #[tokio::test]
    async fn expired_lease_is_redelivered() {
        let pool = setup().await;
        let storage = SqliteQueueStorage::new(pool);

        storage.enqueue(JobMessage::new("job-1", "crawler_url")).await.unwrap();
        let first = storage.receive(Duration::from_millis(0)).await.unwrap().unwrap();

        let second = storage.receive(Duration::from_secs(30)).await.unwrap().unwrap();
        assert_eq!(second.message.delivery_count, 2);
        assert_ne!(first.ack_token, second.ack_token);
    }

    #[tokio::test]
    async fn dead_letter_moves_message_out_of_the_queue() {
        let pool = setup().await;
        let storage = SqliteQueueStorage::new(pool);

        storage.enqueue(JobMessage::new("job-1", "crawler_url")).await.unwrap();
        let received = storage.receive(Duration::from_secs(30)).await.unwrap().unwrap();

        let dead = storage.dead_letter(&received.ack_token, "exceeded max_deliveries").await.unwrap();
        assert_eq!(dead.job_id, "job-1");

        let stats = storage.stats().await.unwrap();
        assert_eq!(stats.dead_lettered, 1);
        assert_eq!(stats.queued, 0);
        assert_eq!(stats.in_flight, 0);
    }
}
