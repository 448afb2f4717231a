//! PostgreSQL implementation of WebhookEventLedger.
//!
//! Claims are a single upsert keyed on `event_id`. The conflict branch only
//! updates a FAILED or stale RECEIVED row, so of several concurrent claims
//! exactly one sees an affected row.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::domain::foundation::{DomainError, ErrorCode, Timestamp};
use crate::ports::{SaveResult, WebhookEventLedger, WebhookEventRecord, WebhookEventStatus};

use super::payment_reader::{corrupt, db_error};

/// PostgreSQL implementation of the WebhookEventLedger port.
pub struct PostgresWebhookEventLedger {
    pool: PgPool,
    stale_claim_secs: u64,
}

impl PostgresWebhookEventLedger {
    pub fn new(pool: PgPool, stale_claim_secs: u64) -> Self {
        Self {
            pool,
            stale_claim_secs,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct WebhookEventRow {
    event_id: String,
    event_type: String,
    status: String,
    received_at: DateTime<Utc>,
    processed_at: Option<DateTime<Utc>>,
    error_message: Option<String>,
    attempts: i32,
    payload: serde_json::Value,
}

impl TryFrom<WebhookEventRow> for WebhookEventRecord {
    type Error = DomainError;

    fn try_from(row: WebhookEventRow) -> Result<Self, Self::Error> {
        Ok(WebhookEventRecord {
            event_id: row.event_id,
            event_type: row.event_type,
            status: row.status.parse::<WebhookEventStatus>().map_err(corrupt)?,
            received_at: Timestamp::from_datetime(row.received_at),
            processed_at: row.processed_at.map(Timestamp::from_datetime),
            error_message: row.error_message,
            attempts: u32::try_from(row.attempts).map_err(corrupt)?,
            payload: row.payload,
        })
    }
}

fn not_found(event_id: &str) -> DomainError {
    DomainError::new(
        ErrorCode::WebhookEventNotFound,
        format!("webhook event {} was never received", event_id),
    )
    .with_detail("id", event_id)
}

const PRUNE_SQL: &str = r#"
    DELETE FROM webhook_events
    WHERE received_at < $1 AND status IN ('processed', 'failed')
"#;

#[async_trait]
impl WebhookEventLedger for PostgresWebhookEventLedger {
    async fn exists_processed(&self, event_id: &str) -> Result<bool, DomainError> {
        let processed: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM webhook_events WHERE event_id = $1 AND status = 'processed'
            )
            "#,
        )
        .bind(event_id)
        .fetch_one(&self.pool)
        .await
        .map_err(db_error("Failed to check webhook event"))?;

        Ok(processed)
    }

    async fn insert_received(
        &self,
        record: WebhookEventRecord,
    ) -> Result<SaveResult, DomainError> {
        let stale_before = Timestamp::now().minus_secs(self.stale_claim_secs);

        let result = sqlx::query(
            r#"
            INSERT INTO webhook_events (
                event_id, event_type, status, received_at, attempts, payload
            ) VALUES ($1, $2, 'received', $3, 1, $4)
            ON CONFLICT (event_id) DO UPDATE SET
                status = 'received',
                received_at = EXCLUDED.received_at,
                attempts = webhook_events.attempts + 1,
                payload = EXCLUDED.payload
            WHERE webhook_events.status = 'failed'
               OR (webhook_events.status = 'received' AND webhook_events.received_at < $5)
            "#,
        )
        .bind(&record.event_id)
        .bind(&record.event_type)
        .bind(*record.received_at.as_datetime())
        .bind(&record.payload)
        .bind(*stale_before.as_datetime())
        .execute(&self.pool)
        .await
        .map_err(db_error("Failed to claim webhook event"))?;

        if result.rows_affected() == 0 {
            Ok(SaveResult::AlreadyExists)
        } else {
            Ok(SaveResult::Inserted)
        }
    }

    async fn mark_processed(&self, event_id: &str) -> Result<(), DomainError> {
        let result = sqlx::query(
            r#"
            UPDATE webhook_events
            SET status = 'processed', processed_at = $2, error_message = NULL
            WHERE event_id = $1
            "#,
        )
        .bind(event_id)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(db_error("Failed to mark webhook event processed"))?;

        if result.rows_affected() == 0 {
            return Err(not_found(event_id));
        }
        Ok(())
    }

    async fn mark_failed(&self, event_id: &str, error: &str) -> Result<(), DomainError> {
        let result = sqlx::query(
            r#"
            UPDATE webhook_events
            SET status = 'failed', error_message = $2
            WHERE event_id = $1
            "#,
        )
        .bind(event_id)
        .bind(error)
        .execute(&self.pool)
        .await
        .map_err(db_error("Failed to mark webhook event failed"))?;

        if result.rows_affected() == 0 {
            return Err(not_found(event_id));
        }
        Ok(())
    }

    async fn find_by_event_id(
        &self,
        event_id: &str,
    ) -> Result<Option<WebhookEventRecord>, DomainError> {
        let row: Option<WebhookEventRow> = sqlx::query_as(
            r#"
            SELECT event_id, event_type, status, received_at, processed_at,
                   error_message, attempts, payload
            FROM webhook_events
            WHERE event_id = $1
            "#,
        )
        .bind(event_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error("Failed to find webhook event"))?;

        row.map(WebhookEventRecord::try_from).transpose()
    }

    async fn delete_before(&self, timestamp: Timestamp) -> Result<u64, DomainError> {
        let result = sqlx::query(PRUNE_SQL)
            .bind(*timestamp.as_datetime())
            .execute(&self.pool)
            .await
            .map_err(db_error("Failed to prune webhook events"))?;

        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(status: &str) -> WebhookEventRow {
        WebhookEventRow {
            event_id: "evt_1".to_string(),
            event_type: "PAYMENT_FAILED".to_string(),
            status: status.to_string(),
            received_at: Utc::now(),
            processed_at: None,
            error_message: Some("card declined".to_string()),
            attempts: 2,
            payload: serde_json::json!({ "amount": "9.99" }),
        }
    }

    #[test]
    fn row_maps_to_record() {
        let record = WebhookEventRecord::try_from(row("failed")).unwrap();

        assert_eq!(record.status, WebhookEventStatus::Failed);
        assert_eq!(record.attempts, 2);
        assert_eq!(record.error_message.as_deref(), Some("card declined"));
        assert_eq!(record.payload["amount"], "9.99");
    }

    #[test]
    fn unknown_status_is_a_database_error() {
        let err = WebhookEventRecord::try_from(row("retrying")).unwrap_err();
        assert_eq!(err.code, ErrorCode::DatabaseError);
    }

    #[test]
    fn pruning_skips_received_rows() {
        assert!(PRUNE_SQL.contains("status IN ('processed', 'failed')"));
        assert!(!PRUNE_SQL.contains("'received'"));
    }
}
