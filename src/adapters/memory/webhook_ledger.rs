//! In-memory webhook event ledger.

use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

use crate::domain::foundation::{DomainError, ErrorCode, Timestamp};
use crate::ports::{SaveResult, WebhookEventLedger, WebhookEventRecord, WebhookEventStatus};

/// Default age after which a RECEIVED claim is considered abandoned.
pub const DEFAULT_STALE_CLAIM_SECS: u64 = 300;

/// Ledger records keyed by event id.
///
/// Claims happen under a single write lock, so concurrent deliveries of one
/// event observe exactly one `Inserted`.
#[derive(Debug)]
pub struct InMemoryWebhookEventLedger {
    records: RwLock<HashMap<String, WebhookEventRecord>>,
    stale_claim_secs: u64,
}

impl InMemoryWebhookEventLedger {
    pub fn new() -> Self {
        Self::with_stale_claim_secs(DEFAULT_STALE_CLAIM_SECS)
    }

    pub fn with_stale_claim_secs(stale_claim_secs: u64) -> Self {
        Self {
            records: RwLock::new(HashMap::new()),
            stale_claim_secs,
        }
    }

    /// Number of tracked events.
    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

impl Default for InMemoryWebhookEventLedger {
    fn default() -> Self {
        Self::new()
    }
}

fn not_found(event_id: &str) -> DomainError {
    DomainError::new(
        ErrorCode::WebhookEventNotFound,
        format!("webhook event {} was never received", event_id),
    )
    .with_detail("id", event_id)
}

#[async_trait]
impl WebhookEventLedger for InMemoryWebhookEventLedger {
    async fn exists_processed(&self, event_id: &str) -> Result<bool, DomainError> {
        let records = self.records.read().await;
        Ok(records.get(event_id).is_some_and(WebhookEventRecord::is_processed))
    }

    async fn insert_received(
        &self,
        record: WebhookEventRecord,
    ) -> Result<SaveResult, DomainError> {
        let mut records = self.records.write().await;
        let stale_before = Timestamp::now().minus_secs(self.stale_claim_secs);

        match records.get_mut(&record.event_id) {
            None => {
                records.insert(record.event_id.clone(), record);
                Ok(SaveResult::Inserted)
            }
            Some(existing) if existing.is_reclaimable(&stale_before) => {
                existing.status = WebhookEventStatus::Received;
                existing.received_at = record.received_at;
                existing.attempts = existing.attempts.saturating_add(1);
                existing.payload = record.payload;
                Ok(SaveResult::Inserted)
            }
            Some(_) => Ok(SaveResult::AlreadyExists),
        }
    }

    async fn mark_processed(&self, event_id: &str) -> Result<(), DomainError> {
        let mut records = self.records.write().await;
        let record = records.get_mut(event_id).ok_or_else(|| not_found(event_id))?;
        record.status = WebhookEventStatus::Processed;
        record.processed_at = Some(Timestamp::now());
        record.error_message = None;
        Ok(())
    }

    async fn mark_failed(&self, event_id: &str, error: &str) -> Result<(), DomainError> {
        let mut records = self.records.write().await;
        let record = records.get_mut(event_id).ok_or_else(|| not_found(event_id))?;
        record.status = WebhookEventStatus::Failed;
        record.error_message = Some(error.to_string());
        Ok(())
    }

    async fn find_by_event_id(
        &self,
        event_id: &str,
    ) -> Result<Option<WebhookEventRecord>, DomainError> {
        Ok(self.records.read().await.get(event_id).cloned())
    }

    async fn delete_before(&self, timestamp: Timestamp) -> Result<u64, DomainError> {
        let mut records = self.records.write().await;
        let before = records.len();
        // In-flight claims are kept so their redeliveries stay deduplicated.
        records.retain(|_, r| {
            r.status == WebhookEventStatus::Received || !r.received_at.is_before(&timestamp)
        });
        Ok((before - records.len()) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn record(event_id: &str) -> WebhookEventRecord {
        WebhookEventRecord::received(event_id, "PAYMENT_SUCCEEDED", serde_json::json!({}))
    }

    #[tokio::test]
    async fn first_claim_is_inserted_second_already_exists() {
        let ledger = InMemoryWebhookEventLedger::new();

        assert_eq!(ledger.insert_received(record("evt_1")).await.unwrap(), SaveResult::Inserted);
        assert_eq!(
            ledger.insert_received(record("evt_1")).await.unwrap(),
            SaveResult::AlreadyExists
        );
    }

    #[tokio::test]
    async fn concurrent_claims_have_one_winner() {
        let ledger = Arc::new(InMemoryWebhookEventLedger::new());

        let claims = (0..8).map(|_| {
            let ledger = ledger.clone();
            tokio::spawn(async move { ledger.insert_received(record("evt_race")).await })
        });
        let results: Vec<SaveResult> = futures::future::join_all(claims)
            .await
            .into_iter()
            .map(|r| r.unwrap().unwrap())
            .collect();

        let winners = results.iter().filter(|r| **r == SaveResult::Inserted).count();
        assert_eq!(winners, 1);
    }

    #[tokio::test]
    async fn processed_event_is_reported_and_not_reclaimed() {
        let ledger = InMemoryWebhookEventLedger::with_stale_claim_secs(0);
        ledger.insert_received(record("evt_1")).await.unwrap();
        ledger.mark_processed("evt_1").await.unwrap();

        assert!(ledger.exists_processed("evt_1").await.unwrap());
        assert_eq!(
            ledger.insert_received(record("evt_1")).await.unwrap(),
            SaveResult::AlreadyExists
        );
    }

    #[tokio::test]
    async fn failed_event_is_reclaimed_with_error_kept() {
        let ledger = InMemoryWebhookEventLedger::new();
        ledger.insert_received(record("evt_1")).await.unwrap();
        ledger.mark_failed("evt_1", "db down").await.unwrap();

        assert_eq!(ledger.insert_received(record("evt_1")).await.unwrap(), SaveResult::Inserted);

        let stored = ledger.find_by_event_id("evt_1").await.unwrap().unwrap();
        assert_eq!(stored.status, WebhookEventStatus::Received);
        assert_eq!(stored.attempts, 2);
        assert_eq!(stored.error_message.as_deref(), Some("db down"));
    }

    #[tokio::test]
    async fn abandoned_claim_is_reclaimed_after_window() {
        let ledger = InMemoryWebhookEventLedger::with_stale_claim_secs(60);
        let mut abandoned = record("evt_1");
        abandoned.received_at = Timestamp::now().minus_secs(120);
        ledger.insert_received(abandoned).await.unwrap();

        assert_eq!(ledger.insert_received(record("evt_1")).await.unwrap(), SaveResult::Inserted);
    }

    #[tokio::test]
    async fn marking_unknown_event_fails() {
        let ledger = InMemoryWebhookEventLedger::new();

        let err = ledger.mark_processed("evt_missing").await.unwrap_err();
        assert_eq!(err.code, ErrorCode::WebhookEventNotFound);
        assert!(ledger.mark_failed("evt_missing", "boom").await.is_err());
    }

    #[tokio::test]
    async fn delete_before_removes_old_records() {
        let ledger = InMemoryWebhookEventLedger::new();
        let mut old = record("evt_old");
        old.received_at = Timestamp::now().add_days(-60);
        ledger.insert_received(old).await.unwrap();
        ledger.mark_processed("evt_old").await.unwrap();
        ledger.insert_received(record("evt_new")).await.unwrap();

        let deleted = ledger.delete_before(Timestamp::now().add_days(-30)).await.unwrap();

        assert_eq!(deleted, 1);
        assert!(ledger.find_by_event_id("evt_old").await.unwrap().is_none());
        assert!(ledger.find_by_event_id("evt_new").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn delete_before_keeps_in_flight_claims() {
        let ledger = InMemoryWebhookEventLedger::new();
        for (event_id, finish) in [("evt_done", true), ("evt_failed", false), ("evt_busy", false)] {
            let mut old = record(event_id);
            old.received_at = Timestamp::now().add_days(-60);
            ledger.insert_received(old).await.unwrap();
            if finish {
                ledger.mark_processed(event_id).await.unwrap();
            }
        }
        ledger.mark_failed("evt_failed", "card declined").await.unwrap();

        let deleted = ledger.delete_before(Timestamp::now().add_days(-30)).await.unwrap();

        assert_eq!(deleted, 2);
        let busy = ledger.find_by_event_id("evt_busy").await.unwrap().unwrap();
        assert_eq!(busy.status, WebhookEventStatus::Received);
        assert!(ledger.find_by_event_id("evt_done").await.unwrap().is_none());
        assert!(ledger.find_by_event_id("evt_failed").await.unwrap().is_none());
    }
}
