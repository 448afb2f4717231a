//! WebhookEventLedger port - Idempotency ledger for provider payment events.
//!
//! Every provider event is claimed in the ledger before it touches a
//! subscription, and marked once its effects are persisted.
//!
//! ## Why Idempotency Matters
//!
//! Payment providers redeliver the same event on:
//! - Network timeouts
//! - Non-2xx responses from our endpoint
//! - Our endpoint succeeding without the provider seeing the acknowledgement
//!
//! ## Record lifecycle
//!
//! ```text
//! (none) ──insert_received──► RECEIVED ──mark_processed──► PROCESSED
//!                                │
//!                                └──────mark_failed──────► FAILED
//! ```
//!
//! A FAILED record, or a RECEIVED record older than the adapter's stale-claim
//! window, may be claimed again by `insert_received`.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::domain::foundation::{DomainError, Timestamp, ValidationError};

/// Processing state of a ledger record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WebhookEventStatus {
    /// Claimed by a worker, effects not yet persisted.
    Received,
    /// Effects persisted. Redeliveries are acknowledged without reapplying.
    Processed,
    /// Last attempt failed. The next delivery re-claims it.
    Failed,
}

impl WebhookEventStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            WebhookEventStatus::Received => "received",
            WebhookEventStatus::Processed => "processed",
            WebhookEventStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for WebhookEventStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WebhookEventStatus {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "received" => Ok(WebhookEventStatus::Received),
            "processed" => Ok(WebhookEventStatus::Processed),
            "failed" => Ok(WebhookEventStatus::Failed),
            other => Err(ValidationError::invalid_format(
                "webhook_event_status",
                format!("unknown status '{}'", other),
            )),
        }
    }
}

/// One provider event as tracked by the ledger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebhookEventRecord {
    /// Provider event ID (e.g. `evt_xxx`).
    pub event_id: String,

    /// Domain event name the provider event was translated to.
    pub event_type: String,

    pub status: WebhookEventStatus,

    /// When the current claim was taken.
    pub received_at: Timestamp,

    pub processed_at: Option<Timestamp>,

    /// Error of the last failed attempt.
    pub error_message: Option<String>,

    /// Number of claims taken, including the current one.
    pub attempts: u32,

    /// Command the event was translated to, kept for auditing.
    pub payload: serde_json::Value,
}

impl WebhookEventRecord {
    /// Creates a fresh RECEIVED record.
    pub fn received(
        event_id: impl Into<String>,
        event_type: impl Into<String>,
        payload: serde_json::Value,
    ) -> Self {
        Self {
            event_id: event_id.into(),
            event_type: event_type.into(),
            status: WebhookEventStatus::Received,
            received_at: Timestamp::now(),
            processed_at: None,
            error_message: None,
            attempts: 1,
            payload,
        }
    }

    pub fn is_processed(&self) -> bool {
        self.status == WebhookEventStatus::Processed
    }

    /// Whether a new delivery may take over this record.
    ///
    /// `stale_before` is the oldest claim time still considered alive.
    pub fn is_reclaimable(&self, stale_before: &Timestamp) -> bool {
        match self.status {
            WebhookEventStatus::Failed => true,
            WebhookEventStatus::Received => self.received_at.is_before(stale_before),
            WebhookEventStatus::Processed => false,
        }
    }
}

/// Result of attempting to claim an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveResult {
    /// Claim taken (first delivery, or re-claim of a failed/stale record).
    Inserted,
    /// Another delivery holds or completed the event.
    AlreadyExists,
}

/// Port for the payment event idempotency ledger.
///
/// Implementations must make `insert_received` atomic per event id: of any
/// number of concurrent claims exactly one observes `Inserted`.
#[async_trait]
pub trait WebhookEventLedger: Send + Sync {
    /// True if the event's effects are already persisted.
    async fn exists_processed(&self, event_id: &str) -> Result<bool, DomainError>;

    /// Claim an event for processing.
    ///
    /// Returns `Inserted` for a new event and for a reclaimable record (see
    /// [`WebhookEventRecord::is_reclaimable`]); `AlreadyExists` otherwise.
    async fn insert_received(&self, record: WebhookEventRecord)
        -> Result<SaveResult, DomainError>;

    /// Mark a claimed event as PROCESSED.
    ///
    /// # Errors
    ///
    /// - `WebhookEventNotFound` if the event was never claimed
    async fn mark_processed(&self, event_id: &str) -> Result<(), DomainError>;

    /// Mark a claimed event as FAILED with the error that stopped it.
    ///
    /// # Errors
    ///
    /// - `WebhookEventNotFound` if the event was never claimed
    async fn mark_failed(&self, event_id: &str, error: &str) -> Result<(), DomainError>;

    async fn find_by_event_id(
        &self,
        event_id: &str,
    ) -> Result<Option<WebhookEventRecord>, DomainError>;

    /// Delete PROCESSED and FAILED records received before `timestamp`.
    ///
    /// RECEIVED records are in flight and are never pruned. Returns the number of records deleted.
    async fn delete_before(&self, timestamp: Timestamp) -> Result<u64, DomainError>;
}
