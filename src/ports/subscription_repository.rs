//! Subscription repository port (write side).
//!
//! Defines the contract for persisting and retrieving Subscription aggregates.
//!
//! # Design
//!
//! - **Optimistic concurrency**: `save` compares the aggregate's `version`
//!   with the stored one and fails on mismatch
//! - **Whole-aggregate writes**: the payment history is persisted with the
//!   subscription it belongs to

use async_trait::async_trait;
use chrono::NaiveDate;

use crate::domain::billing::Subscription;
use crate::domain::foundation::{DomainError, SubscriptionId, UserId};

/// Repository port for Subscription aggregate persistence.
#[async_trait]
pub trait SubscriptionRepository: Send + Sync {
    /// Insert or update a subscription.
    ///
    /// The stored version must equal `subscription.version()` (or the row must
    /// not exist yet). Returns the aggregate stamped with its new version.
    ///
    /// # Errors
    ///
    /// - `ConcurrencyConflict` if another writer saved first
    /// - `DatabaseError` on persistence failure
    async fn save(&self, subscription: &Subscription) -> Result<Subscription, DomainError>;

    /// Find a subscription by its ID.
    ///
    /// Returns `None` if not found.
    async fn find_by_id(&self, id: &SubscriptionId) -> Result<Option<Subscription>, DomainError>;

    /// Find the most recently created subscription of a user.
    async fn find_by_user_id(&self, user_id: &UserId) -> Result<Option<Subscription>, DomainError>;

    /// Subscriptions whose billing period has ended on `as_of`.
    ///
    /// Cancelled subscriptions are excluded. At most `limit` results, oldest
    /// period end first.
    async fn find_expired(
        &self,
        as_of: NaiveDate,
        limit: usize,
    ) -> Result<Vec<Subscription>, DomainError>;
}
