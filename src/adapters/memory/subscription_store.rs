//! In-memory subscription store.
//!
//! Implements both [`SubscriptionRepository`] and [`PaymentReader`] over one
//! map so the calculation service sees exactly what the processor persisted.
//! Used by tests and local runs without a database.

use async_trait::async_trait;
use chrono::NaiveDate;
use std::collections::HashMap;
use tokio::sync::RwLock;

use crate::domain::billing::{Payment, Subscription};
use crate::domain::foundation::{DomainError, SubscriptionId, UserId};
use crate::ports::{PaymentReader, SubscriptionRepository};

/// Subscription aggregates keyed by id, with version compare-and-swap on save.
#[derive(Debug, Default)]
pub struct InMemorySubscriptionRepository {
    subscriptions: RwLock<HashMap<SubscriptionId, Subscription>>,
}

impl InMemorySubscriptionRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored subscriptions.
    pub async fn len(&self) -> usize {
        self.subscriptions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.subscriptions.read().await.is_empty()
    }
}

#[async_trait]
impl SubscriptionRepository for InMemorySubscriptionRepository {
    async fn save(&self, subscription: &Subscription) -> Result<Subscription, DomainError> {
        let mut subscriptions = self.subscriptions.write().await;
        let stored_version = subscriptions.get(&subscription.id).map(Subscription::version);

        match stored_version {
            Some(version) if version != subscription.version() => {
                return Err(DomainError::conflict(format!(
                    "subscription {} is at version {}, save was based on {}",
                    subscription.id,
                    version,
                    subscription.version()
                )));
            }
            None if subscription.version() != 0 => {
                return Err(DomainError::conflict(format!(
                    "subscription {} no longer exists",
                    subscription.id
                )));
            }
            _ => {}
        }

        let saved = subscription.clone().with_version(subscription.version() + 1);
        subscriptions.insert(saved.id, saved.clone());
        Ok(saved)
    }

    async fn find_by_id(&self, id: &SubscriptionId) -> Result<Option<Subscription>, DomainError> {
        Ok(self.subscriptions.read().await.get(id).cloned())
    }

    async fn find_by_user_id(&self, user_id: &UserId) -> Result<Option<Subscription>, DomainError> {
        let subscriptions = self.subscriptions.read().await;
        Ok(subscriptions
            .values()
            .filter(|s| &s.user_id == user_id)
            .max_by_key(|s| s.created_at)
            .cloned())
    }

    async fn find_expired(
        &self,
        as_of: NaiveDate,
        limit: usize,
    ) -> Result<Vec<Subscription>, DomainError> {
        let subscriptions = self.subscriptions.read().await;
        let mut expired: Vec<Subscription> = subscriptions
            .values()
            .filter(|s| !s.is_cancelled() && s.is_expired_on(as_of))
            .cloned()
            .collect();
        expired.sort_by_key(Subscription::period_end);
        expired.truncate(limit);
        Ok(expired)
    }
}

#[async_trait]
impl PaymentReader for InMemorySubscriptionRepository {
    async fn find_payments(
        &self,
        subscription_id: &SubscriptionId,
    ) -> Result<Vec<Payment>, DomainError> {
        let subscriptions = self.subscriptions.read().await;
        Ok(subscriptions
            .get(subscription_id)
            .map(|s| s.payments().to_vec())
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::billing::{
        PaymentMethod, PaymentStatus, SubscriptionSnapshot, SubscriptionStatus, SubscriptionType,
    };
    use crate::domain::foundation::{today, Currency, ErrorCode, Money, Timestamp};
    use chrono::Duration;

    fn subscription(user: &str) -> Subscription {
        Subscription::create(
            today(),
            SubscriptionType::Monthly,
            UserId::new(user).unwrap(),
            PaymentMethod::Card,
            Currency::USD,
            SubscriptionStatus::Active,
        )
        .unwrap()
    }

    fn started_on(start_date: NaiveDate, status: SubscriptionStatus) -> Subscription {
        Subscription::reconstitute(SubscriptionSnapshot {
            id: SubscriptionId::new(),
            user_id: UserId::new("user-1").unwrap(),
            subscription_type: SubscriptionType::Monthly,
            payment_method: PaymentMethod::Card,
            currency: Currency::USD,
            status,
            start_date,
            payments: vec![],
            failed_attempts: 0,
            version: 0,
            created_at: Timestamp::now(),
            updated_at: Timestamp::now(),
            cancelled_at: None,
        })
        .unwrap()
    }

    #[tokio::test]
    async fn save_bumps_version() {
        let repo = InMemorySubscriptionRepository::new();
        let sub = subscription("user-1");

        let saved = repo.save(&sub).await.unwrap();
        assert_eq!(saved.version(), 1);

        let saved_again = repo.save(&saved).await.unwrap();
        assert_eq!(saved_again.version(), 2);
    }

    #[tokio::test]
    async fn stale_save_is_a_concurrency_conflict() {
        let repo = InMemorySubscriptionRepository::new();
        let saved = repo.save(&subscription("user-1")).await.unwrap();

        let mut first = saved.clone();
        let mut second = saved;
        first.deactivate_subscription().unwrap();
        second.cancel().unwrap();

        repo.save(&first).await.unwrap();
        let err = repo.save(&second).await.unwrap_err();

        assert_eq!(err.code, ErrorCode::ConcurrencyConflict);
        let stored = repo.find_by_id(&first.id).await.unwrap().unwrap();
        assert_eq!(stored.status(), SubscriptionStatus::Inactive);
    }

    #[tokio::test]
    async fn find_by_user_id_returns_users_subscription() {
        let repo = InMemorySubscriptionRepository::new();
        let mine = repo.save(&subscription("user-1")).await.unwrap();
        repo.save(&subscription("user-2")).await.unwrap();

        let found = repo
            .find_by_user_id(&UserId::new("user-1").unwrap())
            .await
            .unwrap()
            .unwrap();

        assert_eq!(found.id, mine.id);
        assert!(repo
            .find_by_user_id(&UserId::new("user-3").unwrap())
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn find_expired_skips_current_and_cancelled() {
        let repo = InMemorySubscriptionRepository::new();
        let lapsed = repo
            .save(&started_on(today() - Duration::days(40), SubscriptionStatus::Active))
            .await
            .unwrap();
        repo.save(&started_on(today(), SubscriptionStatus::Active))
            .await
            .unwrap();
        repo.save(&started_on(today() - Duration::days(40), SubscriptionStatus::Cancelled))
            .await
            .unwrap();

        let expired = repo.find_expired(today(), 10).await.unwrap();

        assert_eq!(expired.len(), 1);
        assert_eq!(expired[0].id, lapsed.id);
    }

    #[tokio::test]
    async fn find_expired_orders_oldest_first_and_limits() {
        let repo = InMemorySubscriptionRepository::new();
        let oldest = repo
            .save(&started_on(today() - Duration::days(90), SubscriptionStatus::Inactive))
            .await
            .unwrap();
        repo.save(&started_on(today() - Duration::days(40), SubscriptionStatus::Active))
            .await
            .unwrap();

        let expired = repo.find_expired(today(), 1).await.unwrap();

        assert_eq!(expired.len(), 1);
        assert_eq!(expired[0].id, oldest.id);
    }

    #[tokio::test]
    async fn payments_are_readable_after_save() {
        let repo = InMemorySubscriptionRepository::new();
        let mut sub = subscription("user-1");
        let payment = Payment::new(
            sub.id,
            sub.user_id.clone(),
            Money::from_minor_units(999, Currency::USD),
            PaymentStatus::Succeeded,
            today(),
        );
        sub.register_payment_succeeded(payment.clone()).unwrap();
        repo.save(&sub).await.unwrap();

        assert_eq!(repo.find_payments(&sub.id).await.unwrap(), vec![payment]);
        assert!(repo
            .find_payments(&SubscriptionId::new())
            .await
            .unwrap()
            .is_empty());
    }
}
