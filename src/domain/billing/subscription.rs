//! Subscription aggregate.
//!
//! The Subscription aggregate owns a user's plan, its lifecycle status and the
//! append-only history of payments applied to it.
//!
//! # Design Decisions
//!
//! - **Exact money**: amounts are `Decimal`-backed [`Money`] in the
//!   subscription's operating currency
//! - **Append-only history**: each applied event adds a new [`Payment`];
//!   existing records are never rewritten
//! - **Computed expiry**: `Expired` is derived from `start_date` and the plan
//!   period, never stored
//! - **Versioned**: `version` is the optimistic concurrency stamp checked by
//!   repositories on save

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::domain::foundation::{
    today, Currency, StateMachine, SubscriptionId, Timestamp, UserId,
};

use super::{
    BillingError, Payment, PaymentHistory, PaymentMethod, PaymentStatus, SubscriptionStatus,
    SubscriptionType,
};

/// Subscription aggregate root.
///
/// # Invariants
///
/// - Stored `status` is never `Expired`
/// - Status changes only through the lifecycle methods below
/// - A cancelled subscription rejects every mutation
/// - Every payment in `payments` belongs to this subscription and is in its currency
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subscription {
    pub id: SubscriptionId,
    pub user_id: UserId,
    pub subscription_type: SubscriptionType,
    pub payment_method: PaymentMethod,
    pub currency: Currency,
    status: SubscriptionStatus,
    start_date: NaiveDate,
    payments: PaymentHistory,
    failed_attempts: u32,
    version: u64,
    pub created_at: Timestamp,
    updated_at: Timestamp,
    cancelled_at: Option<Timestamp>,
}

/// Stored representation used by repositories to rebuild an aggregate.
#[derive(Debug, Clone)]
pub struct SubscriptionSnapshot {
    pub id: SubscriptionId,
    pub user_id: UserId,
    pub subscription_type: SubscriptionType,
    pub payment_method: PaymentMethod,
    pub currency: Currency,
    pub status: SubscriptionStatus,
    pub start_date: NaiveDate,
    pub payments: Vec<Payment>,
    pub failed_attempts: u32,
    pub version: u64,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
    pub cancelled_at: Option<Timestamp>,
}

impl Subscription {
    /// Create a new subscription.
    ///
    /// Whether it starts `PendingActivation` or `Active` is decided by the
    /// creating use case from the initial payment outcome.
    ///
    /// # Errors
    ///
    /// `Validation` if `initial_status` is anything else.
    pub fn create(
        start_date: NaiveDate,
        subscription_type: SubscriptionType,
        user_id: UserId,
        payment_method: PaymentMethod,
        currency: Currency,
        initial_status: SubscriptionStatus,
    ) -> Result<Self, BillingError> {
        if !matches!(
            initial_status,
            SubscriptionStatus::PendingActivation | SubscriptionStatus::Active
        ) {
            return Err(BillingError::validation(
                "status",
                format!("a subscription cannot start as {}", initial_status),
            ));
        }

        let now = Timestamp::now();
        Ok(Self {
            id: SubscriptionId::new(),
            user_id,
            subscription_type,
            payment_method,
            currency,
            status: initial_status,
            start_date,
            payments: PaymentHistory::new(),
            failed_attempts: 0,
            version: 0,
            created_at: now,
            updated_at: now,
            cancelled_at: None,
        })
    }

    /// Rebuild a stored aggregate.
    ///
    /// # Errors
    ///
    /// `Validation` if the snapshot holds a non-storable status or foreign payments.
    pub fn reconstitute(snapshot: SubscriptionSnapshot) -> Result<Self, BillingError> {
        if !snapshot.status.is_storable() {
            return Err(BillingError::validation(
                "status",
                format!("{} is not a stored status", snapshot.status),
            ));
        }
        if let Some(foreign) = snapshot
            .payments
            .iter()
            .find(|p| p.subscription_id != snapshot.id)
        {
            return Err(BillingError::validation(
                "payments",
                format!("payment {} belongs to another subscription", foreign.id),
            ));
        }

        Ok(Self {
            id: snapshot.id,
            user_id: snapshot.user_id,
            subscription_type: snapshot.subscription_type,
            payment_method: snapshot.payment_method,
            currency: snapshot.currency,
            status: snapshot.status,
            start_date: snapshot.start_date,
            payments: snapshot.payments.into(),
            failed_attempts: snapshot.failed_attempts,
            version: snapshot.version,
            created_at: snapshot.created_at,
            updated_at: snapshot.updated_at,
            cancelled_at: snapshot.cancelled_at,
        })
    }

    pub fn status(&self) -> SubscriptionStatus {
        self.status
    }

    /// Billing anchor: first day of the current period.
    pub fn start_date(&self) -> NaiveDate {
        self.start_date
    }

    pub fn payments(&self) -> &PaymentHistory {
        &self.payments
    }

    /// Consecutive failed payments since the last success.
    pub fn failed_attempts(&self) -> u32 {
        self.failed_attempts
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn updated_at(&self) -> Timestamp {
        self.updated_at
    }

    pub fn cancelled_at(&self) -> Option<Timestamp> {
        self.cancelled_at
    }

    /// Returns the aggregate stamped with a new version.
    ///
    /// Only repositories call this, after a successful compare-and-swap.
    pub fn with_version(mut self, version: u64) -> Self {
        self.version = version;
        self
    }

    /// First day after the current billing period.
    pub fn period_end(&self) -> NaiveDate {
        self.subscription_type.period_end(self.start_date)
    }

    /// True once `date` reaches the end of the current billing period.
    pub fn is_expired_on(&self, date: NaiveDate) -> bool {
        date >= self.period_end()
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_on(today())
    }

    /// Status as observed on `date`, including the computed `Expired`.
    ///
    /// Cancellation takes precedence over expiry.
    pub fn effective_status_on(&self, date: NaiveDate) -> SubscriptionStatus {
        match self.status {
            SubscriptionStatus::Cancelled => SubscriptionStatus::Cancelled,
            _ if self.is_expired_on(date) => SubscriptionStatus::Expired,
            status => status,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.status == SubscriptionStatus::Cancelled
    }

    /// Apply a successful payment.
    ///
    /// Pending activation and inactive subscriptions become active; an active
    /// subscription stays active. The dunning counter is cleared.
    ///
    /// # Errors
    ///
    /// - `StateConflict` if cancelled or expired
    /// - `Validation` if the payment is not `Succeeded` or belongs elsewhere
    /// - `CurrencyMismatch` if the payment is in another currency
    pub fn register_payment_succeeded(&mut self, payment: Payment) -> Result<(), BillingError> {
        self.ensure_accepts_payment(&payment, PaymentStatus::Succeeded)?;
        self.transition_to(SubscriptionStatus::Active)?;
        self.payments.append(payment);
        self.failed_attempts = 0;
        self.touch();
        Ok(())
    }

    /// Apply a failed payment.
    ///
    /// Any non-terminal subscription becomes inactive. Repeated failures keep
    /// it inactive but each call still appends the payment; deduplication of
    /// replayed provider events is the idempotency ledger's job.
    ///
    /// # Errors
    ///
    /// Same as [`register_payment_succeeded`](Self::register_payment_succeeded).
    pub fn register_payment_failed(&mut self, payment: Payment) -> Result<(), BillingError> {
        self.ensure_accepts_payment(&payment, PaymentStatus::Failed)?;
        self.transition_to(SubscriptionStatus::Inactive)?;
        self.payments.append(payment);
        self.failed_attempts = self.failed_attempts.saturating_add(1);
        self.touch();
        Ok(())
    }

    /// Manually resume a pending or inactive subscription.
    pub fn activate_subscription(&mut self) -> Result<(), BillingError> {
        match self.status {
            SubscriptionStatus::PendingActivation | SubscriptionStatus::Inactive => {
                self.transition_to(SubscriptionStatus::Active)?;
                self.touch();
                Ok(())
            }
            current => Err(BillingError::state_conflict(current.to_string(), "activate")),
        }
    }

    /// Manually suspend an active subscription.
    pub fn deactivate_subscription(&mut self) -> Result<(), BillingError> {
        match self.status {
            SubscriptionStatus::Active => {
                self.transition_to(SubscriptionStatus::Inactive)?;
                self.touch();
                Ok(())
            }
            current => Err(BillingError::state_conflict(current.to_string(), "deactivate")),
        }
    }

    /// Cancel the subscription. Terminal.
    pub fn cancel(&mut self) -> Result<(), BillingError> {
        self.transition_to(SubscriptionStatus::Cancelled)
            .map_err(|_| BillingError::state_conflict(self.status.to_string(), "cancel"))?;
        let now = Timestamp::now();
        self.cancelled_at = Some(now);
        self.updated_at = now;
        Ok(())
    }

    /// Move the billing anchor to `date`, starting a new period.
    pub(crate) fn restart_period(&mut self, date: NaiveDate) -> Result<(), BillingError> {
        if self.is_cancelled() {
            return Err(BillingError::state_conflict(self.status.to_string(), "renew"));
        }
        self.start_date = date;
        self.touch();
        Ok(())
    }

    /// Fails with `StateConflict` if the subscription is cancelled or its
    /// billing period has ended. Applies to every payment event, including
    /// ones that change nothing.
    pub fn ensure_accepts_payment_events(&self) -> Result<(), BillingError> {
        let effective = self.effective_status_on(today());
        if matches!(
            effective,
            SubscriptionStatus::Cancelled | SubscriptionStatus::Expired
        ) {
            return Err(BillingError::state_conflict(
                effective.to_string(),
                "apply payment to",
            ));
        }
        Ok(())
    }

    fn ensure_accepts_payment(
        &self,
        payment: &Payment,
        expected: PaymentStatus,
    ) -> Result<(), BillingError> {
        self.ensure_accepts_payment_events()?;
        if payment.subscription_id != self.id {
            return Err(BillingError::validation(
                "subscription_id",
                format!("payment {} belongs to another subscription", payment.id),
            ));
        }
        if payment.status != expected {
            return Err(BillingError::validation(
                "status",
                format!("expected a {} payment, got {}", expected, payment.status),
            ));
        }
        if payment.amount.currency() != self.currency {
            return Err(BillingError::CurrencyMismatch {
                expected: self.currency,
                actual: payment.amount.currency(),
            });
        }
        if self.payments.get(&payment.id).is_some() {
            return Err(BillingError::validation(
                "payment_id",
                format!("payment {} is already recorded", payment.id),
            ));
        }
        Ok(())
    }

    fn transition_to(&mut self, target: SubscriptionStatus) -> Result<(), BillingError> {
        self.status = self.status.transition_to(target)?;
        Ok(())
    }

    fn touch(&mut self) {
        self.updated_at = Timestamp::now();
    }
}
