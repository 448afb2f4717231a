//! PaymentEventProcessor - Applies provider payment events to subscriptions.
//!
//! # Flow
//!
//! 1. Validate the command
//! 2. Skip events the ledger already reports PROCESSED
//! 3. Claim the event in the ledger; a concurrent or earlier claim wins
//! 4. Load the subscription, apply the event, save with version check
//! 5. Mark the event PROCESSED (or FAILED, so a redelivery re-claims it)
//!
//! Step 4 is retried from a fresh load when the save loses a version race.

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::Serialize;
use std::sync::Arc;

use crate::domain::billing::{
    BillingError, Payment, PaymentEvent, PaymentStatus, Subscription, SubscriptionRenewalService,
};
use crate::domain::foundation::{today, ErrorCode, Money, SubscriptionId, Timestamp, UserId};
use crate::ports::{SaveResult, SubscriptionRepository, WebhookEventLedger, WebhookEventRecord};

/// Default number of reload-and-retry rounds after a version conflict.
pub const DEFAULT_MAX_CONFLICT_RETRIES: u32 = 3;

/// Command carrying one provider payment event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PaymentEventCommand {
    /// Provider event ID, the idempotency key.
    pub external_payment_id: String,
    pub subscription_id: Option<SubscriptionId>,
    pub user_id: Option<UserId>,
    pub event: PaymentEvent,
    /// Settled amount. Required unless the event is `PaymentPending`.
    pub amount: Option<Money>,
    pub event_occurred_at: Timestamp,
}

impl PaymentEventCommand {
    /// Command addressed by subscription id.
    pub fn for_subscription(
        external_payment_id: impl Into<String>,
        subscription_id: SubscriptionId,
        event: PaymentEvent,
        amount: Option<Money>,
    ) -> Self {
        Self {
            external_payment_id: external_payment_id.into(),
            subscription_id: Some(subscription_id),
            user_id: None,
            event,
            amount,
            event_occurred_at: Timestamp::now(),
        }
    }

    /// Rejects malformed commands before the ledger is touched.
    pub fn validate(&self) -> Result<(), BillingError> {
        if self.external_payment_id.trim().is_empty() {
            return Err(BillingError::validation(
                "external_payment_id",
                "external payment id cannot be empty",
            ));
        }
        if self.subscription_id.is_none() && self.user_id.is_none() {
            return Err(BillingError::validation(
                "subscription_id",
                "either subscription_id or user_id is required",
            ));
        }
        // Negative amounts are refunds and pass through.
        if self.amount.is_none() && self.event.requires_amount() {
            return Err(BillingError::validation(
                "amount",
                format!("{} requires an amount", self.event),
            ));
        }
        Ok(())
    }
}

/// Result of a renewal attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenewalOutcome {
    /// Billing period has not ended yet.
    NotDue,
    /// New period started. `renewal_payment` is the charge to submit.
    Renewed {
        subscription: Subscription,
        renewal_payment: Payment,
    },
}

/// Entry point for provider payment events.
#[async_trait]
pub trait HandlePaymentEventUseCase: Send + Sync {
    /// Apply one event. Duplicate deliveries succeed without effect.
    ///
    /// # Errors
    ///
    /// - `Validation` / `CurrencyMismatch` for malformed commands
    /// - `NotFound` if the subscription does not exist
    /// - `StateConflict` if the subscription rejects the event
    /// - `Infrastructure` for transient failures (retryable)
    async fn handle(&self, cmd: PaymentEventCommand) -> Result<(), BillingError>;
}

/// Builds the payment an event records. `on` is the booking date.
pub fn payment_from_command(
    cmd: &PaymentEventCommand,
    subscription: &Subscription,
    status: PaymentStatus,
    on: NaiveDate,
) -> Result<Payment, BillingError> {
    let amount = cmd
        .amount
        .ok_or_else(|| BillingError::validation("amount", format!("{} requires an amount", cmd.event)))?;

    Ok(Payment::new(subscription.id, subscription.user_id.clone(), amount, status, on)
        .with_external_id(cmd.external_payment_id.clone()))
}

/// Orchestrates deduplication, aggregate mutation and persistence.
///
/// The only writer of subscriptions and of the ledger: payment events go
/// through [`handle`](HandlePaymentEventUseCase::handle), renewals through
/// [`renew`](Self::renew).
pub struct PaymentEventProcessor {
    repository: Arc<dyn SubscriptionRepository>,
    ledger: Arc<dyn WebhookEventLedger>,
    renewal: SubscriptionRenewalService,
    max_conflict_retries: u32,
}

impl PaymentEventProcessor {
    pub fn new(
        repository: Arc<dyn SubscriptionRepository>,
        ledger: Arc<dyn WebhookEventLedger>,
        renewal: SubscriptionRenewalService,
    ) -> Self {
        Self {
            repository,
            ledger,
            renewal,
            max_conflict_retries: DEFAULT_MAX_CONFLICT_RETRIES,
        }
    }

    pub fn with_max_conflict_retries(mut self, retries: u32) -> Self {
        self.max_conflict_retries = retries;
        self
    }

    /// Renew a lapsed subscription.
    ///
    /// Uses the same version-checked save and retry loop as event handling.
    ///
    /// # Errors
    ///
    /// - `NotFound` if the subscription does not exist
    /// - `StateConflict` if it is cancelled or has a payment in flight
    pub async fn renew(&self, subscription_id: SubscriptionId) -> Result<RenewalOutcome, BillingError> {
        let mut conflicts = 0;
        loop {
            let mut subscription = self
                .repository
                .find_by_id(&subscription_id)
                .await?
                .ok_or_else(|| BillingError::subscription_not_found(subscription_id))?;

            if !self.renewal.should_renew(&subscription) {
                tracing::debug!(subscription_id = %subscription_id, "Renewal not due");
                return Ok(RenewalOutcome::NotDue);
            }

            let renewal_payment = self.renewal.create_renewal_payment(&subscription).await?;
            self.renewal.process_renewal(&mut subscription)?;

            if let Some(saved) = self.try_save(&subscription, &mut conflicts).await? {
                tracing::info!(
                    subscription_id = %saved.id,
                    period_end = %saved.period_end(),
                    amount = %renewal_payment.amount,
                    "Subscription renewed"
                );
                return Ok(RenewalOutcome::Renewed {
                    subscription: saved,
                    renewal_payment,
                });
            }
        }
    }

    async fn load(&self, cmd: &PaymentEventCommand) -> Result<Subscription, BillingError> {
        let subscription = match (&cmd.subscription_id, &cmd.user_id) {
            (Some(id), _) => self
                .repository
                .find_by_id(id)
                .await?
                .ok_or_else(|| BillingError::subscription_not_found(id))?,
            (None, Some(user_id)) => self
                .repository
                .find_by_user_id(user_id)
                .await?
                .ok_or_else(|| BillingError::NotFound {
                    entity: "Subscription for user",
                    id: user_id.to_string(),
                })?,
            (None, None) => {
                return Err(BillingError::validation(
                    "subscription_id",
                    "either subscription_id or user_id is required",
                ))
            }
        };

        if let Some(user_id) = &cmd.user_id {
            if &subscription.user_id != user_id {
                return Err(BillingError::validation(
                    "user_id",
                    format!("subscription {} belongs to another user", subscription.id),
                ));
            }
        }
        Ok(subscription)
    }

    /// Load, mutate and save until the save wins its version check.
    async fn apply(&self, cmd: &PaymentEventCommand) -> Result<Subscription, BillingError> {
        let mut conflicts = 0;
        loop {
            let mut subscription = self.load(cmd).await?;

            // A slow worker whose claim went stale, or the winner of a
            // version race, may already have recorded this event.
            if subscription
                .payments()
                .contains_external_id(&cmd.external_payment_id)
            {
                tracing::debug!(
                    event_id = %cmd.external_payment_id,
                    subscription_id = %subscription.id,
                    "Event already recorded on subscription"
                );
                return Ok(subscription);
            }
            subscription.ensure_accepts_payment_events()?;

            match cmd.event {
                PaymentEvent::PaymentSucceeded => {
                    let payment =
                        payment_from_command(cmd, &subscription, PaymentStatus::Succeeded, today())?;
                    subscription.register_payment_succeeded(payment)?;
                }
                PaymentEvent::PaymentFailed => {
                    let payment =
                        payment_from_command(cmd, &subscription, PaymentStatus::Failed, today())?;
                    subscription.register_payment_failed(payment)?;
                }
                PaymentEvent::PaymentPending => {
                    // Pending carries no state change; the resolving event will.
                    return Ok(subscription);
                }
            }

            if let Some(saved) = self.try_save(&subscription, &mut conflicts).await? {
                return Ok(saved);
            }
        }
    }

    /// Save with version check. `Ok(None)` asks the caller to reload and retry.
    async fn try_save(
        &self,
        subscription: &Subscription,
        conflicts: &mut u32,
    ) -> Result<Option<Subscription>, BillingError> {
        match self.repository.save(subscription).await {
            Ok(saved) => Ok(Some(saved)),
            Err(err) if err.code == ErrorCode::ConcurrencyConflict => {
                *conflicts += 1;
                if *conflicts > self.max_conflict_retries {
                    return Err(BillingError::infrastructure(format!(
                        "gave up on subscription {} after {} conflicting saves: {}",
                        subscription.id, conflicts, err.message
                    )));
                }
                tracing::warn!(
                    subscription_id = %subscription.id,
                    attempt = *conflicts,
                    "Version conflict on save, reloading"
                );
                Ok(None)
            }
            Err(err) => Err(err.into()),
        }
    }

    async fn claim(&self, cmd: &PaymentEventCommand) -> Result<SaveResult, BillingError> {
        let payload = serde_json::to_value(cmd)
            .map_err(|e| BillingError::infrastructure(format!("failed to encode command: {}", e)))?;
        let record =
            WebhookEventRecord::received(&cmd.external_payment_id, cmd.event.as_str(), payload);

        match self.ledger.insert_received(record).await {
            Ok(result) => Ok(result),
            Err(err) => match BillingError::from(err) {
                BillingError::DuplicateEvent(_) => Ok(SaveResult::AlreadyExists),
                other => Err(other),
            },
        }
    }

    async fn record_failure(&self, event_id: &str, err: &BillingError) {
        if let Err(mark_err) = self.ledger.mark_failed(event_id, &err.to_string()).await {
            tracing::warn!(
                event_id = %event_id,
                error = %mark_err,
                "Failed to mark webhook event as failed"
            );
        }
    }
}

#[async_trait]
impl HandlePaymentEventUseCase for PaymentEventProcessor {
    async fn handle(&self, cmd: PaymentEventCommand) -> Result<(), BillingError> {
        cmd.validate()?;
        let event_id = cmd.external_payment_id.as_str();

        if self.ledger.exists_processed(event_id).await? {
            tracing::debug!(event_id = %event_id, "Event already processed, skipping");
            return Ok(());
        }

        if self.claim(&cmd).await? == SaveResult::AlreadyExists {
            tracing::debug!(event_id = %event_id, "Event claimed by another delivery, skipping");
            return Ok(());
        }

        let subscription = match self.apply(&cmd).await {
            Ok(subscription) => subscription,
            Err(err) => {
                tracing::warn!(
                    event_id = %event_id,
                    event = %cmd.event,
                    error = %err,
                    retryable = err.is_retryable(),
                    "Payment event rejected"
                );
                self.record_failure(event_id, &err).await;
                return Err(err);
            }
        };

        self.ledger.mark_processed(event_id).await?;

        tracing::info!(
            event_id = %event_id,
            event = %cmd.event,
            subscription_id = %subscription.id,
            status = %subscription.status(),
            "Payment event applied"
        );
        Ok(())
    }
}
