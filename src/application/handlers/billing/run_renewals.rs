//! RunRenewalsHandler - Periodic sweep renewing lapsed subscriptions.

use chrono::NaiveDate;
use std::sync::Arc;

use crate::domain::billing::{BillingError, Payment};
use crate::domain::foundation::SubscriptionId;
use crate::ports::SubscriptionRepository;

use super::{PaymentEventProcessor, RenewalOutcome};

/// Command to renew subscriptions whose period ended by `as_of`.
#[derive(Debug, Clone, Copy)]
pub struct RunRenewalsCommand {
    pub as_of: NaiveDate,
    /// Maximum number of subscriptions handled in this sweep.
    pub limit: usize,
}

/// Summary of one sweep.
#[derive(Debug, Clone, Default)]
pub struct RunRenewalsResult {
    pub renewed: Vec<SubscriptionId>,
    /// Candidates that were no longer due when reloaded.
    pub not_due: usize,
    pub failed: Vec<(SubscriptionId, BillingError)>,
    /// Pending charges to submit to the payment provider.
    pub renewal_payments: Vec<Payment>,
}

impl RunRenewalsResult {
    pub fn candidates(&self) -> usize {
        self.renewed.len() + self.not_due + self.failed.len()
    }
}

/// Handler for the renewal sweep.
///
/// One subscription failing does not stop the sweep; its error is reported
/// in the result.
pub struct RunRenewalsHandler {
    repository: Arc<dyn SubscriptionRepository>,
    processor: Arc<PaymentEventProcessor>,
}

impl RunRenewalsHandler {
    pub fn new(
        repository: Arc<dyn SubscriptionRepository>,
        processor: Arc<PaymentEventProcessor>,
    ) -> Self {
        Self {
            repository,
            processor,
        }
    }

    pub async fn handle(&self, cmd: RunRenewalsCommand) -> Result<RunRenewalsResult, BillingError> {
        let candidates = self.repository.find_expired(cmd.as_of, cmd.limit).await?;
        let mut result = RunRenewalsResult::default();

        for subscription in candidates {
            match self.processor.renew(subscription.id).await {
                Ok(RenewalOutcome::Renewed {
                    subscription,
                    renewal_payment,
                }) => {
                    result.renewed.push(subscription.id);
                    result.renewal_payments.push(renewal_payment);
                }
                Ok(RenewalOutcome::NotDue) => result.not_due += 1,
                Err(err) => {
                    tracing::warn!(
                        subscription_id = %subscription.id,
                        error = %err,
                        "Renewal failed"
                    );
                    result.failed.push((subscription.id, err));
                }
            }
        }

        tracing::info!(
            as_of = %cmd.as_of,
            renewed = result.renewed.len(),
            not_due = result.not_due,
            failed = result.failed.len(),
            "Renewal sweep finished"
        );
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::{InMemorySubscriptionRepository, InMemoryWebhookEventLedger};
    use crate::domain::billing::{
        PaymentCalculationService, PaymentMethod, PaymentStatus, Subscription,
        SubscriptionRenewalService, SubscriptionSnapshot, SubscriptionStatus, SubscriptionType,
    };
    use crate::domain::foundation::{today, Currency, Money, Timestamp, UserId};
    use crate::ports::PaymentReader;
    use chrono::Duration;

    fn handler(store: &Arc<InMemorySubscriptionRepository>) -> RunRenewalsHandler {
        let reader: Arc<dyn PaymentReader> = store.clone();
        let processor = PaymentEventProcessor::new(
            store.clone(),
            Arc::new(InMemoryWebhookEventLedger::new()),
            SubscriptionRenewalService::new(PaymentCalculationService::new(reader)),
        );
        RunRenewalsHandler::new(store.clone(), Arc::new(processor))
    }

    async fn seed(
        store: &InMemorySubscriptionRepository,
        days_ago: i64,
        with_pending: bool,
    ) -> Subscription {
        let id = SubscriptionId::new();
        let user_id = UserId::new("user-1").unwrap();
        let start_date = today() - Duration::days(days_ago);
        let payments = if with_pending {
            vec![Payment::new(
                id,
                user_id.clone(),
                Money::from_minor_units(999, Currency::USD),
                PaymentStatus::Pending,
                start_date,
            )]
        } else {
            vec![]
        };
        let sub = Subscription::reconstitute(SubscriptionSnapshot {
            id,
            user_id,
            subscription_type: SubscriptionType::Monthly,
            payment_method: PaymentMethod::Card,
            currency: Currency::USD,
            status: SubscriptionStatus::Active,
            start_date,
            payments,
            failed_attempts: 0,
            version: 0,
            created_at: Timestamp::now(),
            updated_at: Timestamp::now(),
            cancelled_at: None,
        })
        .unwrap();
        store.save(&sub).await.unwrap()
    }

    #[tokio::test]
    async fn sweep_renews_lapsed_and_reports_blocked() {
        let store = Arc::new(InMemorySubscriptionRepository::new());
        let lapsed = seed(&store, 40, false).await;
        let blocked = seed(&store, 50, true).await;
        let current = seed(&store, 1, false).await;

        let result = handler(&store)
            .handle(RunRenewalsCommand {
                as_of: today(),
                limit: 100,
            })
            .await
            .unwrap();

        assert_eq!(result.renewed, vec![lapsed.id]);
        assert_eq!(result.renewal_payments.len(), 1);
        assert_eq!(result.failed.len(), 1);
        assert_eq!(result.failed[0].0, blocked.id);
        assert!(matches!(result.failed[0].1, BillingError::StateConflict { .. }));
        assert_eq!(result.candidates(), 2);

        let untouched = store.find_by_id(&current.id).await.unwrap().unwrap();
        assert_eq!(untouched, current);
    }

    #[tokio::test]
    async fn sweep_respects_limit() {
        let store = Arc::new(InMemorySubscriptionRepository::new());
        let oldest = seed(&store, 90, false).await;
        seed(&store, 40, false).await;

        let result = handler(&store)
            .handle(RunRenewalsCommand {
                as_of: today(),
                limit: 1,
            })
            .await
            .unwrap();

        assert_eq!(result.renewed, vec![oldest.id]);
    }

    #[tokio::test]
    async fn second_sweep_finds_nothing() {
        let store = Arc::new(InMemorySubscriptionRepository::new());
        seed(&store, 40, false).await;
        let handler = handler(&store);
        let cmd = RunRenewalsCommand {
            as_of: today(),
            limit: 100,
        };

        handler.handle(cmd).await.unwrap();
        let second = handler.handle(cmd).await.unwrap();

        assert_eq!(second.candidates(), 0);
    }
}
