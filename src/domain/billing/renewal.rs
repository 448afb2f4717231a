//! Subscription renewal decisions.
//!
//! Composing the steps is the caller's job: `create_renewal_payment` yields
//! the charge to submit to the provider, `process_renewal` starts the new
//! billing period. The resolved charge later arrives as a payment event.

use crate::domain::foundation::today;

use super::{
    BillingError, Payment, PaymentCalculationService, PaymentStatus, Subscription,
    SubscriptionStatus,
};

/// Decides renewal eligibility and produces renewal payments.
#[derive(Debug, Clone)]
pub struct SubscriptionRenewalService {
    calculator: PaymentCalculationService,
}

impl SubscriptionRenewalService {
    pub fn new(calculator: PaymentCalculationService) -> Self {
        Self { calculator }
    }

    /// A subscription is due for renewal once its billing period has ended.
    pub fn should_renew(&self, subscription: &Subscription) -> bool {
        subscription.is_expired()
    }

    /// Builds the pending renewal charge dated today.
    ///
    /// # Errors
    ///
    /// `StateConflict` if the subscription is not due.
    pub async fn create_renewal_payment(
        &self,
        subscription: &Subscription,
    ) -> Result<Payment, BillingError> {
        if !self.should_renew(subscription) {
            return Err(BillingError::state_conflict(
                subscription.effective_status_on(today()).to_string(),
                "renew",
            ));
        }

        let amount = self.calculator.calculate_pending_amount(subscription).await?;
        Ok(Payment::new(
            subscription.id,
            subscription.user_id.clone(),
            amount,
            PaymentStatus::Pending,
            today(),
        ))
    }

    /// Starts a new billing period today and activates the subscription.
    ///
    /// # Errors
    ///
    /// `StateConflict` if a payment is still pending or the subscription is
    /// cancelled.
    pub fn process_renewal(&self, subscription: &mut Subscription) -> Result<(), BillingError> {
        if subscription.payments().has_pending() {
            return Err(BillingError::state_conflict(
                subscription.status().to_string(),
                "renew with a payment in flight",
            ));
        }

        subscription.restart_period(today())?;
        if subscription.status() != SubscriptionStatus::Active {
            subscription.activate_subscription()?;
        }
        Ok(())
    }
}
