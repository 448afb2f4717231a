//! Payment totals over a subscription's history.
//!
//! The service reads payments through the [`PaymentReader`] port so large
//! histories need not be loaded with the aggregate. The folds themselves are
//! plain functions over a slice and are usable on an in-memory history.

use std::sync::Arc;

use crate::domain::foundation::{Currency, Money};
use crate::ports::PaymentReader;

use super::{BillingError, Payment, PaymentStatus, Subscription};

/// Sum of `Succeeded` payments, starting from zero in `currency`.
///
/// # Errors
///
/// `CurrencyMismatch` if a payment is in another currency.
pub fn total_paid(payments: &[Payment], currency: Currency) -> Result<Money, BillingError> {
    sum_with_status(payments, currency, PaymentStatus::Succeeded)
}

/// Sum of `Pending` payments, starting from zero in `currency`.
pub fn pending_amount(payments: &[Payment], currency: Currency) -> Result<Money, BillingError> {
    sum_with_status(payments, currency, PaymentStatus::Pending)
}

/// True iff every payment succeeded. Vacuously true for no payments.
pub fn fully_paid(payments: &[Payment]) -> bool {
    payments
        .iter()
        .all(|p| p.status == PaymentStatus::Succeeded)
}

fn sum_with_status(
    payments: &[Payment],
    currency: Currency,
    status: PaymentStatus,
) -> Result<Money, BillingError> {
    payments
        .iter()
        .filter(|p| p.status == status)
        .try_fold(Money::zero(currency), |total, p| {
            total.add(&p.amount).map_err(BillingError::from)
        })
}

/// Read-side aggregation of paid and pending amounts.
#[derive(Clone)]
pub struct PaymentCalculationService {
    reader: Arc<dyn PaymentReader>,
}

impl PaymentCalculationService {
    pub fn new(reader: Arc<dyn PaymentReader>) -> Self {
        Self { reader }
    }

    pub async fn calculate_total_paid(
        &self,
        subscription: &Subscription,
    ) -> Result<Money, BillingError> {
        let payments = self.load(subscription).await?;
        total_paid(&payments, subscription.currency)
    }

    pub async fn calculate_pending_amount(
        &self,
        subscription: &Subscription,
    ) -> Result<Money, BillingError> {
        let payments = self.load(subscription).await?;
        pending_amount(&payments, subscription.currency)
    }

    pub async fn is_fully_paid(&self, subscription: &Subscription) -> Result<bool, BillingError> {
        let payments = self.load(subscription).await?;
        Ok(fully_paid(&payments))
    }

    async fn load(&self, subscription: &Subscription) -> Result<Vec<Payment>, BillingError> {
        Ok(self.reader.find_payments(&subscription.id).await?)
    }
}

impl std::fmt::Debug for PaymentCalculationService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PaymentCalculationService").finish_non_exhaustive()
    }
}
