//! Payment reader port (read side).

use async_trait::async_trait;

use crate::domain::billing::Payment;
use crate::domain::foundation::{DomainError, SubscriptionId};

/// Read access to the payment history of a subscription.
#[async_trait]
pub trait PaymentReader: Send + Sync {
    /// All payments of a subscription in arrival order.
    ///
    /// Returns an empty list for unknown subscriptions.
    async fn find_payments(
        &self,
        subscription_id: &SubscriptionId,
    ) -> Result<Vec<Payment>, DomainError>;
}
