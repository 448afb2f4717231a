//! Provider-neutral payment event vocabulary.

use serde::{Deserialize, Serialize};
use std::fmt;

/// What a provider notification means in domain terms.
///
/// Provider-specific event names are mapped onto this by an
/// [`EventTypeTranslator`](crate::ports::EventTypeTranslator).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentEvent {
    PaymentSucceeded,
    PaymentFailed,
    PaymentPending,
}

impl PaymentEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentEvent::PaymentSucceeded => "PAYMENT_SUCCEEDED",
            PaymentEvent::PaymentFailed => "PAYMENT_FAILED",
            PaymentEvent::PaymentPending => "PAYMENT_PENDING",
        }
    }

    /// Whether the event carries a settled amount.
    pub fn requires_amount(&self) -> bool {
        match self {
            PaymentEvent::PaymentSucceeded | PaymentEvent::PaymentFailed => true,
            PaymentEvent::PaymentPending => false,
        }
    }
}

impl fmt::Display for PaymentEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
