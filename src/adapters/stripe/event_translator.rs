//! Stripe event type mapping.

use crate::domain::billing::PaymentEvent;
use crate::domain::foundation::{DomainError, ErrorCode};
use crate::ports::EventTypeTranslator;

/// Maps Stripe webhook event types onto [`PaymentEvent`].
#[derive(Debug, Clone, Copy, Default)]
pub struct StripeEventTranslator;

impl StripeEventTranslator {
    pub fn new() -> Self {
        Self
    }
}

impl EventTypeTranslator for StripeEventTranslator {
    fn translate(&self, event_type: &str) -> Result<PaymentEvent, DomainError> {
        match event_type {
            "invoice.payment_succeeded"
            | "invoice.paid"
            | "payment_intent.succeeded"
            | "charge.succeeded" => Ok(PaymentEvent::PaymentSucceeded),

            "invoice.payment_failed" | "payment_intent.payment_failed" | "charge.failed" => {
                Ok(PaymentEvent::PaymentFailed)
            }

            "payment_intent.processing"
            | "invoice.payment_action_required"
            | "charge.pending" => Ok(PaymentEvent::PaymentPending),

            other => Err(DomainError::new(
                ErrorCode::UnknownEventType,
                format!("Unsupported Stripe event type '{}'", other),
            )
            .with_detail("field", "event_type")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_success_types() {
        let translator = StripeEventTranslator::new();
        for event_type in [
            "invoice.payment_succeeded",
            "invoice.paid",
            "payment_intent.succeeded",
            "charge.succeeded",
        ] {
            assert_eq!(
                translator.translate(event_type).unwrap(),
                PaymentEvent::PaymentSucceeded
            );
        }
    }

    #[test]
    fn maps_failure_types() {
        let translator = StripeEventTranslator::new();
        for event_type in ["invoice.payment_failed", "payment_intent.payment_failed", "charge.failed"] {
            assert_eq!(translator.translate(event_type).unwrap(), PaymentEvent::PaymentFailed);
        }
    }

    #[test]
    fn maps_pending_types() {
        let translator = StripeEventTranslator::new();
        for event_type in [
            "payment_intent.processing",
            "invoice.payment_action_required",
            "charge.pending",
        ] {
            assert_eq!(translator.translate(event_type).unwrap(), PaymentEvent::PaymentPending);
        }
    }

    #[test]
    fn unknown_type_is_a_validation_failure() {
        let err = StripeEventTranslator::new()
            .translate("customer.subscription.deleted")
            .unwrap_err();

        assert_eq!(err.code, ErrorCode::UnknownEventType);
        assert_eq!(err.details.get("field").map(String::as_str), Some("event_type"));
    }
}
