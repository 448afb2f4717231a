//! Stripe-specific types for payment webhooks.
//!
//! These types represent the parts of a Stripe event envelope the billing
//! core reads. They:
//! - Parse actual Stripe JSON, ignoring fields we do not use
//! - Map to a [`PaymentEventCommand`] for the processor
//! - Keep the Stripe event ID as the idempotency key

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::application::PaymentEventCommand;
use crate::domain::billing::BillingError;
use crate::domain::foundation::{Currency, Money, SubscriptionId, Timestamp, UserId};
use crate::ports::EventTypeTranslator;

// ════════════════════════════════════════════════════════════════════════════════
// Stripe Event Types
// ════════════════════════════════════════════════════════════════════════════════

/// Stripe webhook event envelope.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StripeEvent {
    /// Unique event identifier (evt_...).
    pub id: String,

    /// Event type (e.g., "invoice.paid").
    #[serde(rename = "type")]
    pub event_type: String,

    /// Unix timestamp when the event was created.
    pub created: i64,

    pub data: StripeEventData,

    #[serde(default)]
    pub livemode: bool,
}

/// Event data container.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StripeEventData {
    pub object: StripePaymentObject,
}

/// Invoice, payment intent or charge, reduced to what billing needs.
///
/// Invoices carry `amount_paid`; payment intents and charges carry `amount`.
/// Both are integer minor units.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct StripePaymentObject {
    pub id: Option<String>,

    pub amount_paid: Option<i64>,

    pub amount: Option<i64>,

    /// Lowercase ISO currency code (e.g. "usd").
    pub currency: Option<String>,

    /// Metadata set when the charge was created. Billing reads
    /// `subscription_id` and `user_id`.
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

impl StripePaymentObject {
    /// Settled amount, if the object carries one.
    pub fn money(&self) -> Result<Option<Money>, BillingError> {
        let Some(units) = self.amount_paid.or(self.amount) else {
            return Ok(None);
        };
        let code = self
            .currency
            .as_deref()
            .ok_or_else(|| BillingError::validation("currency", "amount without currency"))?;
        Ok(Some(Money::from_minor_units(units, Currency::new(code)?)))
    }
}

impl StripeEvent {
    /// Build the processor command for this event.
    ///
    /// # Errors
    ///
    /// `Validation` if the type is not a payment event or the metadata,
    /// amount or timestamp is malformed.
    pub fn into_command(
        self,
        translator: &dyn EventTypeTranslator,
    ) -> Result<PaymentEventCommand, BillingError> {
        let event = translator.translate(&self.event_type)?;
        let object = &self.data.object;

        let subscription_id = object
            .metadata
            .get("subscription_id")
            .map(|raw| {
                raw.parse::<SubscriptionId>().map_err(|e| {
                    BillingError::validation("subscription_id", format!("'{}': {}", raw, e))
                })
            })
            .transpose()?;
        let user_id = object
            .metadata
            .get("user_id")
            .map(UserId::new)
            .transpose()?;
        let amount = object.money()?;
        let event_occurred_at = Timestamp::from_unix_secs(self.created).ok_or_else(|| {
            BillingError::validation("created", format!("{} is not a valid timestamp", self.created))
        })?;

        Ok(PaymentEventCommand {
            external_payment_id: self.id,
            subscription_id,
            user_id,
            event,
            amount,
            event_occurred_at,
        })
    }
}
