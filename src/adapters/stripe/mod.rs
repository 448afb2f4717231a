//! Stripe payment provider adapter.
//!
//! Translates Stripe webhook events into payment event commands:
//! - Event type mapping (`StripeEventTranslator`)
//! - Envelope parsing and command construction (`StripeEvent`)
//!
//! Signature verification and HTTP delivery belong to the webhook transport
//! and are not handled here.

mod event_translator;
mod webhook_types;

pub use event_translator::StripeEventTranslator;
pub use webhook_types::{StripeEvent, StripeEventData, StripePaymentObject};
