//! Adapters - Implementations of port interfaces.
//!
//! Adapters connect the billing domain to external systems:
//! - `memory` - In-memory stores for tests and local development
//! - `postgres` - PostgreSQL persistence
//! - `stripe` - Stripe webhook event translation

pub mod memory;
pub mod postgres;
pub mod stripe;

pub use memory::{InMemorySubscriptionRepository, InMemoryWebhookEventLedger};
pub use stripe::{StripeEvent, StripeEventTranslator};
