//! Ports - Interfaces for external dependencies.
//!
//! Following hexagonal architecture, ports define the contracts between
//! the billing domain and the outside world. Adapters implement these ports.
//!
//! ## Persistence Ports
//!
//! - `SubscriptionRepository` - Subscription aggregates with optimistic versioning
//! - `PaymentReader` - Read access to payment histories
//!
//! ## Provider Ports
//!
//! - `WebhookEventLedger` - Idempotency tracking for provider events
//! - `EventTypeTranslator` - Provider event type to domain event mapping

mod event_type_translator;
mod payment_reader;
mod subscription_repository;
mod webhook_event_ledger;

pub use event_type_translator::EventTypeTranslator;
pub use payment_reader::PaymentReader;
pub use subscription_repository::SubscriptionRepository;
pub use webhook_event_ledger::{
    SaveResult, WebhookEventLedger, WebhookEventRecord, WebhookEventStatus,
};
