//! PostgreSQL adapters - Database implementations for the billing ports.
//!
//! - `PostgresSubscriptionRepository` - Subscriptions and their payment history
//! - `PostgresPaymentReader` - Payment history queries
//! - `PostgresWebhookEventLedger` - Provider event idempotency ledger

mod payment_reader;
mod subscription_repository;
mod webhook_ledger;

pub use payment_reader::PostgresPaymentReader;
pub use subscription_repository::PostgresSubscriptionRepository;
pub use webhook_ledger::PostgresWebhookEventLedger;
