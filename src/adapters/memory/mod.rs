//! In-memory adapters for tests and local development.
//!
//! State lives in `tokio::sync::RwLock`-guarded maps and is lost on drop.

mod subscription_store;
mod webhook_ledger;

pub use subscription_store::InMemorySubscriptionRepository;
pub use webhook_ledger::{InMemoryWebhookEventLedger, DEFAULT_STALE_CLAIM_SECS};
