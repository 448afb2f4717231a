//! Foundation module - Shared domain primitives.
//!
//! Contains value objects, identifiers, and error types that form the
//! vocabulary of the billing domain.

mod errors;
mod ids;
mod money;
mod state_machine;
mod timestamp;

pub use errors::{DomainError, ErrorCode, ValidationError};
pub use ids::{PaymentId, SubscriptionId, UserId};
pub use money::{Currency, Money, MoneyError};
pub use state_machine::{InvalidTransition, StateMachine};
pub use timestamp::{today, Timestamp};
