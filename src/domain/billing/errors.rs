//! Billing-specific error types.
//!
//! # Classification
//!
//! | Error | Retryable | Surfaced by `handle` |
//! |-------|-----------|----------------------|
//! | Validation | no | yes |
//! | CurrencyMismatch | no | yes |
//! | NotFound | no | yes |
//! | StateConflict | no | yes |
//! | DuplicateEvent | n/a | never (absorbed) |
//! | Infrastructure | yes | yes |

use thiserror::Error;

use crate::domain::foundation::{
    Currency, DomainError, ErrorCode, InvalidTransition, MoneyError, ValidationError,
};

/// Errors raised by the billing lifecycle.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BillingError {
    /// Malformed command or value.
    #[error("Validation failed for '{field}': {message}")]
    Validation { field: String, message: String },

    /// Two amounts in different currencies were combined.
    #[error("Currency mismatch: {expected} vs {actual}")]
    CurrencyMismatch { expected: Currency, actual: Currency },

    /// Referenced aggregate does not exist.
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// Operation is incompatible with the current lifecycle state.
    #[error("Cannot {attempted} subscription in {current} state")]
    StateConflict { current: String, attempted: String },

    /// Event is already recorded in the idempotency ledger.
    #[error("Duplicate event: {0}")]
    DuplicateEvent(String),

    /// Persistence or concurrency failure. Safe to retry.
    #[error("Infrastructure error: {0}")]
    Infrastructure(String),
}

impl BillingError {
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        BillingError::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn subscription_not_found(id: impl ToString) -> Self {
        BillingError::NotFound {
            entity: "Subscription",
            id: id.to_string(),
        }
    }

    pub fn state_conflict(current: impl Into<String>, attempted: impl Into<String>) -> Self {
        BillingError::StateConflict {
            current: current.into(),
            attempted: attempted.into(),
        }
    }

    pub fn infrastructure(message: impl Into<String>) -> Self {
        BillingError::Infrastructure(message.into())
    }

    /// Returns true if the caller may retry with the same input.
    pub fn is_retryable(&self) -> bool {
        matches!(self, BillingError::Infrastructure(_))
    }

    /// Returns the error code for this error.
    pub fn code(&self) -> ErrorCode {
        match self {
            BillingError::Validation { .. } => ErrorCode::ValidationFailed,
            BillingError::CurrencyMismatch { .. } => ErrorCode::CurrencyMismatch,
            BillingError::NotFound { .. } => ErrorCode::SubscriptionNotFound,
            BillingError::StateConflict { .. } => ErrorCode::InvalidStateTransition,
            BillingError::DuplicateEvent(_) => ErrorCode::DuplicateEvent,
            BillingError::Infrastructure(_) => ErrorCode::DatabaseError,
        }
    }
}

impl From<DomainError> for BillingError {
    fn from(err: DomainError) -> Self {
        match err.code {
            ErrorCode::ValidationFailed
            | ErrorCode::EmptyField
            | ErrorCode::InvalidFormat
            | ErrorCode::UnknownEventType => BillingError::Validation {
                field: err.details.get("field").cloned().unwrap_or_default(),
                message: err.message,
            },
            ErrorCode::CurrencyMismatch => BillingError::validation("currency", err.message),
            ErrorCode::SubscriptionNotFound | ErrorCode::WebhookEventNotFound => {
                BillingError::NotFound {
                    entity: "Resource",
                    id: err.details.get("id").cloned().unwrap_or(err.message),
                }
            }
            ErrorCode::InvalidStateTransition | ErrorCode::SubscriptionCancelled => {
                BillingError::StateConflict {
                    current: err.details.get("current").cloned().unwrap_or_default(),
                    attempted: err.message,
                }
            }
            ErrorCode::DuplicateEvent => BillingError::DuplicateEvent(err.message),
            ErrorCode::ConcurrencyConflict | ErrorCode::DatabaseError | ErrorCode::InternalError => {
                BillingError::Infrastructure(err.to_string())
            }
        }
    }
}

impl From<ValidationError> for BillingError {
    fn from(err: ValidationError) -> Self {
        BillingError::validation(err.field().to_string(), err.to_string())
    }
}

impl From<MoneyError> for BillingError {
    fn from(err: MoneyError) -> Self {
        match err {
            MoneyError::CurrencyMismatch { left, right } => BillingError::CurrencyMismatch {
                expected: left,
                actual: right,
            },
            MoneyError::Overflow => BillingError::validation("amount", "amount overflow"),
        }
    }
}

impl From<InvalidTransition> for BillingError {
    fn from(err: InvalidTransition) -> Self {
        BillingError::StateConflict {
            current: err.from,
            attempted: format!("transition to {}", err.to),
        }
    }
}
