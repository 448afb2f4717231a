//! Application handlers.
//!
//! Command handlers that orchestrate domain operations.

pub mod billing;

pub use billing::{
    HandlePaymentEventUseCase, PaymentEventCommand, PaymentEventProcessor, RenewalOutcome,
    RunRenewalsCommand, RunRenewalsHandler, RunRenewalsResult,
};
