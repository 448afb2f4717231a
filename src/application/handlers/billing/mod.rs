//! Billing handlers.
//!
//! ## Commands
//! - Applying provider payment events to subscriptions
//! - Renewing lapsed subscriptions in periodic sweeps

mod handle_payment_event;
mod run_renewals;

pub use handle_payment_event::{
    payment_from_command, HandlePaymentEventUseCase, PaymentEventCommand, PaymentEventProcessor,
    RenewalOutcome, DEFAULT_MAX_CONFLICT_RETRIES,
};
pub use run_renewals::{RunRenewalsCommand, RunRenewalsHandler, RunRenewalsResult};
