//! Billing domain module.
//!
//! Handles the subscription lifecycle, payment history, payment totals and
//! renewal decisions.
//!
//! # Module Structure
//!
//! - `subscription` - Subscription aggregate entity
//! - `subscription_status` - SubscriptionStatus state machine
//! - `payment` - Payment entity and append-only history
//! - `payment_status` - PaymentStatus enumeration
//! - `payment_event` - Provider-neutral payment events
//! - `plan` - Subscription types and payment methods
//! - `calculation` - Paid and pending totals
//! - `renewal` - Renewal eligibility and renewal payments

mod calculation;
mod errors;
mod payment;
mod payment_event;
mod payment_status;
mod plan;
mod renewal;
mod subscription;
mod subscription_status;

pub use calculation::{fully_paid, pending_amount, total_paid, PaymentCalculationService};
pub use errors::BillingError;
pub use payment::{Payment, PaymentHistory};
pub use payment_event::PaymentEvent;
pub use payment_status::PaymentStatus;
pub use plan::{PaymentMethod, SubscriptionType};
pub use renewal::SubscriptionRenewalService;
pub use subscription::{Subscription, SubscriptionSnapshot};
pub use subscription_status::SubscriptionStatus;
