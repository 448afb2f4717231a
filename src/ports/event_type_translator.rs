//! Event type translator port.
//!
//! Maps provider-specific event type strings onto the domain
//! [`PaymentEvent`] vocabulary. Each payment provider adapter supplies one.

use crate::domain::billing::PaymentEvent;
use crate::domain::foundation::DomainError;

/// Translates a provider event type into a [`PaymentEvent`].
pub trait EventTypeTranslator: Send + Sync {
    /// # Errors
    ///
    /// - `UnknownEventType` if the provider type has no domain meaning
    fn translate(&self, event_type: &str) -> Result<PaymentEvent, DomainError>;
}
