//! Subscription status state machine.
//!
//! Defines all subscription states and the legal transitions between the
//! stored ones. `Expired` is derived from billing dates and never stored.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::domain::foundation::{StateMachine, ValidationError};

/// Subscription lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SubscriptionStatus {
    /// Created, waiting for the first successful payment.
    PendingActivation,

    /// Paid up and in service.
    Active,

    /// Suspended after a failed payment or manual deactivation.
    Inactive,

    /// Cancelled by the user. Terminal.
    Cancelled,

    /// Billing period elapsed. Computed from dates, never persisted.
    Expired,
}

impl SubscriptionStatus {
    /// Statuses that may appear in storage.
    pub fn is_storable(&self) -> bool {
        !matches!(self, SubscriptionStatus::Expired)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SubscriptionStatus::PendingActivation => "pending_activation",
            SubscriptionStatus::Active => "active",
            SubscriptionStatus::Inactive => "inactive",
            SubscriptionStatus::Cancelled => "cancelled",
            SubscriptionStatus::Expired => "expired",
        }
    }
}

impl StateMachine for SubscriptionStatus {
    fn can_transition_to(&self, target: &Self) -> bool {
        use SubscriptionStatus::*;
        matches!(
            (self, target),
            // From PENDING_ACTIVATION
            (PendingActivation, Active)
                | (PendingActivation, Inactive)
            // From ACTIVE
                | (Active, Active) // Renewal charge
                | (Active, Inactive)
                | (Active, Cancelled)
            // From INACTIVE
                | (Inactive, Active)
                | (Inactive, Inactive) // Repeated failure
                | (Inactive, Cancelled)
        )
    }

    fn valid_transitions(&self) -> Vec<Self> {
        use SubscriptionStatus::*;
        match self {
            PendingActivation => vec![Active, Inactive],
            Active => vec![Active, Inactive, Cancelled],
            Inactive => vec![Active, Inactive, Cancelled],
            Cancelled => vec![],
            Expired => vec![],
        }
    }
}

impl fmt::Display for SubscriptionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

impl FromStr for SubscriptionStatus {
    type Err = ValidationError;

    /// Parses a stored status. `expired` is rejected because it is never stored.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pending_activation" => Ok(SubscriptionStatus::PendingActivation),
            "active" => Ok(SubscriptionStatus::Active),
            "inactive" => Ok(SubscriptionStatus::Inactive),
            "cancelled" => Ok(SubscriptionStatus::Cancelled),
            other => Err(ValidationError::invalid_format(
                "subscription_status",
                format!("'{}' is not a stored status", other),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use SubscriptionStatus::*;

    const ALL: [SubscriptionStatus; 5] = [PendingActivation, Active, Inactive, Cancelled, Expired];

    #[test]
    fn pending_activation_can_activate_or_fail() {
        assert_eq!(PendingActivation.transition_to(Active), Ok(Active));
        assert_eq!(PendingActivation.transition_to(Inactive), Ok(Inactive));
    }

    #[test]
    fn pending_activation_cannot_cancel() {
        assert!(PendingActivation.transition_to(Cancelled).is_err());
    }

    #[test]
    fn active_and_inactive_can_cancel() {
        assert!(Active.can_transition_to(&Cancelled));
        assert!(Inactive.can_transition_to(&Cancelled));
    }

    #[test]
    fn cancelled_is_terminal() {
        assert!(Cancelled.is_terminal());
        for target in ALL {
            assert!(!Cancelled.can_transition_to(&target));
        }
    }

    #[test]
    fn expired_is_never_a_transition_target() {
        for status in ALL {
            assert!(!status.can_transition_to(&Expired));
        }
    }

    #[test]
    fn valid_transitions_are_consistent_with_can_transition_to() {
        for status in ALL {
            for target in ALL {
                assert_eq!(
                    status.valid_transitions().contains(&target),
                    status.can_transition_to(&target),
                    "{:?} -> {:?}",
                    status,
                    target
                );
            }
        }
    }

    #[test]
    fn stored_names_parse_back() {
        for status in [PendingActivation, Active, Inactive, Cancelled] {
            assert_eq!(status.as_str().parse::<SubscriptionStatus>().unwrap(), status);
        }
        assert!("expired".parse::<SubscriptionStatus>().is_err());
    }
}
