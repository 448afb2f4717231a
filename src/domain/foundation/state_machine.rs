//! State machine trait for status enums.
//!
//! Lifecycle statuses implement [`StateMachine`] to declare their legal
//! transitions once and get a checked `transition_to` for free.

use std::fmt;
use thiserror::Error;

/// Rejected transition between two states.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Cannot transition from {from} to {to}")]
pub struct InvalidTransition {
    pub from: String,
    pub to: String,
}

/// Trait for status enums that represent state machines.
///
/// ```ignore
/// let next = SubscriptionStatus::Active.transition_to(SubscriptionStatus::Inactive)?;
/// ```
pub trait StateMachine: Sized + Copy + PartialEq + fmt::Debug {
    /// Returns true if transition from self to target is valid.
    fn can_transition_to(&self, target: &Self) -> bool;

    /// Returns all valid target states from current state.
    fn valid_transitions(&self) -> Vec<Self>;

    /// Performs transition with validation, returning error if invalid.
    fn transition_to(&self, target: Self) -> Result<Self, InvalidTransition> {
        if self.can_transition_to(&target) {
            Ok(target)
        } else {
            Err(InvalidTransition {
                from: format!("{:?}", self),
                to: format!("{:?}", target),
            })
        }
    }

    /// Checks if current state is terminal (no valid outgoing transitions).
    fn is_terminal(&self) -> bool {
        self.valid_transitions().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum Light {
        Red,
        Green,
        Off,
    }

    impl StateMachine for Light {
        fn can_transition_to(&self, target: &Self) -> bool {
            use Light::*;
            matches!((self, target), (Red, Green) | (Green, Red) | (Red, Off) | (Green, Off))
        }

        fn valid_transitions(&self) -> Vec<Self> {
            use Light::*;
            match self {
                Red => vec![Green, Off],
                Green => vec![Red, Off],
                Off => vec![],
            }
        }
    }

    #[test]
    fn transition_to_succeeds_for_valid_transition() {
        assert_eq!(Light::Red.transition_to(Light::Green), Ok(Light::Green));
    }

    #[test]
    fn transition_to_reports_both_states_on_failure() {
        let err = Light::Off.transition_to(Light::Red).unwrap_err();
        assert_eq!(err.from, "Off");
        assert_eq!(err.to, "Red");
        assert_eq!(err.to_string(), "Cannot transition from Off to Red");
    }

    #[test]
    fn is_terminal_only_without_outgoing_transitions() {
        assert!(Light::Off.is_terminal());
        assert!(!Light::Red.is_terminal());
    }
}
