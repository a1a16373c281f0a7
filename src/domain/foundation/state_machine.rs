//! State machine trait for lifecycle enums.

use super::ValidationError;

/// Trait for status enums that represent state machines.
///
/// Implementors declare the legal edges; callers get validated
/// transitions and terminal-state detection for free.
///
/// ```ignore
/// let next = ConnectionState::Authenticated.transition_to(ConnectionState::Active)?;
/// assert!(ConnectionState::Closed.is_terminal());
/// ```
pub trait StateMachine: Sized + Copy + PartialEq + std::fmt::Debug {
    /// Returns true if transition from self to target is valid.
    fn can_transition_to(&self, target: &Self) -> bool;

    /// Returns all valid target states from current state.
    fn valid_transitions(&self) -> Vec<Self>;

    /// Performs transition with validation, returning error if invalid.
    fn transition_to(&self, target: Self) -> Result<Self, ValidationError> {
        if self.can_transition_to(&target) {
            Ok(target)
        } else {
            Err(ValidationError::invalid_format(
                "state_transition",
                format!("Cannot transition from {:?} to {:?}", self, target),
            ))
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
    enum Door {
        Open,
        Shut,
        Welded,
    }

    impl StateMachine for Door {
        fn can_transition_to(&self, target: &Self) -> bool {
            self.valid_transitions().contains(target)
        }

        fn valid_transitions(&self) -> Vec<Self> {
            match self {
                Door::Open => vec![Door::Shut],
                Door::Shut => vec![Door::Open, Door::Welded],
                Door::Welded => vec![],
            }
        }
    }

    #[test]
    fn transition_to_accepts_declared_edge() {
        assert_eq!(Door::Open.transition_to(Door::Shut), Ok(Door::Shut));
    }

    #[test]
    fn transition_to_rejects_undeclared_edge() {
        let err = Door::Open.transition_to(Door::Welded).unwrap_err();
        assert!(err.to_string().contains("Cannot transition from Open to Welded"));
    }

    #[test]
    fn state_without_edges_is_terminal() {
        assert!(Door::Welded.is_terminal());
        assert!(!Door::Shut.is_terminal());
    }
}
