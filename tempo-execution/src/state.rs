use crate::error::ExecutionError;
use std::fmt::Display;

/// Rules for a typed finite-state machine: a total function from `(state, action)` to either a
/// new state or a rejection.
///
/// The Order FSM (see [`crate::order::OrderFsm`]) is the instance this crate ships; the `tempo`
/// crate defines the Strategy and Engine FSMs against the same abstraction (SPEC_FULL.md §4.C).
/// FSMs are single-threaded: concurrent misuse is a programming error, not a race this type
/// guards against.
pub trait FsmRules {
    type State: Clone + PartialEq + Display;
    type Action: Clone + Display;

    /// Returns the next state for `(state, action)`, or `None` if the transition is undefined.
    fn transition(state: &Self::State, action: &Self::Action) -> Option<Self::State>;
}

/// A [`FsmRules`]-governed state machine holding its current state.
#[derive(Debug, Clone, PartialEq)]
pub struct StateMachine<R: FsmRules> {
    state: R::State,
}

impl<R: FsmRules> StateMachine<R> {
    pub fn new(initial: R::State) -> Self {
        Self { state: initial }
    }

    pub fn state(&self) -> &R::State {
        &self.state
    }

    /// Apply `action`, transitioning in place on success. Returns
    /// [`ExecutionError::InvalidTransition`] without mutating state on failure.
    pub fn apply(&mut self, action: R::Action) -> Result<&R::State, ExecutionError> {
        match R::transition(&self.state, &action) {
            Some(next) => {
                self.state = next;
                Ok(&self.state)
            }
            None => Err(ExecutionError::InvalidTransition {
                state: self.state.to_string(),
                action: action.to_string(),
            }),
        }
    }
}
