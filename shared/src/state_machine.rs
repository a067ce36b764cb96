//! Command Lifecycle State Machine
//!
//! Defines the valid transitions between command states. A command moves
//! `Pending -> Running -> Terminal`, and only an explicit restart brings a
//! terminal command back to `Pending`.

use crate::CommandState;

/// Events that can trigger state transitions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandEvent {
    /// The coordinator handed the command to a worker
    Dispatched,
    /// The worker reported the final result
    Finished,
    /// The operator asked for the command to run again
    Restarted,
}

/// Result of a state transition attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransitionResult {
    /// Transition was valid and state changed
    Success(CommandState),
    /// Transition was invalid from current state
    Invalid {
        from: CommandState,
        event: CommandEvent,
    },
}

impl TransitionResult {
    pub fn is_success(&self) -> bool {
        matches!(self, TransitionResult::Success(_))
    }
}

/// Get the next state for a given event, if the transition is valid
pub fn next_state(from: CommandState, event: CommandEvent) -> Option<CommandState> {
    use CommandEvent::*;
    use CommandState::*;

    match (from, event) {
        (Pending, Dispatched) => Some(Running),
        (Running, Finished) => Some(Terminal),
        (Terminal, Restarted) => Some(Pending),
        _ => None,
    }
}

/// Process an event against a state and return the transition result
pub fn process_event(from: CommandState, event: CommandEvent) -> TransitionResult {
    match next_state(from, event) {
        Some(state) => TransitionResult::Success(state),
        None => TransitionResult::Invalid { from, event },
    }
}

/// Check if a transition from one state to another is valid
pub fn is_valid_transition(from: CommandState, to: CommandState) -> bool {
    use CommandState::*;

    matches!(
        (from, to),
        (Pending, Running) | (Running, Terminal) | (Terminal, Pending)
    )
}
