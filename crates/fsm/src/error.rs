use thiserror::Error;

/// Raised while applying an event to a state machine.
#[derive(Debug, Error)]
pub enum TransitionError<S, K> {
    #[error("invalid state transition: event {event} not allowed in state {state}")]
    InvalidStateTransition { state: S, event: K },

    #[error("transition action for {event} in state {state} failed: {source}")]
    ActionFailed {
        state: S,
        event: K,
        #[source]
        source: ActionError,
    },
}

impl<S: Copy, K: Copy> TransitionError<S, K> {
    /// State the machine was in when the event was rejected.
    pub fn state(&self) -> S {
        match self {
            Self::InvalidStateTransition { state, .. } | Self::ActionFailed { state, .. } => *state,
        }
    }

    pub fn event(&self) -> K {
        match self {
            Self::InvalidStateTransition { event, .. } | Self::ActionFailed { event, .. } => *event,
        }
    }

    pub fn is_invalid_transition(&self) -> bool {
        matches!(self, Self::InvalidStateTransition { .. })
    }
}

/// Raised by a transition action. The transition is not committed.
#[derive(Debug, Error)]
pub enum ActionError {
    #[error("malformed event payload: {0}")]
    MalformedPayload(String),

    #[error("timestamp {at} precedes {floor}")]
    TimestampRegression { at: u64, floor: u64 },

    #[error("event for {actual} delivered to {expected}")]
    SubjectMismatch { expected: String, actual: String },
}

/// Raised while freezing a transition table.
#[derive(Debug, Error)]
pub enum TableError {
    #[error("duplicate transition in table '{table}': ({state}, {event})")]
    DuplicateTransition {
        table: &'static str,
        state: String,
        event: String,
    },
}
