use fleet_fsm::TransitionError;

use crate::ids::ComponentHostKey;
use crate::state::{ComponentEventType, ComponentState, HostEventType, HostState};

/// Rejected host event.
pub type HostTransitionError = TransitionError<HostState, HostEventType>;

/// Rejected component-on-host event.
pub type ComponentTransitionError = TransitionError<ComponentState, ComponentEventType>;

/// Errors for cluster registry operations and event routing.
#[derive(Debug, thiserror::Error)]
pub enum ClusterError {
    #[error("invalid host name: {0:?}")]
    InvalidHostName(String),

    #[error("host not found: {0}")]
    HostNotFound(String),

    #[error("host already exists: {0}")]
    DuplicateHost(String),

    #[error("component host not found: {0}")]
    ComponentHostNotFound(ComponentHostKey),

    #[error("component host already exists: {0}")]
    DuplicateComponentHost(ComponentHostKey),

    #[error(transparent)]
    HostTransition(#[from] HostTransitionError),

    #[error(transparent)]
    ComponentTransition(#[from] ComponentTransitionError),
}

impl ClusterError {
    /// The event was routed but the entity's table has no arc for it.
    pub fn is_invalid_transition(&self) -> bool {
        match self {
            Self::HostTransition(e) => e.is_invalid_transition(),
            Self::ComponentTransition(e) => e.is_invalid_transition(),
            _ => false,
        }
    }
}
