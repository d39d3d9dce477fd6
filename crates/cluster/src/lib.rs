//! Cluster hosts and component-on-host instances, each driven by a shared
//! transition table and guarded by its own read/write lock.
//!
//! Events enter through [`Host::handle_event`] and
//! [`ComponentHost::handle_event`], or through the [`Cluster`] registry which
//! routes them by subject.

mod cluster;
mod component;
mod error;
mod events;
mod health;
mod host;
mod ids;
mod state;

pub use cluster::{Cluster, ClusterHealthReport};
pub use component::{
    ComponentHost, ComponentHostSnapshot, ComponentRecord, ComponentTable, build_client_table,
    build_daemon_table,
};
pub use error::{ClusterError, ComponentTransitionError, HostTransitionError};
pub use events::{
    ComponentEvent, ComponentEventPayload, DiskInfo, HostEvent, HostEventPayload, HostInfo,
};
pub use health::{HealthStatus, HostHealthStatus};
pub use host::{
    DEFAULT_RACK, Host, HostRecord, HostSnapshot, HostTable, RegistrationFlow,
    build_status_updates_table, build_verification_table,
};
pub use ids::ComponentHostKey;
pub use state::{ComponentEventType, ComponentKind, ComponentState, HostEventType, HostState};
