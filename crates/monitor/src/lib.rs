//! Periodic heartbeat check for cluster hosts.
//!
//! Hosts that have not heartbeated within the configured timeout receive a
//! `HEARTBEAT_TIMED_OUT` event, moving them to `HEARTBEAT_LOST`.

mod config;
mod error;
mod monitor;

pub use config::MonitorConfig;
pub use error::MonitorError;
pub use monitor::{HeartbeatMonitor, SweepReport};
