use std::time::Duration;

use crate::error::MonitorError;

/// Heartbeat monitor settings. Deserializable from YAML or JSON config files.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// A tracked host is lost once its last heartbeat is older than this.
    pub heartbeat_timeout_secs: u64,
    /// Delay between sweeps.
    pub check_interval_ms: u64,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            heartbeat_timeout_secs: 90,
            check_interval_ms: 10_000,
        }
    }
}

impl MonitorConfig {
    pub fn validate(&self) -> Result<(), MonitorError> {
        if self.heartbeat_timeout_secs == 0 {
            return Err(MonitorError::InvalidConfig(
                "heartbeat_timeout_secs must be positive".to_string(),
            ));
        }
        if self.check_interval_ms == 0 {
            return Err(MonitorError::InvalidConfig(
                "check_interval_ms must be positive".to_string(),
            ));
        }
        Ok(())
    }

    pub fn heartbeat_timeout(&self) -> Duration {
        Duration::from_secs(self.heartbeat_timeout_secs)
    }

    pub fn check_interval(&self) -> Duration {
        Duration::from_millis(self.check_interval_ms)
    }

    pub(crate) fn heartbeat_timeout_ms(&self) -> u64 {
        self.heartbeat_timeout_secs.saturating_mul(1_000)
    }
}
