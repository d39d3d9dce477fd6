use std::collections::HashMap;

use crate::health::HostHealthStatus;
use crate::ids::ComponentHostKey;
use crate::state::{ComponentEventType, HostEventType};

// -- Host events --
// Built by the heartbeat handler from agent registrations and heartbeats,
// and by the heartbeat monitor for timeouts.

/// One mounted filesystem as reported by the agent.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct DiskInfo {
    pub device: String,
    pub mountpoint: String,
    #[serde(rename = "type")]
    pub fs_type: String,
    pub size: String,
    pub used: String,
    pub available: String,
    pub percent: String,
}

/// Host facts discovered by the agent and sent with its registration.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct HostInfo {
    pub hostname: String,
    pub ipv4: Option<String>,
    pub ipv6: Option<String>,
    pub physical_processor_count: u32,
    pub memory_total: u64,
    pub free_memory: u64,
    pub architecture: Option<String>,
    pub os: Option<String>,
    pub os_release: Option<String>,
    pub os_info: Option<String>,
    pub mounts: Vec<DiskInfo>,
    pub rack_info: Option<String>,
    pub attributes: HashMap<String, String>,
}

impl HostInfo {
    /// Parse an agent registration report.
    ///
    /// # Errors
    /// Returns a `serde_json::Error` if the bytes are not a valid report.
    pub fn from_json(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }
}

/// Variant-specific data of a [`HostEvent`].
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HostEventPayload {
    RegistrationRequest {
        host_info: HostInfo,
        agent_version: Option<String>,
        public_host_name: Option<String>,
    },
    Verified,
    StatusUpdatesReceived,
    HeartbeatHealthy,
    HeartbeatUnhealthy {
        health: HostHealthStatus,
    },
    HeartbeatTimedOut,
}

/// Something that happened to a host. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct HostEvent {
    pub host_name: String,
    /// Unix millis.
    pub timestamp: u64,
    pub payload: HostEventPayload,
}

impl HostEvent {
    pub fn new(host_name: impl Into<String>, timestamp: u64, payload: HostEventPayload) -> Self {
        Self {
            host_name: host_name.into(),
            timestamp,
            payload,
        }
    }

    pub fn registration(
        host_name: impl Into<String>,
        timestamp: u64,
        host_info: HostInfo,
        agent_version: Option<String>,
    ) -> Self {
        Self::new(
            host_name,
            timestamp,
            HostEventPayload::RegistrationRequest {
                host_info,
                agent_version,
                public_host_name: None,
            },
        )
    }

    pub fn verified(host_name: impl Into<String>, timestamp: u64) -> Self {
        Self::new(host_name, timestamp, HostEventPayload::Verified)
    }

    pub fn status_updates_received(host_name: impl Into<String>, timestamp: u64) -> Self {
        Self::new(host_name, timestamp, HostEventPayload::StatusUpdatesReceived)
    }

    pub fn heartbeat_healthy(host_name: impl Into<String>, timestamp: u64) -> Self {
        Self::new(host_name, timestamp, HostEventPayload::HeartbeatHealthy)
    }

    pub fn heartbeat_unhealthy(
        host_name: impl Into<String>,
        timestamp: u64,
        health: HostHealthStatus,
    ) -> Self {
        Self::new(
            host_name,
            timestamp,
            HostEventPayload::HeartbeatUnhealthy { health },
        )
    }

    pub fn heartbeat_timed_out(host_name: impl Into<String>, timestamp: u64) -> Self {
        Self::new(host_name, timestamp, HostEventPayload::HeartbeatTimedOut)
    }

    pub fn kind(&self) -> HostEventType {
        match self.payload {
            HostEventPayload::RegistrationRequest { .. } => HostEventType::RegistrationRequest,
            HostEventPayload::Verified => HostEventType::Verified,
            HostEventPayload::StatusUpdatesReceived => HostEventType::StatusUpdatesReceived,
            HostEventPayload::HeartbeatHealthy => HostEventType::HeartbeatHealthy,
            HostEventPayload::HeartbeatUnhealthy { .. } => HostEventType::HeartbeatUnhealthy,
            HostEventPayload::HeartbeatTimedOut => HostEventType::HeartbeatTimedOut,
        }
    }

    /// Identity of the host this event is about.
    pub fn subject(&self) -> &str {
        &self.host_name
    }
}

// -- Component events --
// Built by the operation scheduler from commands it issues and from the
// progress reports agents return for them.

/// Variant-specific data of a [`ComponentEvent`].
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ComponentEventPayload {
    Install {
        #[serde(default)]
        stack_version: Option<String>,
    },
    Start,
    Stop,
    Uninstall,
    Wipeout,
    OpInProgress,
    OpFailed,
    OpSucceeded,
    OpRestart,
}

/// Something that happened to a component on a host. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ComponentEvent {
    #[serde(flatten)]
    pub key: ComponentHostKey,
    /// Unix millis.
    pub timestamp: u64,
    pub payload: ComponentEventPayload,
}

impl ComponentEvent {
    pub fn new(key: ComponentHostKey, timestamp: u64, payload: ComponentEventPayload) -> Self {
        Self {
            key,
            timestamp,
            payload,
        }
    }

    /// Event of the given kind with default payload data.
    pub fn of_kind(key: ComponentHostKey, timestamp: u64, kind: ComponentEventType) -> Self {
        let payload = match kind {
            ComponentEventType::Install => ComponentEventPayload::Install {
                stack_version: None,
            },
            ComponentEventType::Start => ComponentEventPayload::Start,
            ComponentEventType::Stop => ComponentEventPayload::Stop,
            ComponentEventType::Uninstall => ComponentEventPayload::Uninstall,
            ComponentEventType::Wipeout => ComponentEventPayload::Wipeout,
            ComponentEventType::OpInProgress => ComponentEventPayload::OpInProgress,
            ComponentEventType::OpFailed => ComponentEventPayload::OpFailed,
            ComponentEventType::OpSucceeded => ComponentEventPayload::OpSucceeded,
            ComponentEventType::OpRestart => ComponentEventPayload::OpRestart,
        };
        Self::new(key, timestamp, payload)
    }

    pub fn install(key: ComponentHostKey, timestamp: u64, stack_version: Option<String>) -> Self {
        Self::new(
            key,
            timestamp,
            ComponentEventPayload::Install { stack_version },
        )
    }

    pub fn kind(&self) -> ComponentEventType {
        match self.payload {
            ComponentEventPayload::Install { .. } => ComponentEventType::Install,
            ComponentEventPayload::Start => ComponentEventType::Start,
            ComponentEventPayload::Stop => ComponentEventType::Stop,
            ComponentEventPayload::Uninstall => ComponentEventType::Uninstall,
            ComponentEventPayload::Wipeout => ComponentEventType::Wipeout,
            ComponentEventPayload::OpInProgress => ComponentEventType::OpInProgress,
            ComponentEventPayload::OpFailed => ComponentEventType::OpFailed,
            ComponentEventPayload::OpSucceeded => ComponentEventType::OpSucceeded,
            ComponentEventPayload::OpRestart => ComponentEventType::OpRestart,
        }
    }

    pub fn subject(&self) -> &ComponentHostKey {
        &self.key
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::health::HealthStatus;

    #[test]
    fn host_event_kind_follows_payload() {
        let health = HostHealthStatus::new(HealthStatus::Unhealthy, "ntp drift");
        let cases = [
            (
                HostEvent::registration("h1", 1, HostInfo::default(), None),
                HostEventType::RegistrationRequest,
            ),
            (HostEvent::verified("h1", 1), HostEventType::Verified),
            (
                HostEvent::status_updates_received("h1", 1),
                HostEventType::StatusUpdatesReceived,
            ),
            (
                HostEvent::heartbeat_healthy("h1", 1),
                HostEventType::HeartbeatHealthy,
            ),
            (
                HostEvent::heartbeat_unhealthy("h1", 1, health),
                HostEventType::HeartbeatUnhealthy,
            ),
            (
                HostEvent::heartbeat_timed_out("h1", 1),
                HostEventType::HeartbeatTimedOut,
            ),
        ];
        for (event, kind) in cases {
            assert_eq!(event.kind(), kind);
            assert_eq!(event.subject(), "h1");
        }
    }

    #[test]
    fn component_event_of_kind_matches_kind() {
        let key = ComponentHostKey::new("HDFS", "DATANODE", "h1");
        for kind in ComponentEventType::ALL {
            let event = ComponentEvent::of_kind(key.clone(), 3, kind);
            assert_eq!(event.kind(), kind);
            assert_eq!(event.subject(), &key);
        }
    }

    #[test]
    fn host_info_parses_agent_report() {
        let report = br#"{
            "hostname": "c6401.ambari.apache.org",
            "ipv4": "192.168.64.101",
            "physical_processor_count": 4,
            "memory_total": 8167616,
            "free_memory": 4001232,
            "architecture": "x86_64",
            "os": "CentOS",
            "os_release": "6.4",
            "mounts": [
                {"device": "/dev/sda1", "mountpoint": "/", "type": "ext4", "size": "51606140"}
            ],
            "attributes": {"kernel": "Linux"}
        }"#;
        let info = HostInfo::from_json(report).unwrap();
        assert_eq!(info.hostname, "c6401.ambari.apache.org");
        assert_eq!(info.physical_processor_count, 4);
        assert_eq!(info.mounts.len(), 1);
        assert_eq!(info.mounts[0].fs_type, "ext4");
        assert!(info.mounts[0].used.is_empty());
        assert_eq!(info.ipv6, None);
        assert_eq!(info.attributes["kernel"], "Linux");
    }

    #[test]
    fn host_info_rejects_garbage() {
        assert!(HostInfo::from_json(b"not json").is_err());
    }

    #[test]
    fn host_event_payload_is_tagged() {
        let event = HostEvent::heartbeat_timed_out("h1", 42);
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["payload"]["type"], "HEARTBEAT_TIMED_OUT");
        assert_eq!(json["timestamp"], 42);
    }

    #[test]
    fn component_event_flattens_key() {
        let key = ComponentHostKey::new("HDFS", "DATANODE", "h1");
        let event = ComponentEvent::install(key, 7, Some("HDP-2.0".to_string()));
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["service_name"], "HDFS");
        assert_eq!(json["host_name"], "h1");
        assert_eq!(json["payload"]["type"], "INSTALL");
        assert_eq!(json["payload"]["stack_version"], "HDP-2.0");

        let back: ComponentEvent = serde_json::from_value(json).unwrap();
        assert_eq!(back.kind(), ComponentEventType::Install);
    }
}
