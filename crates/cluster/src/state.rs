/// Host lifecycle state.
///
/// `WaitingForVerification` and `Verified` belong to the verification
/// registration flow; `WaitingForHostStatusUpdates` to the status-updates
/// flow. The remaining states are shared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HostState {
    Init,
    WaitingForVerification,
    Verified,
    WaitingForHostStatusUpdates,
    Healthy,
    Unhealthy,
    HeartbeatLost,
}

impl HostState {
    pub const ALL: [Self; 7] = [
        Self::Init,
        Self::WaitingForVerification,
        Self::Verified,
        Self::WaitingForHostStatusUpdates,
        Self::Healthy,
        Self::Unhealthy,
        Self::HeartbeatLost,
    ];

    /// States in which a missing heartbeat means the agent is gone.
    pub fn is_heartbeat_tracked(self) -> bool {
        matches!(
            self,
            Self::Verified | Self::WaitingForHostStatusUpdates | Self::Healthy | Self::Unhealthy
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Init => "INIT",
            Self::WaitingForVerification => "WAITING_FOR_VERIFICATION",
            Self::Verified => "VERIFIED",
            Self::WaitingForHostStatusUpdates => "WAITING_FOR_HOST_STATUS_UPDATES",
            Self::Healthy => "HEALTHY",
            Self::Unhealthy => "UNHEALTHY",
            Self::HeartbeatLost => "HEARTBEAT_LOST",
        }
    }
}

impl std::fmt::Display for HostState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Discriminant of a [`HostEvent`](crate::HostEvent).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HostEventType {
    RegistrationRequest,
    Verified,
    StatusUpdatesReceived,
    HeartbeatHealthy,
    HeartbeatUnhealthy,
    HeartbeatTimedOut,
}

impl HostEventType {
    pub const ALL: [Self; 6] = [
        Self::RegistrationRequest,
        Self::Verified,
        Self::StatusUpdatesReceived,
        Self::HeartbeatHealthy,
        Self::HeartbeatUnhealthy,
        Self::HeartbeatTimedOut,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::RegistrationRequest => "REGISTRATION_REQUEST",
            Self::Verified => "VERIFIED",
            Self::StatusUpdatesReceived => "STATUS_UPDATES_RECEIVED",
            Self::HeartbeatHealthy => "HEARTBEAT_HEALTHY",
            Self::HeartbeatUnhealthy => "HEARTBEAT_UNHEALTHY",
            Self::HeartbeatTimedOut => "HEARTBEAT_TIMED_OUT",
        }
    }
}

impl std::fmt::Display for HostEventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle state of one service component on one host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ComponentState {
    Init,
    Installing,
    Installed,
    InstallFailed,
    Starting,
    Started,
    StartFailed,
    Stopping,
    StopFailed,
    Uninstalling,
    Uninstalled,
    UninstallFailed,
    WipingOut,
    WipeoutFailed,
}

impl ComponentState {
    pub const ALL: [Self; 14] = [
        Self::Init,
        Self::Installing,
        Self::Installed,
        Self::InstallFailed,
        Self::Starting,
        Self::Started,
        Self::StartFailed,
        Self::Stopping,
        Self::StopFailed,
        Self::Uninstalling,
        Self::Uninstalled,
        Self::UninstallFailed,
        Self::WipingOut,
        Self::WipeoutFailed,
    ];

    /// An operation has been issued and has not yet reported an outcome.
    pub fn is_in_progress(self) -> bool {
        matches!(
            self,
            Self::Installing
                | Self::Starting
                | Self::Stopping
                | Self::Uninstalling
                | Self::WipingOut
        )
    }

    pub fn is_failed(self) -> bool {
        matches!(
            self,
            Self::InstallFailed
                | Self::StartFailed
                | Self::StopFailed
                | Self::UninstallFailed
                | Self::WipeoutFailed
        )
    }

    /// Neither in progress nor failed.
    pub fn is_stable(self) -> bool {
        !self.is_in_progress() && !self.is_failed()
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Init => "INIT",
            Self::Installing => "INSTALLING",
            Self::Installed => "INSTALLED",
            Self::InstallFailed => "INSTALL_FAILED",
            Self::Starting => "STARTING",
            Self::Started => "STARTED",
            Self::StartFailed => "START_FAILED",
            Self::Stopping => "STOPPING",
            Self::StopFailed => "STOP_FAILED",
            Self::Uninstalling => "UNINSTALLING",
            Self::Uninstalled => "UNINSTALLED",
            Self::UninstallFailed => "UNINSTALL_FAILED",
            Self::WipingOut => "WIPING_OUT",
            Self::WipeoutFailed => "WIPEOUT_FAILED",
        }
    }
}

impl std::fmt::Display for ComponentState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Discriminant of a [`ComponentEvent`](crate::ComponentEvent).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ComponentEventType {
    Install,
    Start,
    Stop,
    Uninstall,
    Wipeout,
    OpInProgress,
    OpFailed,
    OpSucceeded,
    OpRestart,
}

impl ComponentEventType {
    pub const ALL: [Self; 9] = [
        Self::Install,
        Self::Start,
        Self::Stop,
        Self::Uninstall,
        Self::Wipeout,
        Self::OpInProgress,
        Self::OpFailed,
        Self::OpSucceeded,
        Self::OpRestart,
    ];

    /// Commands that begin a new operation.
    pub fn is_verb(self) -> bool {
        matches!(
            self,
            Self::Install | Self::Start | Self::Stop | Self::Uninstall | Self::Wipeout
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Install => "INSTALL",
            Self::Start => "START",
            Self::Stop => "STOP",
            Self::Uninstall => "UNINSTALL",
            Self::Wipeout => "WIPEOUT",
            Self::OpInProgress => "OP_IN_PROGRESS",
            Self::OpFailed => "OP_FAILED",
            Self::OpSucceeded => "OP_SUCCEEDED",
            Self::OpRestart => "OP_RESTART",
        }
    }
}

impl std::fmt::Display for ComponentEventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Daemons run a process and can be started and stopped; clients are only
/// installed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComponentKind {
    Daemon,
    Client,
}
