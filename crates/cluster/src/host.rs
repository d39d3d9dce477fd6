use std::collections::HashMap;
use std::sync::{Arc, LazyLock};

use fleet_fsm::{ActionError, StateMachine, TableError, TransitionError, TransitionTable};
use parking_lot::RwLock;

use crate::error::HostTransitionError;
use crate::events::{DiskInfo, HostEvent, HostEventPayload, HostInfo};
use crate::health::{HealthStatus, HostHealthStatus};
use crate::state::{HostEventType, HostState};

pub const DEFAULT_RACK: &str = "/default-rack";

pub type HostTable = TransitionTable<HostState, HostEventType, HostRecord, HostEvent>;

type HostMachine = StateMachine<HostState, HostEventType, HostRecord, HostEvent>;

/// How a freshly registered host reaches `HEALTHY`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegistrationFlow {
    /// `INIT -> WAITING_FOR_VERIFICATION -> VERIFIED`, then heartbeats.
    #[default]
    Verification,
    /// `INIT -> WAITING_FOR_HOST_STATUS_UPDATES`, healthy once the agent has
    /// reported component status. Agents re-register after losing heartbeat.
    StatusUpdates,
}

impl RegistrationFlow {
    pub fn table(self) -> &'static HostTable {
        match self {
            Self::Verification => &VERIFICATION_TABLE,
            Self::StatusUpdates => &STATUS_UPDATES_TABLE,
        }
    }
}

static VERIFICATION_TABLE: LazyLock<HostTable> =
    LazyLock::new(|| build_verification_table().expect("host verification table"));

static STATUS_UPDATES_TABLE: LazyLock<HostTable> =
    LazyLock::new(|| build_status_updates_table().expect("host status-updates table"));

/// Transition table for hosts that are verified before heartbeating.
///
/// # Errors
/// Returns [`TableError`] if the table declares an arc twice.
pub fn build_verification_table() -> Result<HostTable, TableError> {
    use HostEventType as E;
    use HostState as S;

    let live = [S::Verified, S::Healthy, S::Unhealthy];

    HostTable::builder("host-verification", S::Init)
        .add_transition_with(
            S::Init,
            S::WaitingForVerification,
            E::RegistrationRequest,
            registration_received,
        )
        .add_transition(S::WaitingForVerification, S::Verified, E::Verified)
        .add_transitions(
            &[S::Verified, S::Healthy, S::Unhealthy, S::HeartbeatLost],
            S::Healthy,
            E::HeartbeatHealthy,
            Some(became_healthy),
        )
        .add_transitions(&live, S::Unhealthy, E::HeartbeatUnhealthy, Some(became_unhealthy))
        .add_transitions(&live, S::HeartbeatLost, E::HeartbeatTimedOut, Some(heartbeat_lost))
        .add_transition(S::HeartbeatLost, S::HeartbeatLost, E::HeartbeatTimedOut)
        .install()
}

/// Transition table for hosts that become healthy once component status
/// arrives.
///
/// # Errors
/// Returns [`TableError`] if the table declares an arc twice.
pub fn build_status_updates_table() -> Result<HostTable, TableError> {
    use HostEventType as E;
    use HostState as S;

    HostTable::builder("host-status-updates", S::Init)
        .add_transition_with(
            S::Init,
            S::WaitingForHostStatusUpdates,
            E::RegistrationRequest,
            registration_received,
        )
        .add_transition_with(S::Init, S::HeartbeatLost, E::HeartbeatTimedOut, heartbeat_lost)
        // waiting for component status
        .add_transition_with(
            S::WaitingForHostStatusUpdates,
            S::Healthy,
            E::StatusUpdatesReceived,
            status_updates_received,
        )
        .add_transition_with(
            S::WaitingForHostStatusUpdates,
            S::WaitingForHostStatusUpdates,
            E::HeartbeatHealthy,
            heartbeat_received,
        )
        .add_transition_with(
            S::WaitingForHostStatusUpdates,
            S::WaitingForHostStatusUpdates,
            E::HeartbeatUnhealthy,
            became_unhealthy,
        )
        .add_transition_with(
            S::WaitingForHostStatusUpdates,
            S::HeartbeatLost,
            E::HeartbeatTimedOut,
            heartbeat_lost,
        )
        // steady state
        .add_transitions(
            &[S::Healthy, S::Unhealthy],
            S::Healthy,
            E::HeartbeatHealthy,
            Some(became_healthy),
        )
        .add_transitions(
            &[S::Healthy, S::Unhealthy],
            S::Unhealthy,
            E::HeartbeatUnhealthy,
            Some(became_unhealthy),
        )
        .add_transitions(
            &[S::Healthy, S::Unhealthy],
            S::HeartbeatLost,
            E::HeartbeatTimedOut,
            Some(heartbeat_lost),
        )
        .add_transitions(
            &[S::Healthy, S::Unhealthy, S::HeartbeatLost],
            S::WaitingForHostStatusUpdates,
            E::RegistrationRequest,
            Some(registration_received),
        )
        .add_transition(S::HeartbeatLost, S::HeartbeatLost, E::HeartbeatTimedOut)
        .install()
}

// -- Transition actions --

fn registration_received(host: &mut HostRecord, event: &HostEvent) -> Result<(), ActionError> {
    let HostEventPayload::RegistrationRequest {
        host_info,
        agent_version,
        public_host_name,
    } = &event.payload
    else {
        return Err(unexpected_payload(event));
    };

    host.import_host_info(host_info)?;
    // the registration counts as the first heartbeat
    host.record_heartbeat(event.timestamp)?;
    host.last_registration_time = Some(event.timestamp);
    host.agent_version.clone_from(agent_version);
    if let Some(name) = non_empty(public_host_name) {
        host.public_host_name = Some(name.to_string());
    }

    tracing::info!(
        host = %host.host_name,
        registration_time = event.timestamp,
        agent_version = agent_version.as_deref().unwrap_or("unknown"),
        "received host registration"
    );
    Ok(())
}

fn status_updates_received(host: &mut HostRecord, event: &HostEvent) -> Result<(), ActionError> {
    tracing::debug!(
        host = %host.host_name,
        heartbeat_time = event.timestamp,
        "host status updates received"
    );
    host.health_status = host.health_status.with_status(HealthStatus::Healthy);
    Ok(())
}

fn heartbeat_received(host: &mut HostRecord, event: &HostEvent) -> Result<(), ActionError> {
    host.record_heartbeat(event.timestamp)
}

fn became_healthy(host: &mut HostRecord, event: &HostEvent) -> Result<(), ActionError> {
    if !matches!(event.payload, HostEventPayload::HeartbeatHealthy) {
        return Err(unexpected_payload(event));
    }
    host.record_heartbeat(event.timestamp)?;
    host.health_status = host.health_status.with_status(HealthStatus::Healthy);
    Ok(())
}

fn became_unhealthy(host: &mut HostRecord, event: &HostEvent) -> Result<(), ActionError> {
    let HostEventPayload::HeartbeatUnhealthy { health } = &event.payload else {
        return Err(unexpected_payload(event));
    };
    tracing::debug!(
        host = %host.host_name,
        heartbeat_time = event.timestamp,
        health_status = %health.status,
        "host reported unhealthy"
    );
    host.record_heartbeat(event.timestamp)?;
    host.health_status = health.clone();
    Ok(())
}

fn heartbeat_lost(host: &mut HostRecord, _event: &HostEvent) -> Result<(), ActionError> {
    tracing::debug!(
        host = %host.host_name,
        last_heartbeat_time = ?host.last_heartbeat_time,
        "host heartbeat lost"
    );
    host.health_status = host.health_status.with_status(HealthStatus::Unknown);
    Ok(())
}

fn unexpected_payload(event: &HostEvent) -> ActionError {
    ActionError::MalformedPayload(format!(
        "{} payload for host {}",
        event.kind(),
        event.host_name
    ))
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}

// -- Entity --

/// Mutable fields of a host. Transition actions operate on a draft copy that
/// replaces the live record only when the action succeeds.
#[derive(Debug, Clone, PartialEq)]
pub struct HostRecord {
    host_name: String,
    public_host_name: Option<String>,
    ipv4: Option<String>,
    ipv6: Option<String>,
    cpu_count: u32,
    total_mem_bytes: u64,
    available_mem_bytes: u64,
    os_arch: Option<String>,
    os_type: Option<String>,
    os_info: Option<String>,
    // shared so the per-event draft clone does not copy them
    disks: Arc<Vec<DiskInfo>>,
    rack_info: String,
    host_attributes: Arc<HashMap<String, String>>,
    health_status: HostHealthStatus,
    last_registration_time: Option<u64>,
    last_heartbeat_time: Option<u64>,
    agent_version: Option<String>,
    time_in_state: Option<u64>,
}

impl HostRecord {
    fn new(host_name: String) -> Self {
        Self {
            host_name,
            public_host_name: None,
            ipv4: None,
            ipv6: None,
            cpu_count: 0,
            total_mem_bytes: 0,
            available_mem_bytes: 0,
            os_arch: None,
            os_type: None,
            os_info: None,
            disks: Arc::default(),
            rack_info: DEFAULT_RACK.to_string(),
            host_attributes: Arc::default(),
            health_status: HostHealthStatus::default(),
            last_registration_time: None,
            last_heartbeat_time: None,
            agent_version: None,
            time_in_state: None,
        }
    }

    /// Heartbeat time never moves backwards.
    fn record_heartbeat(&mut self, at: u64) -> Result<(), ActionError> {
        if let Some(floor) = self.last_heartbeat_time
            && at < floor
        {
            return Err(ActionError::TimestampRegression { at, floor });
        }
        self.last_heartbeat_time = Some(at);
        Ok(())
    }

    fn import_host_info(&mut self, info: &HostInfo) -> Result<(), ActionError> {
        if !info.hostname.is_empty() && !info.hostname.eq_ignore_ascii_case(&self.host_name) {
            return Err(ActionError::MalformedPayload(format!(
                "registration for host '{}' delivered to host '{}'",
                info.hostname, self.host_name
            )));
        }

        if let Some(ip) = non_empty(&info.ipv4) {
            self.ipv4 = Some(ip.to_string());
        }
        if let Some(ip) = non_empty(&info.ipv6) {
            self.ipv6 = Some(ip.to_string());
        }

        self.cpu_count = info.physical_processor_count;
        self.total_mem_bytes = info.memory_total;
        self.available_mem_bytes = info.free_memory;

        if let Some(arch) = non_empty(&info.architecture) {
            self.os_arch = Some(arch.to_string());
        }
        if let Some(os) = non_empty(&info.os) {
            let mut os_type = os.to_string();
            if let Some(major) = info
                .os_release
                .as_deref()
                .and_then(|release| release.split('.').next())
            {
                os_type.push_str(major);
            }
            self.os_type = Some(os_type.to_lowercase());
        }
        if let Some(os_info) = non_empty(&info.os_info) {
            self.os_info = Some(os_info.to_string());
        }
        if !info.mounts.is_empty() {
            self.disks = Arc::new(info.mounts.clone());
        }
        if let Some(rack) = non_empty(&info.rack_info) {
            self.rack_info = rack.to_string();
        }
        if !info.attributes.is_empty() {
            self.host_attributes = Arc::new(info.attributes.clone());
        }
        Ok(())
    }
}

/// Point-in-time view of a host, taken under a single read lock.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct HostSnapshot {
    pub host_name: String,
    pub flow: RegistrationFlow,
    pub state: HostState,
    pub public_host_name: Option<String>,
    pub ipv4: Option<String>,
    pub ipv6: Option<String>,
    pub cpu_count: u32,
    pub total_mem_bytes: u64,
    pub available_mem_bytes: u64,
    pub os_arch: Option<String>,
    pub os_type: Option<String>,
    pub os_info: Option<String>,
    pub disks: Vec<DiskInfo>,
    pub rack_info: String,
    pub host_attributes: HashMap<String, String>,
    pub health_status: HostHealthStatus,
    pub last_registration_time: Option<u64>,
    pub last_heartbeat_time: Option<u64>,
    pub agent_version: Option<String>,
    pub time_in_state: Option<u64>,
}

struct HostInner {
    machine: HostMachine,
    record: HostRecord,
}

/// A cluster host (agent) and its lifecycle state machine.
///
/// Getters take the read lock; setters and [`Host::handle_event`] take the
/// write lock. Locks are per host.
pub struct Host {
    host_name: String,
    flow: RegistrationFlow,
    inner: RwLock<HostInner>,
}

impl Host {
    /// New host in `INIT` using the verification flow.
    pub fn new(host_name: impl Into<String>) -> Self {
        Self::with_flow(host_name, RegistrationFlow::Verification)
    }

    pub fn with_flow(host_name: impl Into<String>, flow: RegistrationFlow) -> Self {
        let host_name = host_name.into();
        Self {
            inner: RwLock::new(HostInner {
                machine: StateMachine::new(flow.table()),
                record: HostRecord::new(host_name.clone()),
            }),
            host_name,
            flow,
        }
    }

    /// Apply `event` and return the resulting state.
    ///
    /// # Errors
    /// Returns the transition error if the event names another host, the
    /// current state has no arc for the event, or the bound action rejects
    /// it. Nothing is mutated in that case.
    pub fn handle_event(&self, event: &HostEvent) -> Result<HostState, HostTransitionError> {
        tracing::debug!(host = %self.host_name, event = %event.kind(), "handling host event");
        let mut inner = self.inner.write();
        self.apply(&mut inner, event)
    }

    /// Time the host out if it is in a heartbeat-tracked state and its last
    /// heartbeat is older than `timeout_ms` at `now_ms`. Staleness is judged
    /// under the write lock, so a heartbeat that lands first wins.
    ///
    /// Returns `Ok(None)` when the host is untracked or fresh.
    pub fn time_out_if_stale(
        &self,
        now_ms: u64,
        timeout_ms: u64,
    ) -> Result<Option<HostState>, HostTransitionError> {
        let mut inner = self.inner.write();
        if !inner.machine.current_state().is_heartbeat_tracked() {
            return Ok(None);
        }
        if let Some(last) = inner.record.last_heartbeat_time
            && now_ms.saturating_sub(last) <= timeout_ms
        {
            return Ok(None);
        }

        let event = HostEvent::heartbeat_timed_out(self.host_name.clone(), now_ms);
        self.apply(&mut inner, &event).map(Some)
    }

    fn apply(
        &self,
        inner: &mut HostInner,
        event: &HostEvent,
    ) -> Result<HostState, HostTransitionError> {
        let kind = event.kind();
        let HostInner { machine, record } = inner;
        let old_state = machine.current_state();

        let result = if event.subject() == self.host_name {
            machine.do_transition(kind, record, event)
        } else {
            Err(TransitionError::ActionFailed {
                state: old_state,
                event: kind,
                source: ActionError::SubjectMismatch {
                    expected: self.host_name.clone(),
                    actual: event.subject().to_string(),
                },
            })
        };

        match result {
            Ok(new_state) => {
                if new_state != old_state {
                    record.time_in_state = Some(event.timestamp);
                    tracing::debug!(
                        host = %self.host_name,
                        old_state = %old_state,
                        state = %new_state,
                        event = %kind,
                        "host transitioned to a new state"
                    );
                }
                Ok(new_state)
            }
            Err(e) => {
                tracing::error!(
                    host = %self.host_name,
                    state = %old_state,
                    event = %kind,
                    error = %e,
                    "can't handle host event at current state"
                );
                Err(e)
            }
        }
    }

    fn read<T>(&self, f: impl FnOnce(&HostRecord) -> T) -> T {
        f(&self.inner.read().record)
    }

    fn write(&self, f: impl FnOnce(&mut HostRecord)) {
        f(&mut self.inner.write().record);
    }

    pub fn host_name(&self) -> &str {
        &self.host_name
    }

    pub fn flow(&self) -> RegistrationFlow {
        self.flow
    }

    pub fn state(&self) -> HostState {
        self.inner.read().machine.current_state()
    }

    /// Overwrite the state without validation. For rehydration and
    /// administrative correction only.
    pub fn set_state(&self, state: HostState) {
        let mut inner = self.inner.write();
        tracing::warn!(
            host = %self.host_name,
            old_state = %inner.machine.current_state(),
            state = %state,
            "host state overridden"
        );
        inner.machine.set_current_state(state);
    }

    /// State and last heartbeat time read together.
    pub fn liveness(&self) -> (HostState, Option<u64>) {
        let inner = self.inner.read();
        (
            inner.machine.current_state(),
            inner.record.last_heartbeat_time,
        )
    }

    /// State and health status read together.
    pub fn health_summary(&self) -> (HostState, HealthStatus) {
        let inner = self.inner.read();
        (
            inner.machine.current_state(),
            inner.record.health_status.status,
        )
    }

    pub fn public_host_name(&self) -> Option<String> {
        self.read(|r| r.public_host_name.clone())
    }

    pub fn set_public_host_name(&self, name: impl Into<String>) {
        let name = name.into();
        self.write(|r| r.public_host_name = Some(name));
    }

    pub fn ipv4(&self) -> Option<String> {
        self.read(|r| r.ipv4.clone())
    }

    pub fn ipv6(&self) -> Option<String> {
        self.read(|r| r.ipv6.clone())
    }

    pub fn cpu_count(&self) -> u32 {
        self.read(|r| r.cpu_count)
    }

    pub fn total_mem_bytes(&self) -> u64 {
        self.read(|r| r.total_mem_bytes)
    }

    pub fn available_mem_bytes(&self) -> u64 {
        self.read(|r| r.available_mem_bytes)
    }

    pub fn os_arch(&self) -> Option<String> {
        self.read(|r| r.os_arch.clone())
    }

    pub fn os_type(&self) -> Option<String> {
        self.read(|r| r.os_type.clone())
    }

    pub fn os_info(&self) -> Option<String> {
        self.read(|r| r.os_info.clone())
    }

    pub fn disks(&self) -> Vec<DiskInfo> {
        self.read(|r| r.disks.to_vec())
    }

    pub fn rack_info(&self) -> String {
        self.read(|r| r.rack_info.clone())
    }

    pub fn set_rack_info(&self, rack: impl Into<String>) {
        let rack = rack.into();
        self.write(|r| r.rack_info = rack);
    }

    pub fn host_attributes(&self) -> HashMap<String, String> {
        self.read(|r| (*r.host_attributes).clone())
    }

    /// Merge `attributes` into the existing map.
    pub fn set_host_attributes(&self, attributes: HashMap<String, String>) {
        self.write(|r| Arc::make_mut(&mut r.host_attributes).extend(attributes));
    }

    pub fn health_status(&self) -> HostHealthStatus {
        self.read(|r| r.health_status.clone())
    }

    pub fn set_health_status(&self, health: HostHealthStatus) {
        self.write(|r| r.health_status = health);
    }

    pub fn last_registration_time(&self) -> Option<u64> {
        self.read(|r| r.last_registration_time)
    }

    pub fn last_heartbeat_time(&self) -> Option<u64> {
        self.read(|r| r.last_heartbeat_time)
    }

    pub fn set_last_heartbeat_time(&self, time: u64) {
        self.write(|r| r.last_heartbeat_time = Some(time));
    }

    pub fn agent_version(&self) -> Option<String> {
        self.read(|r| r.agent_version.clone())
    }

    /// Timestamp of the event that moved the host into its current state.
    pub fn time_in_state(&self) -> Option<u64> {
        self.read(|r| r.time_in_state)
    }

    pub fn snapshot(&self) -> HostSnapshot {
        let inner = self.inner.read();
        let r = &inner.record;
        HostSnapshot {
            host_name: self.host_name.clone(),
            flow: self.flow,
            state: inner.machine.current_state(),
            public_host_name: r.public_host_name.clone(),
            ipv4: r.ipv4.clone(),
            ipv6: r.ipv6.clone(),
            cpu_count: r.cpu_count,
            total_mem_bytes: r.total_mem_bytes,
            available_mem_bytes: r.available_mem_bytes,
            os_arch: r.os_arch.clone(),
            os_type: r.os_type.clone(),
            os_info: r.os_info.clone(),
            disks: r.disks.to_vec(),
            rack_info: r.rack_info.clone(),
            host_attributes: (*r.host_attributes).clone(),
            health_status: r.health_status.clone(),
            last_registration_time: r.last_registration_time,
            last_heartbeat_time: r.last_heartbeat_time,
            agent_version: r.agent_version.clone(),
            time_in_state: r.time_in_state,
        }
    }
}

impl std::fmt::Debug for Host {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Host")
            .field("host_name", &self.host_name)
            .field("flow", &self.flow)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}
