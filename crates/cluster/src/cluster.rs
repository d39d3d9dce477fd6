use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use parking_lot::RwLock;

use crate::component::ComponentHost;
use crate::error::ClusterError;
use crate::events::{ComponentEvent, HostEvent};
use crate::health::HealthStatus;
use crate::host::{Host, RegistrationFlow};
use crate::ids::{ComponentHostKey, check_host_name};
use crate::state::{ComponentKind, ComponentState, HostState};

/// Host counts by lifecycle state and by reported health.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ClusterHealthReport {
    pub healthy_state_hosts: usize,
    pub unhealthy_state_hosts: usize,
    pub init_state_hosts: usize,
    pub heartbeat_lost_state_hosts: usize,
    /// Registered but not yet heartbeating normally.
    pub waiting_state_hosts: usize,
    pub healthy_status_hosts: usize,
    pub unhealthy_status_hosts: usize,
    pub unknown_status_hosts: usize,
}

impl ClusterHealthReport {
    fn count(&mut self, state: HostState, status: HealthStatus) {
        match state {
            HostState::Healthy => self.healthy_state_hosts += 1,
            HostState::Unhealthy => self.unhealthy_state_hosts += 1,
            HostState::Init => self.init_state_hosts += 1,
            HostState::HeartbeatLost => self.heartbeat_lost_state_hosts += 1,
            HostState::WaitingForVerification
            | HostState::Verified
            | HostState::WaitingForHostStatusUpdates => self.waiting_state_hosts += 1,
        }
        match status {
            HealthStatus::Healthy => self.healthy_status_hosts += 1,
            HealthStatus::Unhealthy => self.unhealthy_status_hosts += 1,
            HealthStatus::Unknown => self.unknown_status_hosts += 1,
        }
    }

    pub fn total_hosts(&self) -> usize {
        self.healthy_state_hosts
            + self.unhealthy_state_hosts
            + self.init_state_hosts
            + self.heartbeat_lost_state_hosts
            + self.waiting_state_hosts
    }
}

/// Registry of the hosts and component hosts of one cluster.
///
/// The maps are guarded by their own locks, which are only held long enough
/// to clone an entity handle out. Events are applied under the entity's lock
/// alone, so traffic for different entities never contends. When both map
/// locks are needed, `hosts` is taken before `component_hosts`.
pub struct Cluster {
    name: String,
    hosts: RwLock<BTreeMap<String, Arc<Host>>>,
    component_hosts: RwLock<HashMap<ComponentHostKey, Arc<ComponentHost>>>,
}

impl Cluster {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            hosts: RwLock::new(BTreeMap::new()),
            component_hosts: RwLock::new(HashMap::new()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Add a host in `INIT`.
    ///
    /// # Errors
    /// [`ClusterError::InvalidHostName`] or [`ClusterError::DuplicateHost`].
    pub fn add_host(
        &self,
        host_name: &str,
        flow: RegistrationFlow,
    ) -> Result<Arc<Host>, ClusterError> {
        check_host_name(host_name)?;
        let mut hosts = self.hosts.write();
        if hosts.contains_key(host_name) {
            return Err(ClusterError::DuplicateHost(host_name.to_string()));
        }
        let host = Arc::new(Host::with_flow(host_name, flow));
        hosts.insert(host_name.to_string(), Arc::clone(&host));
        tracing::info!(cluster = %self.name, host = %host_name, ?flow, "added host");
        Ok(host)
    }

    /// # Errors
    /// [`ClusterError::HostNotFound`] if the host is not registered.
    pub fn host(&self, host_name: &str) -> Result<Arc<Host>, ClusterError> {
        self.hosts
            .read()
            .get(host_name)
            .cloned()
            .ok_or_else(|| ClusterError::HostNotFound(host_name.to_string()))
    }

    /// All hosts, ordered by name.
    pub fn hosts(&self) -> Vec<Arc<Host>> {
        self.hosts.read().values().cloned().collect()
    }

    /// Remove a host together with every component mapped to it.
    ///
    /// # Errors
    /// [`ClusterError::HostNotFound`] if the host is not registered.
    pub fn remove_host(&self, host_name: &str) -> Result<Arc<Host>, ClusterError> {
        let mut hosts = self.hosts.write();
        let host = hosts
            .remove(host_name)
            .ok_or_else(|| ClusterError::HostNotFound(host_name.to_string()))?;

        let mut component_hosts = self.component_hosts.write();
        let before = component_hosts.len();
        component_hosts.retain(|key, _| key.host_name != host_name);

        tracing::info!(
            cluster = %self.name,
            host = %host_name,
            components = before - component_hosts.len(),
            "removed host"
        );
        Ok(host)
    }

    /// Map a component onto an existing host, in `INIT`.
    ///
    /// # Errors
    /// [`ClusterError::HostNotFound`] or [`ClusterError::DuplicateComponentHost`].
    pub fn add_component_host(
        &self,
        service_name: &str,
        component_name: &str,
        host_name: &str,
        kind: ComponentKind,
    ) -> Result<Arc<ComponentHost>, ClusterError> {
        let hosts = self.hosts.read();
        if !hosts.contains_key(host_name) {
            return Err(ClusterError::HostNotFound(host_name.to_string()));
        }

        let key = ComponentHostKey::new(service_name, component_name, host_name);
        let mut component_hosts = self.component_hosts.write();
        if component_hosts.contains_key(&key) {
            return Err(ClusterError::DuplicateComponentHost(key));
        }
        let component = Arc::new(ComponentHost::new(key.clone(), kind));
        component_hosts.insert(key, Arc::clone(&component));
        tracing::info!(
            cluster = %self.name,
            component = %component.key(),
            ?kind,
            "added component host"
        );
        Ok(component)
    }

    /// # Errors
    /// [`ClusterError::ComponentHostNotFound`] if no such mapping exists.
    pub fn component_host(
        &self,
        service_name: &str,
        component_name: &str,
        host_name: &str,
    ) -> Result<Arc<ComponentHost>, ClusterError> {
        self.component_host_by_key(&ComponentHostKey::new(
            service_name,
            component_name,
            host_name,
        ))
    }

    fn component_host_by_key(
        &self,
        key: &ComponentHostKey,
    ) -> Result<Arc<ComponentHost>, ClusterError> {
        self.component_hosts
            .read()
            .get(key)
            .cloned()
            .ok_or_else(|| ClusterError::ComponentHostNotFound(key.clone()))
    }

    /// Components mapped to `host_name`, ordered by service then component.
    pub fn component_hosts_on(&self, host_name: &str) -> Vec<Arc<ComponentHost>> {
        let mut found: Vec<_> = self
            .component_hosts
            .read()
            .values()
            .filter(|c| c.host_name() == host_name)
            .cloned()
            .collect();
        found.sort_by(|a, b| a.key().cmp(b.key()));
        found
    }

    /// Route a host event to its host.
    ///
    /// # Errors
    /// [`ClusterError::HostNotFound`] for an unknown host, or the wrapped
    /// transition error if the host rejects the event.
    pub fn handle_host_event(&self, event: &HostEvent) -> Result<HostState, ClusterError> {
        let host = self.host(event.subject())?;
        Ok(host.handle_event(event)?)
    }

    /// Route a component event to its component host.
    ///
    /// # Errors
    /// [`ClusterError::ComponentHostNotFound`] for an unknown mapping, or the
    /// wrapped transition error if the component rejects the event.
    pub fn handle_component_event(
        &self,
        event: &ComponentEvent,
    ) -> Result<ComponentState, ClusterError> {
        let component = self.component_host_by_key(event.subject())?;
        Ok(component.handle_event(event)?)
    }

    pub fn health_report(&self) -> ClusterHealthReport {
        let mut report = ClusterHealthReport::default();
        for host in self.hosts() {
            let (state, status) = host.health_summary();
            report.count(state, status);
        }
        report
    }
}

impl std::fmt::Debug for Cluster {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cluster")
            .field("name", &self.name)
            .field("hosts", &self.hosts.read().len())
            .field("component_hosts", &self.component_hosts.read().len())
            .finish()
    }
}
