use std::sync::LazyLock;

use fleet_fsm::{
    ActionError, StateMachine, TableBuilder, TableError, TransitionError, TransitionTable,
};
use parking_lot::RwLock;

use crate::error::ComponentTransitionError;
use crate::events::{ComponentEvent, ComponentEventPayload};
use crate::ids::ComponentHostKey;
use crate::state::{ComponentEventType, ComponentKind, ComponentState};

pub type ComponentTable =
    TransitionTable<ComponentState, ComponentEventType, ComponentRecord, ComponentEvent>;

type ComponentBuilder =
    TableBuilder<ComponentState, ComponentEventType, ComponentRecord, ComponentEvent>;

type ComponentMachine =
    StateMachine<ComponentState, ComponentEventType, ComponentRecord, ComponentEvent>;

/// One operation verb and the states it moves through.
struct Leg {
    verb: ComponentEventType,
    from: &'static [ComponentState],
    in_progress: ComponentState,
    failed: ComponentState,
    completed: ComponentState,
}

const INSTALL: Leg = Leg {
    verb: ComponentEventType::Install,
    from: &[ComponentState::Init, ComponentState::Uninstalled],
    in_progress: ComponentState::Installing,
    failed: ComponentState::InstallFailed,
    completed: ComponentState::Installed,
};

const START: Leg = Leg {
    verb: ComponentEventType::Start,
    from: &[ComponentState::Installed],
    in_progress: ComponentState::Starting,
    failed: ComponentState::StartFailed,
    completed: ComponentState::Started,
};

const STOP: Leg = Leg {
    verb: ComponentEventType::Stop,
    from: &[ComponentState::Started],
    in_progress: ComponentState::Stopping,
    failed: ComponentState::StopFailed,
    completed: ComponentState::Installed,
};

const UNINSTALL: Leg = Leg {
    verb: ComponentEventType::Uninstall,
    from: &[ComponentState::Installed],
    in_progress: ComponentState::Uninstalling,
    failed: ComponentState::UninstallFailed,
    completed: ComponentState::Uninstalled,
};

const WIPEOUT: Leg = Leg {
    verb: ComponentEventType::Wipeout,
    from: &[ComponentState::Uninstalled],
    in_progress: ComponentState::WipingOut,
    failed: ComponentState::WipeoutFailed,
    completed: ComponentState::Init,
};

fn add_leg(builder: ComponentBuilder, leg: &Leg) -> ComponentBuilder {
    use ComponentEventType as E;

    builder
        .add_transitions(leg.from, leg.in_progress, leg.verb, Some(op_started))
        .add_transition_with(leg.in_progress, leg.in_progress, E::OpInProgress, op_in_progress)
        .add_transition_with(leg.in_progress, leg.failed, E::OpFailed, op_completed)
        .add_transition_with(leg.in_progress, leg.completed, E::OpSucceeded, op_completed)
        .add_transition_with(leg.failed, leg.in_progress, E::OpRestart, op_started)
        .add_transition_with(leg.failed, leg.in_progress, leg.verb, op_started)
}

fn build_table(name: &'static str, legs: &[&Leg]) -> Result<ComponentTable, TableError> {
    legs.iter()
        .fold(ComponentTable::builder(name, ComponentState::Init), |b, leg| {
            add_leg(b, leg)
        })
        .install()
}

/// Table for components that run a process.
///
/// # Errors
/// Returns [`TableError`] if two legs declare the same arc.
pub fn build_daemon_table() -> Result<ComponentTable, TableError> {
    build_table(
        "component-daemon",
        &[&INSTALL, &START, &STOP, &UNINSTALL, &WIPEOUT],
    )
}

/// Table for install-only components.
///
/// # Errors
/// Returns [`TableError`] if two legs declare the same arc.
pub fn build_client_table() -> Result<ComponentTable, TableError> {
    build_table("component-client", &[&INSTALL, &UNINSTALL, &WIPEOUT])
}

static DAEMON_TABLE: LazyLock<ComponentTable> =
    LazyLock::new(|| build_daemon_table().expect("daemon component table"));

static CLIENT_TABLE: LazyLock<ComponentTable> =
    LazyLock::new(|| build_client_table().expect("client component table"));

impl ComponentKind {
    pub fn table(self) -> &'static ComponentTable {
        match self {
            Self::Daemon => &DAEMON_TABLE,
            Self::Client => &CLIENT_TABLE,
        }
    }
}

// -- Transition actions --

fn op_started(record: &mut ComponentRecord, event: &ComponentEvent) -> Result<(), ActionError> {
    record.last_op_start_time = Some(event.timestamp);
    record.last_op_last_update_time = None;
    record.last_op_end_time = None;
    if let ComponentEventPayload::Install {
        stack_version: Some(version),
    } = &event.payload
    {
        record.stack_version = Some(version.clone());
    }
    Ok(())
}

fn op_in_progress(record: &mut ComponentRecord, event: &ComponentEvent) -> Result<(), ActionError> {
    record.check_not_before_start(event.timestamp)?;
    record.last_op_last_update_time = Some(event.timestamp);
    Ok(())
}

fn op_completed(record: &mut ComponentRecord, event: &ComponentEvent) -> Result<(), ActionError> {
    record.check_not_before_start(event.timestamp)?;
    record.last_op_end_time = Some(event.timestamp);
    Ok(())
}

// -- Entity --

/// Mutable fields of a component host, handed to transition actions.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ComponentRecord {
    desired_state: Option<ComponentState>,
    stack_version: Option<String>,
    last_op_start_time: Option<u64>,
    last_op_last_update_time: Option<u64>,
    last_op_end_time: Option<u64>,
}

impl ComponentRecord {
    fn check_not_before_start(&self, at: u64) -> Result<(), ActionError> {
        match self.last_op_start_time {
            Some(floor) if at < floor => Err(ActionError::TimestampRegression { at, floor }),
            _ => Ok(()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ComponentHostSnapshot {
    #[serde(flatten)]
    pub key: ComponentHostKey,
    pub kind: ComponentKind,
    pub state: ComponentState,
    pub desired_state: Option<ComponentState>,
    pub stack_version: Option<String>,
    pub last_op_start_time: Option<u64>,
    pub last_op_last_update_time: Option<u64>,
    pub last_op_end_time: Option<u64>,
}

struct ComponentInner {
    machine: ComponentMachine,
    record: ComponentRecord,
}

/// One service component installed (or being installed) on one host.
pub struct ComponentHost {
    key: ComponentHostKey,
    kind: ComponentKind,
    inner: RwLock<ComponentInner>,
}

impl ComponentHost {
    pub fn new(key: ComponentHostKey, kind: ComponentKind) -> Self {
        Self {
            key,
            kind,
            inner: RwLock::new(ComponentInner {
                machine: StateMachine::new(kind.table()),
                record: ComponentRecord::default(),
            }),
        }
    }

    /// Apply `event` and return the resulting state.
    ///
    /// # Errors
    /// Returns the transition error if the event names another component
    /// host, is not legal in the current state, or its timestamp precedes the
    /// running operation's start.
    pub fn handle_event(
        &self,
        event: &ComponentEvent,
    ) -> Result<ComponentState, ComponentTransitionError> {
        let kind = event.kind();
        tracing::debug!(component = %self.key, event = %kind, "handling component event");

        let mut inner = self.inner.write();
        let ComponentInner { machine, record } = &mut *inner;
        let old_state = machine.current_state();

        let result = if *event.subject() == self.key {
            machine.do_transition(kind, record, event)
        } else {
            Err(TransitionError::ActionFailed {
                state: old_state,
                event: kind,
                source: ActionError::SubjectMismatch {
                    expected: self.key.to_string(),
                    actual: event.subject().to_string(),
                },
            })
        };

        match result {
            Ok(new_state) => {
                if new_state != old_state {
                    tracing::debug!(
                        component = %self.key,
                        old_state = %old_state,
                        state = %new_state,
                        event = %kind,
                        "component transitioned to a new state"
                    );
                }
                Ok(new_state)
            }
            Err(e) => {
                tracing::error!(
                    component = %self.key,
                    state = %old_state,
                    event = %kind,
                    error = %e,
                    "can't handle component event at current state"
                );
                Err(e)
            }
        }
    }

    pub fn key(&self) -> &ComponentHostKey {
        &self.key
    }

    pub fn service_name(&self) -> &str {
        &self.key.service_name
    }

    pub fn component_name(&self) -> &str {
        &self.key.component_name
    }

    pub fn host_name(&self) -> &str {
        &self.key.host_name
    }

    pub fn kind(&self) -> ComponentKind {
        self.kind
    }

    pub fn state(&self) -> ComponentState {
        self.inner.read().machine.current_state()
    }

    /// Overwrite the state without validation.
    pub fn set_state(&self, state: ComponentState) {
        let mut inner = self.inner.write();
        tracing::warn!(
            component = %self.key,
            old_state = %inner.machine.current_state(),
            state = %state,
            "component state overridden"
        );
        inner.machine.set_current_state(state);
    }

    pub fn desired_state(&self) -> Option<ComponentState> {
        self.inner.read().record.desired_state
    }

    pub fn set_desired_state(&self, state: ComponentState) {
        self.inner.write().record.desired_state = Some(state);
    }

    pub fn stack_version(&self) -> Option<String> {
        self.inner.read().record.stack_version.clone()
    }

    pub fn set_stack_version(&self, version: impl Into<String>) {
        self.inner.write().record.stack_version = Some(version.into());
    }

    pub fn last_op_start_time(&self) -> Option<u64> {
        self.inner.read().record.last_op_start_time
    }

    pub fn last_op_last_update_time(&self) -> Option<u64> {
        self.inner.read().record.last_op_last_update_time
    }

    pub fn last_op_end_time(&self) -> Option<u64> {
        self.inner.read().record.last_op_end_time
    }

    pub fn snapshot(&self) -> ComponentHostSnapshot {
        let inner = self.inner.read();
        let r = &inner.record;
        ComponentHostSnapshot {
            key: self.key.clone(),
            kind: self.kind,
            state: inner.machine.current_state(),
            desired_state: r.desired_state,
            stack_version: r.stack_version.clone(),
            last_op_start_time: r.last_op_start_time,
            last_op_last_update_time: r.last_op_last_update_time,
            last_op_end_time: r.last_op_end_time,
        }
    }
}

impl std::fmt::Debug for ComponentHost {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ComponentHost")
            .field("key", &self.key)
            .field("kind", &self.kind)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn datanode() -> ComponentHost {
        ComponentHost::new(
            ComponentHostKey::new("HDFS", "DATANODE", "h1"),
            ComponentKind::Daemon,
        )
    }

    fn event(host: &ComponentHost, ts: u64, kind: ComponentEventType) -> ComponentEvent {
        ComponentEvent::of_kind(host.key().clone(), ts, kind)
    }

    #[test]
    fn tables_install() {
        // six arcs per leg, INSTALL has two stable sources
        assert_eq!(build_daemon_table().unwrap().len(), 5 * 6 + 1);
        assert_eq!(build_client_table().unwrap().len(), 3 * 6 + 1);
    }

    #[test]
    fn client_table_has_no_start_stop() {
        let table = ComponentKind::Client.table();
        for (_, kind, to) in table.transitions() {
            assert_ne!(kind, ComponentEventType::Start);
            assert_ne!(kind, ComponentEventType::Stop);
            assert_ne!(to, ComponentState::Started);
        }
    }

    #[test]
    fn install_records_stack_version_and_resets_times() {
        let c = datanode();
        c.handle_event(&ComponentEvent::install(
            c.key().clone(),
            100,
            Some("HDP-2.0.6".to_string()),
        ))
        .unwrap();

        assert_eq!(c.state(), ComponentState::Installing);
        assert_eq!(c.stack_version().as_deref(), Some("HDP-2.0.6"));
        assert_eq!(c.last_op_start_time(), Some(100));
        assert_eq!(c.last_op_last_update_time(), None);
        assert_eq!(c.last_op_end_time(), None);
    }

    #[test]
    fn install_without_version_keeps_previous() {
        let c = datanode();
        c.set_stack_version("HDP-1.3");
        c.handle_event(&event(&c, 1, ComponentEventType::Install))
            .unwrap();
        assert_eq!(c.stack_version().as_deref(), Some("HDP-1.3"));
    }

    #[test]
    fn completion_sets_end_time_only() {
        let c = datanode();
        c.handle_event(&event(&c, 10, ComponentEventType::Install))
            .unwrap();
        c.handle_event(&event(&c, 11, ComponentEventType::OpInProgress))
            .unwrap();
        c.handle_event(&event(&c, 12, ComponentEventType::OpSucceeded))
            .unwrap();

        assert_eq!(c.state(), ComponentState::Installed);
        assert_eq!(c.last_op_start_time(), Some(10));
        assert_eq!(c.last_op_last_update_time(), Some(11));
        assert_eq!(c.last_op_end_time(), Some(12));
    }

    #[test]
    fn progress_before_start_is_rejected() {
        let c = datanode();
        c.handle_event(&event(&c, 50, ComponentEventType::Install))
            .unwrap();
        let before = c.snapshot();

        let err = c
            .handle_event(&event(&c, 49, ComponentEventType::OpInProgress))
            .unwrap_err();

        assert!(matches!(
            err,
            TransitionError::ActionFailed {
                source: ActionError::TimestampRegression { at: 49, floor: 50 },
                ..
            }
        ));
        assert_eq!(c.snapshot(), before);
    }

    #[test]
    fn reissued_verb_retries_failed_operation() {
        let c = datanode();
        c.handle_event(&event(&c, 1, ComponentEventType::Install))
            .unwrap();
        c.handle_event(&event(&c, 2, ComponentEventType::OpFailed))
            .unwrap();
        assert_eq!(c.state(), ComponentState::InstallFailed);

        c.handle_event(&event(&c, 3, ComponentEventType::Install))
            .unwrap();
        assert_eq!(c.state(), ComponentState::Installing);
        assert_eq!(c.last_op_start_time(), Some(3));
        assert_eq!(c.last_op_end_time(), None);
    }

    #[test]
    fn event_for_other_component_host_is_rejected() {
        let c = datanode();
        let before = c.snapshot();
        let other = ComponentHostKey::new("YARN", "NODEMANAGER", "h9");

        let err = c
            .handle_event(&ComponentEvent::install(other, 5, Some("HDP-3".to_string())))
            .unwrap_err();

        assert!(matches!(
            err,
            TransitionError::ActionFailed {
                state: ComponentState::Init,
                source: ActionError::SubjectMismatch { ref expected, ref actual },
                ..
            } if *expected == c.key().to_string() && actual.contains("NODEMANAGER")
        ));
        assert_eq!(c.snapshot(), before);
    }

    #[test]
    fn desired_state_is_independent_of_state() {
        let c = datanode();
        c.set_desired_state(ComponentState::Started);
        assert_eq!(c.desired_state(), Some(ComponentState::Started));
        assert_eq!(c.state(), ComponentState::Init);
    }

    #[test]
    fn snapshot_flattens_key() {
        let c = datanode();
        let json = serde_json::to_value(c.snapshot()).unwrap();
        assert_eq!(json["component_name"], "DATANODE");
        assert_eq!(json["kind"], "daemon");
        assert_eq!(json["state"], "INIT");
    }
}
