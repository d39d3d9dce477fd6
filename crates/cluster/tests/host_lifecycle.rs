use fleet_cluster::{
    HealthStatus, Host, HostEvent, HostEventType, HostHealthStatus, HostInfo, HostState,
    RegistrationFlow,
};

const FLOWS: [RegistrationFlow; 2] = [RegistrationFlow::Verification, RegistrationFlow::StatusUpdates];

fn event_of(kind: HostEventType, host: &str, ts: u64) -> HostEvent {
    match kind {
        HostEventType::RegistrationRequest => HostEvent::registration(
            host,
            ts,
            HostInfo {
                hostname: host.to_string(),
                ..HostInfo::default()
            },
            Some("2.1.0".to_string()),
        ),
        HostEventType::Verified => HostEvent::verified(host, ts),
        HostEventType::StatusUpdatesReceived => HostEvent::status_updates_received(host, ts),
        HostEventType::HeartbeatHealthy => HostEvent::heartbeat_healthy(host, ts),
        HostEventType::HeartbeatUnhealthy => HostEvent::heartbeat_unhealthy(
            host,
            ts,
            HostHealthStatus::new(HealthStatus::Unhealthy, "disk full"),
        ),
        HostEventType::HeartbeatTimedOut => HostEvent::heartbeat_timed_out(host, ts),
    }
}

#[test_log::test]
fn heartbeat_flow_ends_in_illegal_unhealthy_from_lost() {
    let host = Host::new("h1");
    let steps = [
        (HostEventType::RegistrationRequest, 1_000, HostState::WaitingForVerification),
        (HostEventType::Verified, 1_100, HostState::Verified),
        (HostEventType::HeartbeatHealthy, 1_200, HostState::Healthy),
        (HostEventType::HeartbeatUnhealthy, 1_300, HostState::Unhealthy),
        (HostEventType::HeartbeatTimedOut, 1_400, HostState::HeartbeatLost),
    ];
    for (kind, ts, expected) in steps {
        let state = host.handle_event(&event_of(kind, "h1", ts)).unwrap();
        assert_eq!(state, expected, "after {kind}");
        assert_eq!(host.time_in_state(), Some(ts));
    }
    assert_eq!(host.health_status().status, HealthStatus::Unknown);
    assert_eq!(host.health_status().health_report, "disk full");
    assert_eq!(host.last_heartbeat_time(), Some(1_300));

    let before = host.snapshot();
    let err = host
        .handle_event(&event_of(HostEventType::HeartbeatUnhealthy, "h1", 1_500))
        .unwrap_err();
    assert!(err.is_invalid_transition(), "got {err:?}");
    assert_eq!(err.state(), HostState::HeartbeatLost);
    assert_eq!(err.event(), HostEventType::HeartbeatUnhealthy);
    assert_eq!(host.snapshot(), before);
}

#[test_log::test]
fn lost_host_recovers_on_healthy_heartbeat() {
    let host = Host::new("h1");
    host.set_state(HostState::HeartbeatLost);
    host.handle_event(&event_of(HostEventType::HeartbeatHealthy, "h1", 10))
        .unwrap();
    assert_eq!(host.state(), HostState::Healthy);
    assert_eq!(host.health_status().status, HealthStatus::Healthy);
}

#[test_log::test]
fn repeated_timeout_stays_lost() {
    for flow in FLOWS {
        let host = Host::with_flow("h1", flow);
        host.set_state(HostState::HeartbeatLost);
        for ts in [5, 6] {
            assert_eq!(
                host.handle_event(&event_of(HostEventType::HeartbeatTimedOut, "h1", ts))
                    .unwrap(),
                HostState::HeartbeatLost
            );
        }
    }
}

#[test_log::test]
fn every_illegal_pair_is_rejected_without_mutation() {
    for flow in FLOWS {
        let table = flow.table();
        for state in HostState::ALL {
            for kind in HostEventType::ALL {
                if table.is_legal(state, kind) {
                    continue;
                }
                let host = Host::with_flow("h1", flow);
                host.set_state(state);
                host.set_last_heartbeat_time(42);
                let before = host.snapshot();

                let err = host.handle_event(&event_of(kind, "h1", 100)).unwrap_err();

                assert!(err.is_invalid_transition(), "{flow:?} {state} {kind}");
                assert_eq!(host.snapshot(), before, "{flow:?} {state} {kind}");
            }
        }
    }
}

#[test_log::test]
fn every_legal_transition_reaches_its_target() {
    for flow in FLOWS {
        for (from, kind, to) in flow.table().transitions() {
            let host = Host::with_flow("h1", flow);
            host.set_state(from);

            let state = host.handle_event(&event_of(kind, "h1", 100)).unwrap();

            assert_eq!(state, to, "{flow:?} {from} {kind}");
            assert_eq!(host.state(), to);
        }
    }
}

#[test_log::test]
fn registration_in_wrong_state_keeps_host_info() {
    let host = Host::new("h1");
    host.set_state(HostState::Healthy);
    let before = host.snapshot();

    let err = host
        .handle_event(&event_of(HostEventType::RegistrationRequest, "h1", 7))
        .unwrap_err();

    assert!(err.is_invalid_transition());
    assert_eq!(host.snapshot(), before);
    assert_eq!(host.agent_version(), None);
}
