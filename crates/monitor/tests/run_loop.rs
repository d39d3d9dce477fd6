use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use fleet_cluster::{Cluster, HostEvent, HostInfo, HostState, RegistrationFlow};
use fleet_monitor::{HeartbeatMonitor, MonitorConfig};

fn create_cluster() -> Arc<Cluster> {
    let cluster = Arc::new(Cluster::new("c1"));
    for name in ["h1", "h2"] {
        cluster.add_host(name, RegistrationFlow::Verification).unwrap();
        let info = HostInfo {
            hostname: name.to_string(),
            ..HostInfo::default()
        };
        cluster
            .handle_host_event(&HostEvent::registration(name, 1, info, None))
            .unwrap();
        cluster
            .handle_host_event(&HostEvent::verified(name, 2))
            .unwrap();
        cluster
            .handle_host_event(&HostEvent::heartbeat_healthy(name, 3))
            .unwrap();
    }
    cluster
}

fn fast_config() -> MonitorConfig {
    MonitorConfig {
        heartbeat_timeout_secs: 1,
        check_interval_ms: 10,
    }
}

async fn wait_for_state(cluster: &Cluster, host: &str, state: HostState) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while cluster.host(host).unwrap().state() != state {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("host did not reach expected state");
}

#[test_log::test(tokio::test)]
async fn run_times_out_stale_hosts_until_cancelled() {
    let cluster = create_cluster();
    let monitor = Arc::new(HeartbeatMonitor::new(Arc::clone(&cluster), fast_config()).unwrap());
    let token = CancellationToken::new();

    let handle = tokio::spawn({
        let monitor = Arc::clone(&monitor);
        let token = token.clone();
        async move { monitor.run(token).await }
    });

    wait_for_state(&cluster, "h1", HostState::HeartbeatLost).await;
    wait_for_state(&cluster, "h2", HostState::HeartbeatLost).await;

    token.cancel();
    tokio::time::timeout(Duration::from_secs(1), handle)
        .await
        .expect("monitor did not stop")
        .unwrap();

    let report = cluster.health_report();
    assert_eq!(report.heartbeat_lost_state_hosts, 2);
    assert_eq!(report.unknown_status_hosts, 2);
}

#[test_log::test(tokio::test)]
async fn cancelled_before_first_tick_does_nothing() {
    let cluster = create_cluster();
    let monitor = HeartbeatMonitor::new(Arc::clone(&cluster), fast_config()).unwrap();
    let token = CancellationToken::new();
    token.cancel();

    monitor.run(token).await;

    assert_eq!(cluster.host("h1").unwrap().state(), HostState::Healthy);
}

#[test_log::test(tokio::test)]
async fn recovered_host_is_not_timed_out_again() {
    let cluster = create_cluster();
    let monitor = HeartbeatMonitor::new(Arc::clone(&cluster), fast_config()).unwrap();

    let first = monitor.sweep(10_000);
    assert_eq!(first.timed_out.len(), 2);

    cluster
        .handle_host_event(&HostEvent::heartbeat_healthy("h1", 10_500))
        .unwrap();

    let second = monitor.sweep(11_000);
    assert_eq!(second.scanned, 1);
    assert!(second.timed_out.is_empty());
    assert_eq!(cluster.host("h1").unwrap().state(), HostState::Healthy);
    assert_eq!(cluster.host("h2").unwrap().state(), HostState::HeartbeatLost);
}
