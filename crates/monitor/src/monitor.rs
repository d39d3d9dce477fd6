use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use fleet_cluster::Cluster;

use crate::config::MonitorConfig;
use crate::error::MonitorError;

/// Outcome of one pass over the cluster's hosts.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Hosts in a heartbeat-tracked state.
    pub scanned: usize,
    /// Hosts moved to `HEARTBEAT_LOST` by this sweep.
    pub timed_out: Vec<String>,
    /// Stale hosts whose registration flow has no timeout arc for their
    /// current state.
    pub rejected: usize,
}

pub struct HeartbeatMonitor {
    cluster: Arc<Cluster>,
    config: MonitorConfig,
}

impl HeartbeatMonitor {
    pub fn new(cluster: Arc<Cluster>, config: MonitorConfig) -> Result<Self, MonitorError> {
        config.validate()?;
        Ok(Self { cluster, config })
    }

    pub fn config(&self) -> &MonitorConfig {
        &self.config
    }

    /// Time out every tracked host whose last heartbeat is older than the
    /// configured timeout at `now_ms`. A tracked host with no recorded
    /// heartbeat counts as stale.
    pub fn sweep(&self, now_ms: u64) -> SweepReport {
        let timeout_ms = self.config.heartbeat_timeout_ms();
        let mut report = SweepReport::default();

        for host in self.cluster.hosts() {
            let (state, last_heartbeat) = host.liveness();
            if !state.is_heartbeat_tracked() {
                continue;
            }
            report.scanned += 1;

            // re-checked under the host's write lock; a heartbeat that lands
            // after the read above leaves the host alone
            match host.time_out_if_stale(now_ms, timeout_ms) {
                Ok(Some(_)) => {
                    tracing::warn!(
                        host = %host.host_name(),
                        state = %state,
                        last_heartbeat_time = ?last_heartbeat,
                        timeout_secs = self.config.heartbeat_timeout_secs,
                        "heartbeat lost"
                    );
                    report.timed_out.push(host.host_name().to_string());
                }
                Ok(None) => {}
                Err(e) => {
                    tracing::debug!(
                        host = %host.host_name(),
                        error = %e,
                        "heartbeat timeout not applied"
                    );
                    report.rejected += 1;
                }
            }
        }

        if !report.timed_out.is_empty() {
            tracing::info!(
                scanned = report.scanned,
                timed_out = report.timed_out.len(),
                rejected = report.rejected,
                "heartbeat sweep complete"
            );
        }
        report
    }

    /// Sweep on every tick until `token` is cancelled.
    pub async fn run(&self, token: CancellationToken) {
        let mut ticker = tokio::time::interval(self.config.check_interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        tracing::info!(
            cluster = %self.cluster.name(),
            interval_ms = self.config.check_interval_ms,
            timeout_secs = self.config.heartbeat_timeout_secs,
            "heartbeat monitor started"
        );

        loop {
            tokio::select! {
                biased;
                () = token.cancelled() => break,
                _ = ticker.tick() => {
                    self.sweep(now_ms());
                }
            }
        }

        tracing::info!(cluster = %self.cluster.name(), "heartbeat monitor stopped");
    }
}

#[allow(clippy::cast_possible_truncation)]
fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use fleet_cluster::{HostEvent, HostInfo, HostState, RegistrationFlow};

    fn config(timeout_secs: u64) -> MonitorConfig {
        MonitorConfig {
            heartbeat_timeout_secs: timeout_secs,
            check_interval_ms: 10,
        }
    }

    fn registered(cluster: &Cluster, name: &str, flow: RegistrationFlow, ts: u64) {
        cluster.add_host(name, flow).unwrap();
        let info = HostInfo {
            hostname: name.to_string(),
            ..HostInfo::default()
        };
        cluster
            .handle_host_event(&HostEvent::registration(name, ts, info, None))
            .unwrap();
    }

    #[test]
    fn invalid_config_rejected() {
        let cluster = Arc::new(Cluster::new("c1"));
        assert!(HeartbeatMonitor::new(cluster, config(0)).is_err());
    }

    #[test]
    fn fresh_hosts_survive() {
        let cluster = Arc::new(Cluster::new("c1"));
        registered(&cluster, "h1", RegistrationFlow::StatusUpdates, 1_000);
        let monitor = HeartbeatMonitor::new(Arc::clone(&cluster), config(10)).unwrap();

        let report = monitor.sweep(11_000);

        assert_eq!(report.scanned, 1);
        assert!(report.timed_out.is_empty());
        assert_eq!(
            cluster.host("h1").unwrap().state(),
            HostState::WaitingForHostStatusUpdates
        );
    }

    #[test]
    fn stale_hosts_time_out() {
        let cluster = Arc::new(Cluster::new("c1"));
        registered(&cluster, "h1", RegistrationFlow::StatusUpdates, 1_000);
        let monitor = HeartbeatMonitor::new(Arc::clone(&cluster), config(10)).unwrap();

        let report = monitor.sweep(11_001);

        assert_eq!(report.timed_out, vec!["h1".to_string()]);
        assert_eq!(report.rejected, 0);
        assert_eq!(
            cluster.host("h1").unwrap().state(),
            HostState::HeartbeatLost
        );
    }

    #[test]
    fn heartbeat_newer_than_cutoff_is_not_timed_out() {
        let cluster = Arc::new(Cluster::new("c1"));
        registered(&cluster, "h1", RegistrationFlow::StatusUpdates, 1_000);
        let monitor = HeartbeatMonitor::new(Arc::clone(&cluster), config(10)).unwrap();

        // lands after the host went stale but before the sweep judged it
        cluster
            .handle_host_event(&HostEvent::heartbeat_healthy("h1", 11_500))
            .unwrap();
        let report = monitor.sweep(12_000);

        assert_eq!(report.scanned, 1);
        assert!(report.timed_out.is_empty());
        assert_eq!(report.rejected, 0);
        assert_eq!(
            cluster.host("h1").unwrap().liveness(),
            (HostState::WaitingForHostStatusUpdates, Some(11_500))
        );
    }

    #[test]
    fn untracked_states_are_skipped() {
        let cluster = Arc::new(Cluster::new("c1"));
        cluster.add_host("init", RegistrationFlow::Verification).unwrap();
        // waiting for verification is not heartbeat-tracked
        registered(&cluster, "waiting", RegistrationFlow::Verification, 0);
        let monitor = HeartbeatMonitor::new(Arc::clone(&cluster), config(1)).unwrap();

        let report = monitor.sweep(1_000_000);

        assert_eq!(report, SweepReport::default());
    }

    #[test]
    fn tracked_host_without_heartbeat_is_stale() {
        let cluster = Arc::new(Cluster::new("c1"));
        let host = cluster.add_host("h1", RegistrationFlow::Verification).unwrap();
        host.set_state(HostState::Healthy);
        let monitor = HeartbeatMonitor::new(Arc::clone(&cluster), config(60)).unwrap();

        let report = monitor.sweep(5);

        assert_eq!(report.timed_out, vec!["h1".to_string()]);
        assert_eq!(host.state(), HostState::HeartbeatLost);
    }
}
