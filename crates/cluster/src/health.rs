/// Coarse health indicator reported for a host.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HealthStatus {
    #[default]
    Unknown,
    Healthy,
    Unhealthy,
}

impl HealthStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Unknown => "UNKNOWN",
            Self::Healthy => "HEALTHY",
            Self::Unhealthy => "UNHEALTHY",
        }
    }
}

impl std::fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Health status plus the agent's free-text report.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct HostHealthStatus {
    pub status: HealthStatus,
    #[serde(default)]
    pub health_report: String,
}

impl HostHealthStatus {
    pub fn new(status: HealthStatus, health_report: impl Into<String>) -> Self {
        Self {
            status,
            health_report: health_report.into(),
        }
    }

    /// Same report, different status.
    #[must_use]
    pub fn with_status(&self, status: HealthStatus) -> Self {
        Self {
            status,
            health_report: self.health_report.clone(),
        }
    }
}
