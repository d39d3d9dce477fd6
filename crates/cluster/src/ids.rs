use crate::error::ClusterError;

/// Validate a host name used as an entity identity.
///
/// Host names are non-empty and free of whitespace.
pub(crate) fn check_host_name(name: &str) -> Result<(), ClusterError> {
    if name.is_empty() || name.chars().any(char::is_whitespace) {
        return Err(ClusterError::InvalidHostName(name.to_string()));
    }
    Ok(())
}

/// Identity of one service component mapped to one host.
#[derive(
    Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize,
)]
pub struct ComponentHostKey {
    pub service_name: String,
    pub component_name: String,
    pub host_name: String,
}

impl ComponentHostKey {
    pub fn new(
        service_name: impl Into<String>,
        component_name: impl Into<String>,
        host_name: impl Into<String>,
    ) -> Self {
        Self {
            service_name: service_name.into(),
            component_name: component_name.into(),
            host_name: host_name.into(),
        }
    }
}

/// `{service}/{component}@{host}`
impl std::fmt::Display for ComponentHostKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}/{}@{}",
            self.service_name, self.component_name, self.host_name
        )
    }
}
