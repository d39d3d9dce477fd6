use thiserror::Error;

#[derive(Debug, Error)]
pub enum MonitorError {
    #[error("invalid monitor config: {0}")]
    InvalidConfig(String),
}
