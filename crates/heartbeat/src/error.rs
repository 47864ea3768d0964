//! Heartbeat Error Types

use canbus::CanError;
use thiserror::Error;

/// Errors while configuring or wiring the heartbeat
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HeartbeatError {
    /// Configuration rejected by [`crate::HeartbeatConfig::validate`]
    #[error("Invalid heartbeat configuration: {0}")]
    InvalidConfig(String),

    /// Registering with the bus failed
    #[error(transparent)]
    Can(#[from] CanError),
}
