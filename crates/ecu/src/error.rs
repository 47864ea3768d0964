//! ECU Error Types

use canbus::{Address, CanError};
use heartbeat::HeartbeatError;
use thiserror::Error;

/// Errors while loading configuration or bringing a node up
#[derive(Debug, Error)]
pub enum EcuError {
    /// Configuration could not be read or parsed
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    /// Configuration parsed but is inconsistent
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Heartbeat address missing from the address table
    #[error("Heartbeat address 0x{0:03X} is not in the address table")]
    MissingHeartbeatAddress(Address),

    #[error(transparent)]
    Can(#[from] CanError),

    #[error(transparent)]
    Heartbeat(#[from] HeartbeatError),
}
