//! Heartbeat configuration

use crate::error::HeartbeatError;
use canbus::Address;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Heartbeat configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HeartbeatConfig {
    /// Address heartbeat frames travel on
    pub address: Address,
    /// Transmit period (milliseconds)
    pub interval_ms: u64,
    /// Grace period on top of the interval before the peer counts as stale (milliseconds)
    pub timeout_ms: u64,
}

impl Default for HeartbeatConfig {
    fn default() -> Self {
        Self {
            address: 0x001,
            interval_ms: 100,
            timeout_ms: 50,
        }
    }
}

impl HeartbeatConfig {
    /// Reject configurations whose staleness threshold would not exceed the interval
    pub fn validate(&self) -> Result<(), HeartbeatError> {
        if self.interval_ms == 0 {
            return Err(HeartbeatError::InvalidConfig(
                "interval_ms must be greater than 0".to_string(),
            ));
        }
        if self.timeout_ms == 0 {
            return Err(HeartbeatError::InvalidConfig(
                "timeout_ms must be greater than 0".to_string(),
            ));
        }
        if self.interval_ms.checked_add(self.timeout_ms).is_none() {
            return Err(HeartbeatError::InvalidConfig(
                "interval_ms + timeout_ms overflows".to_string(),
            ));
        }
        Ok(())
    }

    /// Transmit period
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    /// Silence longer than this marks the peer stale (milliseconds)
    pub fn threshold_ms(&self) -> u64 {
        self.interval_ms.saturating_add(self.timeout_ms)
    }
}
