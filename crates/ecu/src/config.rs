//! ECU configuration
//!
//! Layered: built-in defaults, then an optional TOML file, then `ECU__*`
//! environment variables (`ECU__HEARTBEAT__TIMEOUT_MS=80`).

use crate::error::EcuError;
use canbus::{AddressEntry, AddressTable, Direction};
use config::{Config, Environment, File, FileFormat};
use heartbeat::HeartbeatConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Complete node configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EcuConfig {
    pub node: NodeConfig,
    pub can: CanConfig,
    pub heartbeat: HeartbeatConfig,
    pub logging: LoggingConfig,
}

/// Node identity and supervision loop timing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    pub name: String,
    /// Period of the update / liveness poll (milliseconds)
    pub poll_interval_ms: u64,
    /// Stop after this long; run until Ctrl-C when unset (milliseconds)
    pub run_for_ms: Option<u64>,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            name: "back".to_string(),
            poll_interval_ms: 10,
            run_for_ms: None,
        }
    }
}

impl NodeConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

/// Bus transport settings and the address table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CanConfig {
    /// Interrupt queue capacity (frames)
    pub rx_queue_capacity: usize,
    /// Interrupt-driven receive; polled FIFO draining when false
    pub interrupts: bool,
    /// Trace every received frame
    pub sniffer: bool,
    pub addresses: Vec<AddressEntry>,
}

impl Default for CanConfig {
    fn default() -> Self {
        Self {
            rx_queue_capacity: 64,
            interrupts: true,
            sniffer: false,
            addresses: vec![AddressEntry::new(0x001, Direction::Incoming, "heartbeat")],
        }
    }
}

/// Log output settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive used when `RUST_LOG` is unset
    pub level: String,
    /// Emit JSON lines instead of human readable output
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

impl EcuConfig {
    /// Load defaults, an optional TOML file and `ECU__*` environment overrides
    pub fn load(path: Option<&Path>) -> Result<Self, EcuError> {
        let mut builder = Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(File::from(path).format(FileFormat::Toml));
        }
        builder = builder.add_source(
            Environment::with_prefix("ECU")
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        );
        Self::finish(builder.build()?)
    }

    /// Parse a TOML document on top of the defaults
    pub fn from_toml_str(toml: &str) -> Result<Self, EcuError> {
        let config = Config::builder()
            .add_source(File::from_str(toml, FileFormat::Toml))
            .build()?;
        Self::finish(config)
    }

    fn finish(config: Config) -> Result<Self, EcuError> {
        let ecu: EcuConfig = config.try_deserialize()?;
        ecu.validate()?;
        Ok(ecu)
    }

    /// Check the address table and heartbeat settings fit together
    pub fn validate(&self) -> Result<(), EcuError> {
        let table = self.address_table()?;
        self.heartbeat.validate()?;
        if table.entry(self.heartbeat.address).is_none() {
            return Err(EcuError::MissingHeartbeatAddress(self.heartbeat.address));
        }
        if self.can.rx_queue_capacity < 2 {
            return Err(EcuError::InvalidConfig(
                "can.rx_queue_capacity must be at least 2".to_string(),
            ));
        }
        if self.node.poll_interval_ms == 0 {
            return Err(EcuError::InvalidConfig(
                "node.poll_interval_ms must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }

    /// Build the address table described by `can.addresses`
    pub fn address_table(&self) -> Result<AddressTable, EcuError> {
        Ok(AddressTable::new(self.can.addresses.clone())?)
    }

    /// Configuration of the ECU on the other end of the segment: same addresses
    /// with every direction flipped
    pub fn mirrored(&self, name: impl Into<String>) -> Self {
        let mut peer = self.clone();
        peer.node.name = name.into();
        for entry in &mut peer.can.addresses {
            entry.direction = match entry.direction {
                Direction::Incoming => Direction::Outgoing,
                Direction::Outgoing => Direction::Incoming,
            };
        }
        peer
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = EcuConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.heartbeat.address, 0x001);
        assert_eq!(config.node.poll_interval(), Duration::from_millis(10));
    }

    #[test]
    fn test_toml_overrides_defaults() {
        let config = EcuConfig::from_toml_str(
            r#"
            [node]
            name = "front"

            [heartbeat]
            address = 0x010
            timeout_ms = 80

            [[can.addresses]]
            address = 0x010
            direction = "outgoing"
            name = "heartbeat"

            [[can.addresses]]
            address = 0x100
            direction = "incoming"
            "#,
        )
        .unwrap();

        assert_eq!(config.node.name, "front");
        assert_eq!(config.node.poll_interval_ms, 10);
        assert_eq!(config.heartbeat.interval_ms, 100);
        assert_eq!(config.heartbeat.timeout_ms, 80);
        assert_eq!(config.can.addresses.len(), 2);
        assert!(config.can.interrupts);
    }

    #[test]
    fn test_missing_heartbeat_address_rejected() {
        let result = EcuConfig::from_toml_str(
            r#"
            [heartbeat]
            address = 0x050
            "#,
        );
        assert!(matches!(result, Err(EcuError::MissingHeartbeatAddress(0x050))));
    }

    #[test]
    fn test_duplicate_address_rejected() {
        let result = EcuConfig::from_toml_str(
            r#"
            [[can.addresses]]
            address = 1
            direction = "incoming"

            [[can.addresses]]
            address = 1
            direction = "outgoing"
            "#,
        );
        assert!(matches!(result, Err(EcuError::Can(_))));
    }

    #[test]
    fn test_mirrored_flips_directions() {
        let config = EcuConfig::default();
        let peer = config.mirrored("front");
        assert_eq!(peer.node.name, "front");
        assert_eq!(peer.can.addresses[0].direction, Direction::Outgoing);
        assert_eq!(peer.heartbeat, config.heartbeat);
    }
}
