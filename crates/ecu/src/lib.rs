//! ECU Node
//!
//! Wires the CAN transport and heartbeat into a running node: loads configuration,
//! sets up logging, and runs the update / liveness supervision loop.

mod config;
mod error;
mod node;

pub use config::{CanConfig, EcuConfig, LoggingConfig, NodeConfig};
pub use error::EcuError;
pub use node::{EcuNode, HeartbeatRole};

use tracing_subscriber::EnvFilter;

/// Initialize logging; `RUST_LOG` overrides the configured level.
///
/// Returns false if a global subscriber was already installed.
pub fn init_logging(config: &LoggingConfig) -> bool {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);

    let result = if config.json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
    result.is_ok()
}
