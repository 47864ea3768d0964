//! ECU Node - Main Entry Point
//!
//! Runs the configured node against a simulated segment, with a mirrored peer on
//! the other end so the heartbeat has someone to talk to.

use canbus::SimBus;
use ecu::{init_logging, EcuConfig, EcuNode};
use heartbeat::{LivenessLed, TraceIndicator};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let path = std::env::args().nth(1).map(PathBuf::from);
    let config = EcuConfig::load(path.as_deref())?;
    init_logging(&config.logging);

    info!("=== ECU core v{} ===", env!("CARGO_PKG_VERSION"));

    let sim = SimBus::new();
    let led = LivenessLed::new(Arc::new(TraceIndicator {
        name: config.node.name.clone(),
    }));
    let mut node = EcuNode::new(&config, sim.attach(), Arc::new(led))?;

    let peer_config = config.mirrored(format!("{}-peer", config.node.name));
    let mut peer = EcuNode::new(&peer_config, sim.attach(), Arc::new(LivenessLed::disabled()))?;

    node.start()?;
    peer.start()?;

    let mut ticker = tokio::time::interval(config.node.poll_interval());
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let run_for = config.node.run_for_ms.map(Duration::from_millis);
    let started = tokio::time::Instant::now();

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                node.poll();
                peer.poll();
                if run_for.is_some_and(|limit| started.elapsed() >= limit) {
                    break;
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Shutdown requested");
                break;
            }
        }
    }

    node.stop();
    peer.stop();
    info!("{} bus stats: {:?}", node.name(), node.stats());
    info!("{} bus stats: {:?}", peer.name(), peer.stats());
    Ok(())
}
