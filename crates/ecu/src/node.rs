//! ECU node assembly

use crate::config::EcuConfig;
use crate::error::EcuError;
use canbus::{BusStats, CanDriver, Canbus, Direction};
use heartbeat::{BeatStatus, Heartbeat, LivenessLed, TickCallback};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

/// What this node does with the heartbeat address
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeartbeatRole {
    /// Heartbeat address is outgoing: send beats
    Transmit,
    /// Heartbeat address is incoming: watch the peer
    Receive,
}

/// One ECU on the bus
pub struct EcuNode<D: CanDriver + 'static> {
    name: String,
    config: EcuConfig,
    canbus: Arc<Canbus<D>>,
    heartbeat: Heartbeat<D>,
    role: HeartbeatRole,
    beating: Option<JoinHandle<()>>,
    last_status: Option<BeatStatus>,
}

impl<D: CanDriver + 'static> EcuNode<D> {
    /// Build the bus and heartbeat from configuration; nothing touches the driver yet
    pub fn new(config: &EcuConfig, driver: D, led: Arc<LivenessLed>) -> Result<Self, EcuError> {
        config.validate()?;
        let table = config.address_table()?;
        let role = match table.direction(config.heartbeat.address) {
            Some(Direction::Outgoing) => HeartbeatRole::Transmit,
            Some(Direction::Incoming) => HeartbeatRole::Receive,
            None => return Err(EcuError::MissingHeartbeatAddress(config.heartbeat.address)),
        };

        let canbus = Arc::new(Canbus::with_queue_capacity(
            table,
            driver,
            config.can.rx_queue_capacity,
        ));
        let heartbeat = Heartbeat::new(Arc::clone(&canbus), config.heartbeat.clone(), led)?;

        Ok(Self {
            name: config.node.name.clone(),
            config: config.clone(),
            canbus,
            heartbeat,
            role,
            beating: None,
            last_status: None,
        })
    }

    /// Set up the bus and start the heartbeat role.
    ///
    /// Fallible steps run before the bus is set up, so a failed start can be retried.
    pub fn start(&mut self) -> Result<(), EcuError> {
        if self.role == HeartbeatRole::Receive {
            self.heartbeat.begin_receiving()?;
        }

        self.canbus.setup()?;
        if !self.config.can.interrupts {
            self.canbus.enable_interrupts(false);
        }
        self.canbus.enable_sniffer(self.config.can.sniffer);

        if self.role == HeartbeatRole::Transmit {
            self.beating = Some(self.heartbeat.begin_beating());
        }
        info!("{} started ({:?})", self.name, self.role);
        Ok(())
    }

    /// One supervision step: drain the bus, then check peer liveness.
    ///
    /// Returns `None` on a transmitting node, which has no peer heartbeat to watch.
    pub fn poll(&mut self) -> Option<BeatStatus> {
        let drained = self.canbus.update();
        if drained > 0 {
            debug!("{} drained {} frames", self.name, drained);
        }

        if self.role != HeartbeatRole::Receive {
            return None;
        }

        let status = self.heartbeat.check_beat();
        if self.last_status != Some(status) {
            match status {
                BeatStatus::Alive => info!("{}: peer heartbeat alive", self.name),
                BeatStatus::Stale => warn!(
                    "{}: peer heartbeat stale after {}ms",
                    self.name,
                    self.heartbeat.receiver().elapsed_ms()
                ),
            }
            self.last_status = Some(status);
        }
        Some(status)
    }

    /// Poll on the configured interval until `duration` has passed
    pub async fn run_for(&mut self, duration: Duration) -> Option<BeatStatus> {
        let deadline = Instant::now() + duration;
        let mut ticker = tokio::time::interval(self.config.node.poll_interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut status = None;
        while Instant::now() < deadline {
            ticker.tick().await;
            status = self.poll();
        }
        status
    }

    /// Stop transmitting heartbeats
    pub fn stop(&mut self) {
        if let Some(handle) = self.beating.take() {
            handle.abort();
            info!("{} stopped beating", self.name);
        }
    }

    /// Run `tick` with every transmitted heartbeat
    pub fn add_tick(&self, tick: TickCallback) -> bool {
        self.heartbeat.add_callback(tick)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn role(&self) -> HeartbeatRole {
        self.role
    }

    pub fn canbus(&self) -> &Arc<Canbus<D>> {
        &self.canbus
    }

    pub fn heartbeat(&self) -> &Heartbeat<D> {
        &self.heartbeat
    }

    pub fn stats(&self) -> BusStats {
        self.canbus.stats()
    }
}

impl<D: CanDriver + 'static> Drop for EcuNode<D> {
    fn drop(&mut self) {
        self.stop();
    }
}
