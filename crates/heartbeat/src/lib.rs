//! CAN Heartbeat
//!
//! One ECU transmits a heartbeat frame on a fixed period; its peer watches for it
//! and reports the link stale once nothing has arrived for interval + timeout.
//! Tick callbacks piggyback on the transmit timer for periodic application work.

mod config;
mod error;
mod indicator;
mod receiver;
mod transmitter;

pub use config::HeartbeatConfig;
pub use error::HeartbeatError;
pub use indicator::{Indicator, LivenessLed, NoIndicator, TraceIndicator};
pub use receiver::{BeatStatus, HeartbeatReceiver, ReceiverState};
pub use transmitter::{HeartbeatTransmitter, TickCallback};

use canbus::{CanDriver, Canbus};
use std::sync::Arc;
use tokio::task::JoinHandle;

/// Both heartbeat halves bound to one bus and one liveness LED
pub struct Heartbeat<D: CanDriver + 'static> {
    canbus: Arc<Canbus<D>>,
    transmitter: Arc<HeartbeatTransmitter<D>>,
    receiver: Arc<HeartbeatReceiver>,
}

impl<D: CanDriver + 'static> Heartbeat<D> {
    pub fn new(
        canbus: Arc<Canbus<D>>,
        config: HeartbeatConfig,
        led: Arc<LivenessLed>,
    ) -> Result<Self, HeartbeatError> {
        let transmitter = Arc::new(HeartbeatTransmitter::new(
            Arc::clone(&canbus),
            config.clone(),
            Arc::clone(&led),
        )?);
        let receiver = Arc::new(HeartbeatReceiver::new(config, led)?);
        Ok(Self {
            canbus,
            transmitter,
            receiver,
        })
    }

    /// Start transmitting on the heartbeat timer
    pub fn begin_beating(&self) -> JoinHandle<()> {
        self.transmitter.begin_beating()
    }

    /// Start watching the peer's heartbeat
    pub fn begin_receiving(&self) -> Result<(), HeartbeatError> {
        self.receiver.begin_receiving(&self.canbus)
    }

    /// Poll peer liveness
    pub fn check_beat(&self) -> BeatStatus {
        self.receiver.check_beat()
    }

    /// Run `tick` on every transmitted heartbeat; false if already registered
    pub fn add_callback(&self, tick: TickCallback) -> bool {
        self.transmitter.add_callback(tick)
    }

    pub fn transmitter(&self) -> &Arc<HeartbeatTransmitter<D>> {
        &self.transmitter
    }

    pub fn receiver(&self) -> &Arc<HeartbeatReceiver> {
        &self.receiver
    }
}
