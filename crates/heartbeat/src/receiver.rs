//! Heartbeat receiver
//!
//! Timestamps the last heartbeat seen from the peer ECU. Liveness is polled with
//! [`HeartbeatReceiver::check_beat`]; nothing is pushed when the peer goes quiet.

use crate::config::HeartbeatConfig;
use crate::error::HeartbeatError;
use crate::indicator::LivenessLed;
use canbus::{CanDriver, Canbus};
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::time::Instant;
use tracing::{debug, warn};

/// Result of a liveness check
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum BeatStatus {
    /// Heartbeat seen within interval + timeout
    Alive,
    /// No heartbeat for interval + timeout or longer
    Stale,
}

impl BeatStatus {
    pub fn is_alive(&self) -> bool {
        matches!(self, BeatStatus::Alive)
    }
}

/// Receiver lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ReceiverState {
    /// No heartbeat yet, still inside the first window
    Awaiting,
    Alive,
    Stale,
}

/// Peer heartbeat watchdog
pub struct HeartbeatReceiver {
    config: HeartbeatConfig,
    /// Zero point for the millisecond counters below
    epoch: Instant,
    /// When the elapsed counter was last reset (ms since epoch)
    last_beat_ms: AtomicU64,
    /// Gap between the two most recent heartbeats (ms)
    last_interval_ms: AtomicU64,
    beats: AtomicU64,
    led: Arc<LivenessLed>,
}

impl HeartbeatReceiver {
    pub fn new(config: HeartbeatConfig, led: Arc<LivenessLed>) -> Result<Self, HeartbeatError> {
        config.validate()?;
        Ok(Self {
            config,
            epoch: Instant::now(),
            last_beat_ms: AtomicU64::new(0),
            last_interval_ms: AtomicU64::new(0),
            beats: AtomicU64::new(0),
            led,
        })
    }

    fn now_ms(&self) -> u64 {
        Instant::now().duration_since(self.epoch).as_millis() as u64
    }

    /// Register on the heartbeat address and restart the elapsed counter
    pub fn begin_receiving<D: CanDriver>(
        self: &Arc<Self>,
        canbus: &Canbus<D>,
    ) -> Result<(), HeartbeatError> {
        let receiver = Arc::clone(self);
        canbus.add_callback(self.config.address, move |_, _| receiver.receive_beat())?;
        self.last_beat_ms.store(self.now_ms(), Ordering::Release);
        debug!("Listening for heartbeat on 0x{:03X}", self.config.address);
        Ok(())
    }

    /// Record a heartbeat from the peer
    pub fn receive_beat(&self) {
        let now = self.now_ms();
        let previous = self.last_beat_ms.swap(now, Ordering::AcqRel);
        self.last_interval_ms
            .store(now.saturating_sub(previous), Ordering::Release);
        self.beats.fetch_add(1, Ordering::Relaxed);
        self.led.toggle();
    }

    /// Milliseconds since the last heartbeat (or since receiving began)
    pub fn elapsed_ms(&self) -> u64 {
        self.now_ms()
            .saturating_sub(self.last_beat_ms.load(Ordering::Acquire))
    }

    /// Gap between the two most recent heartbeats
    pub fn last_interval_ms(&self) -> u64 {
        self.last_interval_ms.load(Ordering::Acquire)
    }

    /// Heartbeats received so far
    pub fn beats(&self) -> u64 {
        self.beats.load(Ordering::Relaxed)
    }

    fn is_stale(&self, elapsed: u64) -> bool {
        elapsed >= self.config.threshold_ms()
    }

    /// Poll peer liveness; logs a warning with the elapsed time when stale
    pub fn check_beat(&self) -> BeatStatus {
        let elapsed = self.elapsed_ms();
        if self.is_stale(elapsed) {
            warn!(elapsed_ms = elapsed, "Heartbeat is taking too long");
            return BeatStatus::Stale;
        }
        BeatStatus::Alive
    }

    /// Like [`HeartbeatReceiver::check_beat`] but tells "no beat yet" apart, and
    /// does not log
    pub fn state(&self) -> ReceiverState {
        if self.is_stale(self.elapsed_ms()) {
            ReceiverState::Stale
        } else if self.beats() == 0 {
            ReceiverState::Awaiting
        } else {
            ReceiverState::Alive
        }
    }

    pub fn config(&self) -> &HeartbeatConfig {
        &self.config
    }
}

impl std::fmt::Debug for HeartbeatReceiver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HeartbeatReceiver")
            .field("address", &self.config.address)
            .field("beats", &self.beats())
            .field("last_interval_ms", &self.last_interval_ms())
            .finish()
    }
}
