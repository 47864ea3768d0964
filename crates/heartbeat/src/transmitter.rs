//! Heartbeat transmitter

use crate::config::HeartbeatConfig;
use crate::error::HeartbeatError;
use crate::indicator::LivenessLed;
use canbus::{CanDriver, Canbus, FRAME_LEN};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{info, warn};

/// Function run on every transmitted heartbeat
pub type TickCallback = Arc<dyn Fn() + Send + Sync>;

/// Fixed-period heartbeat sender
pub struct HeartbeatTransmitter<D: CanDriver> {
    canbus: Arc<Canbus<D>>,
    config: HeartbeatConfig,
    led: Arc<LivenessLed>,
    /// Replaced wholesale on registration so a tick only clones one `Arc`
    ticks: RwLock<Arc<[TickCallback]>>,
    sent: AtomicU64,
    failed: AtomicU64,
}

impl<D: CanDriver + 'static> HeartbeatTransmitter<D> {
    pub fn new(
        canbus: Arc<Canbus<D>>,
        config: HeartbeatConfig,
        led: Arc<LivenessLed>,
    ) -> Result<Self, HeartbeatError> {
        config.validate()?;
        Ok(Self {
            canbus,
            config,
            led,
            ticks: RwLock::new(Arc::from(Vec::new())),
            sent: AtomicU64::new(0),
            failed: AtomicU64::new(0),
        })
    }

    fn snapshot(&self) -> Arc<[TickCallback]> {
        let ticks = self.ticks.read().unwrap_or_else(|poisoned| poisoned.into_inner());
        Arc::clone(&ticks)
    }

    /// Register a tick callback; returns false if this exact callback is already registered
    pub fn add_callback(&self, tick: TickCallback) -> bool {
        let mut ticks = self.ticks.write().unwrap_or_else(|poisoned| poisoned.into_inner());
        if ticks.iter().any(|t| Arc::ptr_eq(t, &tick)) {
            return false;
        }
        let mut next: Vec<TickCallback> = ticks.iter().cloned().collect();
        next.push(tick);
        *ticks = Arc::from(next);
        true
    }

    /// Unregister a tick callback; returns false if it was not registered
    pub fn remove_callback(&self, tick: &TickCallback) -> bool {
        let mut ticks = self.ticks.write().unwrap_or_else(|poisoned| poisoned.into_inner());
        let before = ticks.len();
        let next: Vec<TickCallback> = ticks
            .iter()
            .filter(|t| !Arc::ptr_eq(*t, tick))
            .cloned()
            .collect();
        let removed = next.len() != before;
        *ticks = Arc::from(next);
        removed
    }

    /// Number of registered tick callbacks
    pub fn callbacks(&self) -> usize {
        self.snapshot().len()
    }

    /// One heartbeat: send the frame, blink, run tick callbacks
    pub fn beat(&self) {
        match self.canbus.send_data(self.config.address, [0; FRAME_LEN]) {
            Ok(()) => {
                self.sent.fetch_add(1, Ordering::Relaxed);
            }
            Err(e) => {
                self.failed.fetch_add(1, Ordering::Relaxed);
                warn!("Heartbeat transmit failed: {}", e);
            }
        }
        self.led.toggle();

        for tick in self.snapshot().iter() {
            tick();
        }
    }

    /// Start the periodic timer. The first beat goes out one interval from now.
    pub fn begin_beating(self: &Arc<Self>) -> JoinHandle<()> {
        let transmitter = Arc::clone(self);
        info!(
            "Heartbeat on 0x{:03X} every {}ms",
            self.config.address, self.config.interval_ms
        );
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(transmitter.config.interval());
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                transmitter.beat();
            }
        })
    }

    /// Heartbeats handed to the driver
    pub fn sent(&self) -> u64 {
        self.sent.load(Ordering::Relaxed)
    }

    /// Heartbeats the driver refused
    pub fn failed(&self) -> u64 {
        self.failed.load(Ordering::Relaxed)
    }

    pub fn config(&self) -> &HeartbeatConfig {
        &self.config
    }
}
