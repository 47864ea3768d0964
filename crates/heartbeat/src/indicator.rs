//! Liveness indicator

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::debug;

/// Output pin driving a liveness LED
pub trait Indicator: Send + Sync {
    fn set_indicator(&self, on: bool);
}

/// Indicator for boards without an LED
#[derive(Debug, Clone, Copy, Default)]
pub struct NoIndicator;

impl Indicator for NoIndicator {
    fn set_indicator(&self, _on: bool) {}
}

/// Indicator that only logs its state
#[derive(Debug, Clone, Default)]
pub struct TraceIndicator {
    pub name: String,
}

impl Indicator for TraceIndicator {
    fn set_indicator(&self, on: bool) {
        debug!("{} LED {}", self.name, if on { "on" } else { "off" });
    }
}

/// LED toggled by both heartbeat halves, so it blinks on sends and receipts alike
pub struct LivenessLed {
    pin: Arc<dyn Indicator>,
    on: AtomicBool,
}

impl LivenessLed {
    pub fn new(pin: Arc<dyn Indicator>) -> Self {
        Self {
            pin,
            on: AtomicBool::new(false),
        }
    }

    pub fn disabled() -> Self {
        Self::new(Arc::new(NoIndicator))
    }

    /// Flip the LED and return the new state
    pub fn toggle(&self) -> bool {
        let on = !self.on.fetch_xor(true, Ordering::AcqRel);
        self.pin.set_indicator(on);
        on
    }

    pub fn is_on(&self) -> bool {
        self.on.load(Ordering::Acquire)
    }
}

impl std::fmt::Debug for LivenessLed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LivenessLed").field("on", &self.is_on()).finish()
    }
}
