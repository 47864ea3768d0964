//! Hardware driver seam
//!
//! The CAN controller itself lives outside this crate. A driver only has to read
//! and write single frames and, when interrupts are enabled, hand received frames
//! to the [`RxInterrupt`] it was given during setup.

use crate::error::DriverError;
use crate::frame::{Address, CanFrame};
use ring_buffer::RingBuffer;
use std::sync::Arc;

/// CAN controller driver
///
/// Methods take `&self`: drivers own their register-level synchronization so the
/// bus can be shared between the receive drain and transmit callers.
pub trait CanDriver: Send + Sync {
    /// Initialize the controller and accept only the given addresses
    fn begin(&self, filters: &[Address]) -> Result<(), DriverError>;

    /// Install the receive interrupt handler
    fn attach_interrupt(&self, isr: RxInterrupt);

    /// Route received frames through the interrupt handler (true) or keep them
    /// in the hardware FIFO for [`CanDriver::read`] (false).
    ///
    /// Enabling must hand frames already pending in the FIFO to the handler
    /// before any newer frame, so arrival order survives the mode switch.
    fn set_interrupts(&self, enable: bool);

    /// Take one pending frame from the hardware FIFO, if any
    fn read(&self) -> Option<CanFrame>;

    /// Queue one frame for transmission
    fn write(&self, frame: &CanFrame) -> Result<(), DriverError>;
}

/// Producer end of the receive queue, called from interrupt context.
///
/// Deliberately not `Clone`: the queue behind it has exactly one producer.
pub struct RxInterrupt {
    queue: Arc<RingBuffer<CanFrame>>,
}

impl RxInterrupt {
    pub(crate) fn new(queue: Arc<RingBuffer<CanFrame>>) -> Self {
        Self { queue }
    }

    /// Hand a received frame to the drain step.
    ///
    /// Never blocks or allocates. Returns false when the queue is full and the
    /// frame was dropped.
    pub fn on_frame(&self, frame: CanFrame) -> bool {
        self.queue.push(frame).is_ok()
    }
}

impl std::fmt::Debug for RxInterrupt {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RxInterrupt")
            .field("queued", &self.queue.len())
            .field("capacity", &self.queue.capacity())
            .finish()
    }
}
