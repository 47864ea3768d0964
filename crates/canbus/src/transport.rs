//! Bus Transport
//!
//! Bridges the CAN driver to the frame buffers and callbacks. Receive interrupts
//! only enqueue frames; [`Canbus::update`] drains them and does the buffer update
//! and callback dispatch outside interrupt context.

use crate::address::{AddressTable, Direction};
use crate::buffer::{BufferTable, FrameBuffer};
use crate::callback::{CallbackRegistry, CanCallback};
use crate::driver::{CanDriver, RxInterrupt};
use crate::error::CanError;
use crate::frame::{Address, CanFrame, Payload, FRAME_LEN};
use ring_buffer::{RingBuffer, DEFAULT_CAPACITY};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info, trace, warn};

/// Frame counters since creation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BusStats {
    /// Frames stored into an incoming buffer
    pub received: u64,
    /// Frames drained for unknown or outgoing addresses
    pub discarded: u64,
    /// Frames lost because the interrupt queue was full
    pub dropped: u64,
    /// Frames handed to the driver
    pub transmitted: u64,
    /// Frames waiting in the interrupt queue
    pub queued: usize,
}

/// Resets the drain flag even if a callback panics
struct DrainGuard<'a>(&'a AtomicBool);

impl Drop for DrainGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// CAN bus transport, one per physical bus
pub struct Canbus<D: CanDriver> {
    driver: D,
    buffers: BufferTable,
    callbacks: CallbackRegistry,
    rx_queue: Arc<RingBuffer<CanFrame>>,
    interrupts: AtomicBool,
    sniffer: AtomicBool,
    is_setup: AtomicBool,
    draining: AtomicBool,
    received: AtomicU64,
    discarded: AtomicU64,
    transmitted: AtomicU64,
}

impl<D: CanDriver> Canbus<D> {
    /// Create a transport with the default interrupt queue capacity
    pub fn new(table: AddressTable, driver: D) -> Self {
        Self::with_queue_capacity(table, driver, DEFAULT_CAPACITY)
    }

    /// Create a transport; every buffer and queue slot is allocated here
    pub fn with_queue_capacity(table: AddressTable, driver: D, capacity: usize) -> Self {
        let callbacks = CallbackRegistry::new(table.len());
        Self {
            driver,
            buffers: BufferTable::new(table),
            callbacks,
            rx_queue: Arc::new(RingBuffer::new(capacity)),
            interrupts: AtomicBool::new(false),
            sniffer: AtomicBool::new(false),
            is_setup: AtomicBool::new(false),
            draining: AtomicBool::new(false),
            received: AtomicU64::new(0),
            discarded: AtomicU64::new(0),
            transmitted: AtomicU64::new(0),
        }
    }

    /// Initialize the controller, install mailbox filters for every incoming
    /// address and enable receive interrupts
    pub fn setup(&self) -> Result<(), CanError> {
        if self.is_setup.swap(true, Ordering::AcqRel) {
            return Err(CanError::AlreadySetup);
        }

        let filters: Vec<Address> = self.buffers.table().incoming().collect();
        if let Err(e) = self.driver.begin(&filters) {
            self.is_setup.store(false, Ordering::Release);
            return Err(e.into());
        }

        self.driver
            .attach_interrupt(RxInterrupt::new(Arc::clone(&self.rx_queue)));
        self.enable_interrupts(true);

        info!(
            "CAN bus set up: {} incoming, {} outgoing addresses",
            filters.len(),
            self.buffers.table().outgoing().count()
        );
        Ok(())
    }

    /// Toggle interrupt-driven receive.
    ///
    /// With interrupts off, frames stay in the hardware FIFO and [`Canbus::update`]
    /// must run often enough to keep it from overflowing.
    pub fn enable_interrupts(&self, enable: bool) {
        self.interrupts.store(enable, Ordering::Release);
        self.driver.set_interrupts(enable);
        debug!("CAN receive interrupts {}", if enable { "enabled" } else { "disabled" });
    }

    pub fn interrupts_enabled(&self) -> bool {
        self.interrupts.load(Ordering::Acquire)
    }

    /// Trace every drained frame, known or not
    pub fn enable_sniffer(&self, enable: bool) {
        self.sniffer.store(enable, Ordering::Relaxed);
    }

    pub fn sniffer_enabled(&self) -> bool {
        self.sniffer.load(Ordering::Relaxed)
    }

    /// Drain interrupt-queued frames, then anything still in the hardware FIFO.
    ///
    /// Returns the number of frames processed. A call racing another `update`
    /// returns 0 immediately instead of waiting.
    pub fn update(&self) -> usize {
        if self.draining.swap(true, Ordering::Acquire) {
            return 0;
        }
        let _guard = DrainGuard(&self.draining);

        let mut drained = 0;
        while let Some(frame) = self.rx_queue.pop() {
            self.receive(frame);
            drained += 1;
        }
        while let Some(frame) = self.driver.read() {
            self.receive(frame);
            drained += 1;
        }

        if drained > 0 {
            metrics::counter!("canbus_rx_dropped_total")
                .absolute(self.rx_queue.total_dropped() as u64);
        }
        drained
    }

    fn receive(&self, frame: CanFrame) {
        if self.sniffer.load(Ordering::Relaxed) {
            info!(target: "canbus::sniffer", "{}", frame);
        }

        let slot = match self.buffers.table().resolve(frame.id, Direction::Incoming) {
            Ok(slot) => slot,
            Err(e) => {
                trace!("Discarding frame: {}", e);
                self.discarded.fetch_add(1, Ordering::Relaxed);
                metrics::counter!("canbus_rx_discarded_total").increment(1);
                return;
            }
        };

        let buffer = self.buffers.slot(slot);
        buffer.store(frame.data);
        self.received.fetch_add(1, Ordering::Relaxed);
        metrics::counter!("canbus_rx_frames_total").increment(1);

        if buffer.semaphore() {
            trace!("Callback for 0x{:03X} suppressed by semaphore", frame.id);
            return;
        }
        if let Some(callback) = self.callbacks.get(slot) {
            callback(frame.id, &frame.data);
        }
    }

    /// Current payload of an incoming address
    pub fn get_data(&self, address: Address) -> Result<Payload, CanError> {
        self.buffers
            .get_directed(address, Direction::Incoming)
            .map(FrameBuffer::load)
    }

    /// Buffer of any configured address, for monitoring or semaphore control.
    ///
    /// Incoming buffers are owned by the receive path and should only be read.
    pub fn get_buffer(&self, address: Address) -> Result<&FrameBuffer, CanError> {
        self.buffers.get(address)
    }

    /// Prepare the payload of an outgoing address for [`Canbus::push_data`]
    pub fn set_data(&self, address: Address, data: Payload) -> Result<(), CanError> {
        self.buffers
            .get_directed(address, Direction::Outgoing)?
            .store(data);
        Ok(())
    }

    /// Register the callback of an incoming address, replacing any previous one
    pub fn add_callback<F>(&self, address: Address, callback: F) -> Result<(), CanError>
    where
        F: Fn(Address, &Payload) + Send + Sync + 'static,
    {
        let slot = self.buffers.table().resolve(address, Direction::Incoming)?;
        let callback: CanCallback = Arc::new(callback);
        if self.callbacks.register(slot, callback).is_some() {
            debug!("Replaced callback for 0x{:03X}", address);
        }
        Ok(())
    }

    /// Remove the callback of an incoming address; true if one was registered
    pub fn remove_callback(&self, address: Address) -> Result<bool, CanError> {
        let slot = self.buffers.table().resolve(address, Direction::Incoming)?;
        Ok(self.callbacks.remove(slot).is_some())
    }

    /// Transmit the buffered payload of an outgoing address.
    ///
    /// Unknown and incoming addresses are ignored; only a driver failure is an error.
    pub fn push_data(&self, address: Address) -> Result<(), CanError> {
        match self.buffers.get_directed(address, Direction::Outgoing) {
            Ok(buffer) => self.transmit(CanFrame::new(address, buffer.load())),
            Err(e) => {
                debug!("push_data ignored: {}", e);
                Ok(())
            }
        }
    }

    /// Transmit raw bytes without touching the stored buffer.
    ///
    /// The address is not checked: sending on an incoming address is a caller bug.
    pub fn send_data(&self, address: Address, data: Payload) -> Result<(), CanError> {
        self.transmit(CanFrame::new(address, data))
    }

    /// Like [`Canbus::send_data`], zero-filling any bytes not given
    pub fn send_bytes(&self, address: Address, bytes: &[u8]) -> Result<(), CanError> {
        if bytes.len() > FRAME_LEN {
            return Err(CanError::PayloadTooLong(bytes.len()));
        }
        let mut data = [0u8; FRAME_LEN];
        data[..bytes.len()].copy_from_slice(bytes);
        self.send_data(address, data)
    }

    fn transmit(&self, frame: CanFrame) -> Result<(), CanError> {
        if let Err(e) = self.driver.write(&frame) {
            warn!("Failed to transmit 0x{:03X}: {}", frame.id, e);
            return Err(e.into());
        }
        self.transmitted.fetch_add(1, Ordering::Relaxed);
        metrics::counter!("canbus_tx_frames_total").increment(1);
        Ok(())
    }

    /// Frame counters
    pub fn stats(&self) -> BusStats {
        BusStats {
            received: self.received.load(Ordering::Relaxed),
            discarded: self.discarded.load(Ordering::Relaxed),
            dropped: self.rx_queue.total_dropped() as u64,
            transmitted: self.transmitted.load(Ordering::Relaxed),
            queued: self.rx_queue.len(),
        }
    }

    /// Address table the bus was built with
    pub fn table(&self) -> &AddressTable {
        self.buffers.table()
    }

    /// Underlying driver
    pub fn driver(&self) -> &D {
        &self.driver
    }
}

impl<D: CanDriver> std::fmt::Debug for Canbus<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Canbus")
            .field("addresses", &self.buffers.len())
            .field("callbacks", &self.callbacks)
            .field("interrupts", &self.interrupts_enabled())
            .field("stats", &self.stats())
            .finish()
    }
}
