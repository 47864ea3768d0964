//! Simulated CAN segment
//!
//! Stands in for the CAN controller on host builds and in tests. Any number of
//! nodes attach to one [`SimBus`]; a frame written by one node is delivered to
//! every other node whose mailbox filters accept it.

use crate::driver::{CanDriver, RxInterrupt};
use crate::error::DriverError;
use crate::frame::{Address, CanFrame};
use std::collections::{HashSet, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, trace};

/// Default hardware receive FIFO depth
pub const DEFAULT_FIFO_DEPTH: usize = 16;

#[derive(Debug)]
struct SimNode {
    /// `None` until `begin` runs; a node that never began hears nothing
    filters: Option<HashSet<Address>>,
    accept_all: bool,
    isr: Option<RxInterrupt>,
    interrupts: bool,
    fifo: VecDeque<CanFrame>,
    fifo_depth: usize,
    overflows: usize,
    tx_error: Option<DriverError>,
}

impl SimNode {
    fn accepts(&self, id: Address) -> bool {
        match &self.filters {
            Some(filters) => self.accept_all || filters.contains(&id),
            None => false,
        }
    }

    fn deliver(&mut self, frame: CanFrame) {
        match &self.isr {
            Some(isr) if self.interrupts => {
                isr.on_frame(frame);
            }
            _ => {
                if self.fifo.len() < self.fifo_depth {
                    self.fifo.push_back(frame);
                } else {
                    self.overflows += 1;
                    trace!("Simulated FIFO overflow, dropping 0x{:03X}", frame.id);
                }
            }
        }
    }
}

#[derive(Debug, Default)]
struct Segment {
    nodes: Vec<SimNode>,
    traffic: Vec<CanFrame>,
}

impl Segment {
    fn broadcast(&mut self, sender: Option<usize>, frame: CanFrame) {
        self.traffic.push(frame);
        for (i, node) in self.nodes.iter_mut().enumerate() {
            if Some(i) != sender && node.accepts(frame.id) {
                node.deliver(frame);
            }
        }
    }
}

/// Shared simulated bus segment
#[derive(Debug, Clone, Default)]
pub struct SimBus {
    inner: Arc<Mutex<Segment>>,
}

impl SimBus {
    pub fn new() -> Self {
        Self::default()
    }

    fn segment(&self) -> MutexGuard<'_, Segment> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Attach a node that only receives its configured addresses
    pub fn attach(&self) -> SimDriver {
        self.attach_node(false, DEFAULT_FIFO_DEPTH)
    }

    /// Attach a node whose mailboxes accept every address
    pub fn attach_unfiltered(&self) -> SimDriver {
        self.attach_node(true, DEFAULT_FIFO_DEPTH)
    }

    /// Attach a filtered node with a custom receive FIFO depth
    pub fn attach_with_fifo(&self, fifo_depth: usize) -> SimDriver {
        self.attach_node(false, fifo_depth)
    }

    fn attach_node(&self, accept_all: bool, fifo_depth: usize) -> SimDriver {
        let mut segment = self.segment();
        segment.nodes.push(SimNode {
            filters: None,
            accept_all,
            isr: None,
            interrupts: false,
            fifo: VecDeque::new(),
            fifo_depth,
            overflows: 0,
            tx_error: None,
        });
        let node = segment.nodes.len() - 1;
        debug!("Simulated CAN node {} attached", node);
        SimDriver {
            bus: self.clone(),
            node,
        }
    }

    /// Put a frame on the segment as if a foreign ECU sent it
    pub fn inject(&self, frame: CanFrame) {
        self.segment().broadcast(None, frame);
    }

    /// Every frame seen on the segment, oldest first
    pub fn traffic(&self) -> Vec<CanFrame> {
        self.segment().traffic.clone()
    }

    /// Frames seen on one address
    pub fn traffic_on(&self, id: Address) -> Vec<CanFrame> {
        self.segment()
            .traffic
            .iter()
            .filter(|f| f.id == id)
            .copied()
            .collect()
    }

    pub fn clear_traffic(&self) {
        self.segment().traffic.clear();
    }
}

/// Driver for one node on a [`SimBus`]
#[derive(Debug, Clone)]
pub struct SimDriver {
    bus: SimBus,
    node: usize,
}

impl SimDriver {
    fn with_node<R>(&self, f: impl FnOnce(&mut SimNode) -> R) -> R {
        let mut segment = self.bus.segment();
        f(&mut segment.nodes[self.node])
    }

    /// Segment this node is attached to
    pub fn bus(&self) -> &SimBus {
        &self.bus
    }

    /// Frames waiting in the hardware FIFO
    pub fn pending(&self) -> usize {
        self.with_node(|n| n.fifo.len())
    }

    /// Frames lost to hardware FIFO overflow
    pub fn overflows(&self) -> usize {
        self.with_node(|n| n.overflows)
    }

    /// Make every following write fail with `error` (`None` restores writes)
    pub fn set_tx_error(&self, error: Option<DriverError>) {
        self.with_node(|n| n.tx_error = error);
    }
}

impl CanDriver for SimDriver {
    fn begin(&self, filters: &[Address]) -> Result<(), DriverError> {
        self.with_node(|n| {
            n.filters = Some(filters.iter().copied().collect());
        });
        debug!("Simulated CAN node {} filtering {} addresses", self.node, filters.len());
        Ok(())
    }

    fn attach_interrupt(&self, isr: RxInterrupt) {
        self.with_node(|n| n.isr = Some(isr));
    }

    fn set_interrupts(&self, enable: bool) {
        self.with_node(|n| {
            n.interrupts = enable;
            if !enable {
                return;
            }
            // Pending mailboxes raise the interrupt as soon as it is unmasked.
            if let Some(isr) = &n.isr {
                while let Some(frame) = n.fifo.pop_front() {
                    if !isr.on_frame(frame) {
                        trace!("Receive queue full, dropping pending 0x{:03X}", frame.id);
                    }
                }
            }
        });
    }

    fn read(&self) -> Option<CanFrame> {
        self.with_node(|n| n.fifo.pop_front())
    }

    fn write(&self, frame: &CanFrame) -> Result<(), DriverError> {
        let mut segment = self.bus.segment();
        let node = &segment.nodes[self.node];
        if node.filters.is_none() {
            return Err(DriverError::NotInitialized);
        }
        if let Some(error) = node.tx_error.clone() {
            return Err(error);
        }
        segment.broadcast(Some(self.node), *frame);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filtered_delivery_to_fifo() {
        let bus = SimBus::new();
        let a = bus.attach();
        let b = bus.attach();
        a.begin(&[]).unwrap();
        b.begin(&[0x100]).unwrap();

        a.write(&CanFrame::new(0x100, [1; 8])).unwrap();
        a.write(&CanFrame::new(0x101, [2; 8])).unwrap();

        assert_eq!(b.pending(), 1);
        assert_eq!(b.read(), Some(CanFrame::new(0x100, [1; 8])));
        assert_eq!(b.read(), None);
        assert_eq!(bus.traffic().len(), 2);
    }

    #[test]
    fn test_sender_does_not_hear_itself() {
        let bus = SimBus::new();
        let a = bus.attach_unfiltered();
        a.begin(&[]).unwrap();
        a.write(&CanFrame::new(0x100, [0; 8])).unwrap();
        assert_eq!(a.pending(), 0);
    }

    #[test]
    fn test_fifo_overflow_drops_newest() {
        let bus = SimBus::new();
        let rx = bus.attach_with_fifo(2);
        rx.begin(&[0x100]).unwrap();

        for i in 0..4u8 {
            bus.inject(CanFrame::new(0x100, [i; 8]));
        }

        assert_eq!(rx.pending(), 2);
        assert_eq!(rx.overflows(), 2);
        assert_eq!(rx.read().unwrap().data, [0; 8]);
    }

    #[test]
    fn test_enabling_interrupts_flushes_pending_fifo() {
        let bus = SimBus::new();
        let rx = bus.attach();
        let queue = Arc::new(ring_buffer::RingBuffer::new(8));
        rx.begin(&[0x100]).unwrap();
        rx.attach_interrupt(RxInterrupt::new(Arc::clone(&queue)));

        bus.inject(CanFrame::new(0x100, [1; 8]));
        assert_eq!(rx.pending(), 1);

        rx.set_interrupts(true);
        bus.inject(CanFrame::new(0x100, [2; 8]));

        assert_eq!(rx.pending(), 0);
        assert_eq!(queue.pop().map(|f: CanFrame| f.data), Some([1; 8]));
        assert_eq!(queue.pop().map(|f: CanFrame| f.data), Some([2; 8]));
    }

    #[test]
    fn test_write_before_begin_fails() {
        let bus = SimBus::new();
        let a = bus.attach();
        assert_eq!(
            a.write(&CanFrame::default()),
            Err(DriverError::NotInitialized)
        );
    }

    #[test]
    fn test_tx_error_injection() {
        let bus = SimBus::new();
        let a = bus.attach();
        a.begin(&[]).unwrap();
        a.set_tx_error(Some(DriverError::BusOff));
        assert_eq!(a.write(&CanFrame::default()), Err(DriverError::BusOff));
        a.set_tx_error(None);
        assert!(a.write(&CanFrame::default()).is_ok());
    }
}
