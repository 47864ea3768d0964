//! Frame Buffer Table
//!
//! Holds the last known payload of every configured address. Each payload lives in
//! a single atomic word, so a reader racing the receive path gets either the old or
//! the new frame, never a mix of both.

use crate::address::{AddressTable, Direction};
use crate::error::CanError;
use crate::frame::{pack, unpack, Address, Payload};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

/// Storage for one address
#[derive(Debug, Default)]
pub struct FrameBuffer {
    data: AtomicU64,
    semaphore: AtomicBool,
}

impl FrameBuffer {
    /// Snapshot the current payload
    pub fn load(&self) -> Payload {
        unpack(self.data.load(Ordering::Acquire))
    }

    /// Overwrite the payload
    pub fn store(&self, data: Payload) {
        self.data.store(pack(&data), Ordering::Release);
    }

    /// Set or clear the callback suppression flag.
    ///
    /// Reads through [`FrameBuffer::load`] are never gated by this flag.
    pub fn set_semaphore(&self, locked: bool) {
        self.semaphore.store(locked, Ordering::Release);
    }

    pub fn semaphore(&self) -> bool {
        self.semaphore.load(Ordering::Acquire)
    }
}

/// One [`FrameBuffer`] per configured address, allocated up front
#[derive(Debug)]
pub struct BufferTable {
    table: AddressTable,
    buffers: Box<[FrameBuffer]>,
}

impl BufferTable {
    pub fn new(table: AddressTable) -> Self {
        let buffers: Vec<FrameBuffer> = (0..table.len()).map(|_| FrameBuffer::default()).collect();
        Self {
            table,
            buffers: buffers.into_boxed_slice(),
        }
    }

    /// Address table the buffers are keyed by
    pub fn table(&self) -> &AddressTable {
        &self.table
    }

    /// Buffer of any configured address
    pub fn get(&self, address: Address) -> Result<&FrameBuffer, CanError> {
        self.table
            .index_of(address)
            .map(|slot| &self.buffers[slot])
            .ok_or(CanError::UnknownAddress(address))
    }

    /// Buffer of an address that must have the given direction
    pub fn get_directed(&self, address: Address, direction: Direction) -> Result<&FrameBuffer, CanError> {
        let slot = self.table.resolve(address, direction)?;
        Ok(&self.buffers[slot])
    }

    /// Overwrite the buffer of a configured address
    pub fn write(&self, address: Address, data: Payload) -> Result<(), CanError> {
        self.get(address)?.store(data);
        Ok(())
    }

    /// Buffer by dense index
    pub(crate) fn slot(&self, index: usize) -> &FrameBuffer {
        &self.buffers[index]
    }

    pub fn len(&self) -> usize {
        self.buffers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffers.is_empty()
    }
}
