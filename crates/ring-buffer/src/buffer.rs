//! Lock-Free Ring Buffer Implementation

use std::cell::UnsafeCell;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Default buffer capacity (64 frames, four full hardware mailbox banks)
pub const DEFAULT_CAPACITY: usize = 64;

/// Lock-free SPSC ring buffer
///
/// One slot is always left empty to tell "full" from "empty", so a buffer created
/// with capacity `n` holds at most `n - 1` items.
pub struct RingBuffer<T> {
    /// Pre-allocated storage
    storage: Box<[UnsafeCell<T>]>,
    /// Capacity of the buffer
    capacity: usize,
    /// Head position (write pointer, owned by the producer)
    head: AtomicUsize,
    /// Tail position (read pointer, owned by the consumer)
    tail: AtomicUsize,
    /// Total items accepted (for statistics)
    total_written: AtomicUsize,
    /// Items rejected because the buffer was full
    total_dropped: AtomicUsize,
}

impl<T: Copy + Default> RingBuffer<T> {
    /// Create a new ring buffer with given capacity
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(2);
        let storage: Vec<UnsafeCell<T>> =
            (0..capacity).map(|_| UnsafeCell::new(T::default())).collect();
        Self {
            storage: storage.into_boxed_slice(),
            capacity,
            head: AtomicUsize::new(0),
            tail: AtomicUsize::new(0),
            total_written: AtomicUsize::new(0),
            total_dropped: AtomicUsize::new(0),
        }
    }

    /// Create a buffer with default capacity
    pub fn with_default_capacity() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }

    /// Push an item (producer side only)
    ///
    /// Rejects the item when the buffer is full; queued items are never overwritten.
    pub fn push(&self, item: T) -> Result<(), T> {
        let head = self.head.load(Ordering::Relaxed);
        let next_head = (head + 1) % self.capacity;

        if next_head == self.tail.load(Ordering::Acquire) {
            self.total_dropped.fetch_add(1, Ordering::Relaxed);
            return Err(item);
        }

        // SAFETY: single producer, and the consumer never reads the slot at `head`
        // until the Release store below publishes it.
        unsafe {
            *self.storage[head].get() = item;
        }

        self.head.store(next_head, Ordering::Release);
        self.total_written.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    /// Pop the oldest item (consumer side only)
    pub fn pop(&self) -> Option<T> {
        let tail = self.tail.load(Ordering::Relaxed);
        if tail == self.head.load(Ordering::Acquire) {
            return None;
        }

        // SAFETY: single consumer, and the producer does not write the slot at `tail`
        // until the Release store below hands it back.
        let item = unsafe { *self.storage[tail].get() };

        self.tail.store((tail + 1) % self.capacity, Ordering::Release);
        Some(item)
    }
}

impl<T> RingBuffer<T> {
    /// Get the number of items currently in the buffer
    pub fn len(&self) -> usize {
        let head = self.head.load(Ordering::Acquire);
        let tail = self.tail.load(Ordering::Acquire);
        if head >= tail {
            head - tail
        } else {
            self.capacity - tail + head
        }
    }

    /// Check if buffer is empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Check if buffer is full
    pub fn is_full(&self) -> bool {
        self.len() == self.capacity - 1
    }

    /// Get the buffer capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Get fill ratio (0.0 to 1.0)
    pub fn fill_ratio(&self) -> f64 {
        self.len() as f64 / (self.capacity - 1) as f64
    }

    /// Get total items accepted
    pub fn total_written(&self) -> usize {
        self.total_written.load(Ordering::Relaxed)
    }

    /// Get total items rejected on a full buffer
    pub fn total_dropped(&self) -> usize {
        self.total_dropped.load(Ordering::Relaxed)
    }

    /// Discard everything queued (consumer side only)
    pub fn clear(&self) {
        self.tail.store(self.head.load(Ordering::Acquire), Ordering::Release);
    }
}

// SAFETY: slots are only touched by the single producer (at `head`) or the single
// consumer (at `tail`), with ownership handed over through the Acquire/Release pair.
unsafe impl<T: Send> Send for RingBuffer<T> {}
unsafe impl<T: Send> Sync for RingBuffer<T> {}
