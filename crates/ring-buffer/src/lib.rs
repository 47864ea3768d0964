//! Lock-Free Ring Buffer
//!
//! Provides a fixed-capacity SPSC ring buffer. The producer side is meant to run
//! in interrupt context: pushing never blocks and never allocates.

mod buffer;

pub use buffer::{RingBuffer, DEFAULT_CAPACITY};
