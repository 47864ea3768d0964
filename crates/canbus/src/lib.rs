//! CAN Bus Core
//!
//! Message routing for an ECU on a single CAN segment: a fixed table of known
//! addresses, one 8-byte buffer per address, at most one callback per incoming
//! address, and a transport that moves frames between the driver and the buffers.
//!
//! Receive interrupts only push frames into a lock-free queue. Buffer updates and
//! callbacks happen when the application calls [`Canbus::update`].

mod address;
mod buffer;
mod callback;
mod driver;
mod error;
mod frame;
mod sim;
mod transport;

pub use address::{AddressEntry, AddressTable, AddressTableBuilder, Direction};
pub use buffer::{BufferTable, FrameBuffer};
pub use callback::{CallbackRegistry, CanCallback};
pub use driver::{CanDriver, RxInterrupt};
pub use error::{CanError, DriverError};
pub use frame::{Address, CanFrame, Payload, FRAME_LEN};
pub use sim::{SimBus, SimDriver, DEFAULT_FIFO_DEPTH};
pub use transport::{BusStats, Canbus};
