//! CAN Error Types

use crate::address::Direction;
use crate::frame::Address;
use thiserror::Error;

/// Errors reported by the CAN core
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CanError {
    /// Address is not part of the configured address table
    #[error("Unknown CAN address 0x{0:03X}")]
    UnknownAddress(Address),

    /// Address exists but is configured for the other direction
    #[error("CAN address 0x{address:03X} is configured as {direction}")]
    WrongDirection { address: Address, direction: Direction },

    /// The same address appears twice in the address table
    #[error("CAN address 0x{0:03X} configured more than once")]
    DuplicateAddress(Address),

    /// More than eight payload bytes were supplied
    #[error("CAN payload of {0} bytes exceeds 8 bytes")]
    PayloadTooLong(usize),

    /// `setup` was called on a bus that is already running
    #[error("CAN bus already set up")]
    AlreadySetup,

    /// Hardware driver failure
    #[error("CAN driver error: {0}")]
    Driver(#[from] DriverError),
}

/// Driver errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DriverError {
    #[error("Driver initialization failed: {0}")]
    Init(String),

    #[error("Driver not initialized")]
    NotInitialized,

    #[error("CAN bus off")]
    BusOff,

    #[error("Transmit timeout")]
    Timeout,

    #[error("No free transmit mailbox")]
    TxFull,
}
