//! Address Table
//!
//! The set of CAN addresses an ECU knows about is fixed once the table is built.
//! Every address gets a dense index, which is what buffers and callbacks are keyed by.

use crate::error::CanError;
use crate::frame::Address;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Direction of an address as seen from this ECU
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Receive-only
    Incoming,
    /// Transmit-only
    Outgoing,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Incoming => f.write_str("incoming"),
            Direction::Outgoing => f.write_str("outgoing"),
        }
    }
}

/// One configured address
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressEntry {
    pub address: Address,
    pub direction: Direction,
    /// Human readable signal name, only used in logs
    #[serde(default)]
    pub name: String,
}

impl AddressEntry {
    pub fn new(address: Address, direction: Direction, name: impl Into<String>) -> Self {
        Self {
            address,
            direction,
            name: name.into(),
        }
    }
}

/// Immutable address → index mapping
#[derive(Debug, Clone, Default)]
pub struct AddressTable {
    entries: Vec<AddressEntry>,
    index: HashMap<Address, usize>,
}

impl AddressTable {
    /// Build a table, rejecting any address listed twice
    pub fn new(entries: Vec<AddressEntry>) -> Result<Self, CanError> {
        let mut index = HashMap::with_capacity(entries.len());
        for (slot, entry) in entries.iter().enumerate() {
            if index.insert(entry.address, slot).is_some() {
                return Err(CanError::DuplicateAddress(entry.address));
            }
        }
        Ok(Self { entries, index })
    }

    /// Start a table builder
    pub fn builder() -> AddressTableBuilder {
        AddressTableBuilder::default()
    }

    /// Number of configured addresses
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Dense index of an address
    pub fn index_of(&self, address: Address) -> Option<usize> {
        self.index.get(&address).copied()
    }

    /// Entry for an address
    pub fn entry(&self, address: Address) -> Option<&AddressEntry> {
        self.index_of(address).map(|slot| &self.entries[slot])
    }

    /// Direction of an address
    pub fn direction(&self, address: Address) -> Option<Direction> {
        self.entry(address).map(|e| e.direction)
    }

    /// Resolve an address that must have the given direction
    pub fn resolve(&self, address: Address, expected: Direction) -> Result<usize, CanError> {
        let slot = self
            .index_of(address)
            .ok_or(CanError::UnknownAddress(address))?;
        let direction = self.entries[slot].direction;
        if direction != expected {
            return Err(CanError::WrongDirection { address, direction });
        }
        Ok(slot)
    }

    /// All entries in index order
    pub fn iter(&self) -> impl Iterator<Item = &AddressEntry> {
        self.entries.iter()
    }

    /// Addresses this ECU receives
    pub fn incoming(&self) -> impl Iterator<Item = Address> + '_ {
        self.entries
            .iter()
            .filter(|e| e.direction == Direction::Incoming)
            .map(|e| e.address)
    }

    /// Addresses this ECU transmits
    pub fn outgoing(&self) -> impl Iterator<Item = Address> + '_ {
        self.entries
            .iter()
            .filter(|e| e.direction == Direction::Outgoing)
            .map(|e| e.address)
    }
}

/// Builder for [`AddressTable`]
#[derive(Debug, Default)]
pub struct AddressTableBuilder {
    entries: Vec<AddressEntry>,
}

impl AddressTableBuilder {
    pub fn incoming(mut self, address: Address, name: impl Into<String>) -> Self {
        self.entries
            .push(AddressEntry::new(address, Direction::Incoming, name));
        self
    }

    pub fn outgoing(mut self, address: Address, name: impl Into<String>) -> Self {
        self.entries
            .push(AddressEntry::new(address, Direction::Outgoing, name));
        self
    }

    pub fn build(self) -> Result<AddressTable, CanError> {
        AddressTable::new(self.entries)
    }
}
