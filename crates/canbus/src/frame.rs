//! CAN frame types

use serde::{Deserialize, Serialize};
use std::fmt;

/// Number of payload bytes in every frame
pub const FRAME_LEN: usize = 8;

/// CAN identifier
pub type Address = u32;

/// Fixed-width frame payload
pub type Payload = [u8; FRAME_LEN];

/// A single CAN frame as seen by the hardware
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CanFrame {
    pub id: Address,
    pub data: Payload,
}

impl CanFrame {
    pub fn new(id: Address, data: Payload) -> Self {
        Self { id, data }
    }
}

/// Sniffer trace format: `0x100 [8] 01 02 03 04 05 06 07 08`
impl fmt::Display for CanFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:03X} [{}]", self.id, FRAME_LEN)?;
        for byte in &self.data {
            write!(f, " {:02X}", byte)?;
        }
        Ok(())
    }
}

/// Pack a payload into one machine word
pub(crate) fn pack(data: &Payload) -> u64 {
    u64::from_le_bytes(*data)
}

/// Inverse of [`pack`]
pub(crate) fn unpack(word: u64) -> Payload {
    word.to_le_bytes()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_trace() {
        let frame = CanFrame::new(0x100, [1, 2, 3, 4, 5, 6, 7, 0xAB]);
        assert_eq!(frame.to_string(), "0x100 [8] 01 02 03 04 05 06 07 AB");
    }

    #[test]
    fn test_display_extended_id() {
        let frame = CanFrame::new(0x18FF_0001, [0; 8]);
        assert!(frame.to_string().starts_with("0x18FF0001 [8]"));
    }

    #[test]
    fn test_pack_preserves_byte_order() {
        let data = [9, 0, 0, 0, 0, 0, 0, 0x80];
        assert_eq!(unpack(pack(&data)), data);
        assert_eq!(pack(&data) & 0xFF, 9);
    }
}
