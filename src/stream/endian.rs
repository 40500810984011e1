//! Byte order selection

use serde::{Deserialize, Serialize};

/// Byte order of multi-byte integers in a container
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Endian {
    /// Most significant byte first (IFF/AIFF, classic Mac files)
    Big,
    /// Least significant byte first (RIFF, the vendor containers)
    Little,
}

impl Endian {
    /// Decode a u32 from four bytes
    pub fn u32_from(self, bytes: [u8; 4]) -> u32 {
        match self {
            Endian::Big => u32::from_be_bytes(bytes),
            Endian::Little => u32::from_le_bytes(bytes),
        }
    }

    /// Encode a u32 as four bytes
    pub fn u32_to(self, value: u32) -> [u8; 4] {
        match self {
            Endian::Big => value.to_be_bytes(),
            Endian::Little => value.to_le_bytes(),
        }
    }
}

impl std::fmt::Display for Endian {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Endian::Big => write!(f, "big-endian"),
            Endian::Little => write!(f, "little-endian"),
        }
    }
}
