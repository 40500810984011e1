//! Four-character codes

use serde::{Serialize, Serializer};

/// A four-byte chunk tag, usually printable ASCII
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FourCc(pub [u8; 4]);

impl FourCc {
    /// Build a tag from a byte string literal
    pub const fn new(bytes: &[u8; 4]) -> Self {
        FourCc(*bytes)
    }

    /// Raw tag bytes
    pub fn as_bytes(&self) -> &[u8; 4] {
        &self.0
    }

    /// The same tag with ASCII letters upper-cased
    pub fn to_ascii_uppercase(self) -> Self {
        FourCc(self.0.map(|b| b.to_ascii_uppercase()))
    }

    /// True if every letter in the tag is lower case and at least one letter exists
    pub fn is_lowercase(&self) -> bool {
        self.0.iter().any(|b| b.is_ascii_alphabetic())
            && !self.0.iter().any(|b| b.is_ascii_uppercase())
    }
}

impl std::fmt::Display for FourCc {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for &b in &self.0 {
            if b.is_ascii_graphic() || b == b' ' {
                write!(f, "{}", b as char)?;
            } else {
                write!(f, "\\x{b:02X}")?;
            }
        }
        Ok(())
    }
}

impl std::fmt::Debug for FourCc {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "FourCc(\"{self}\")")
    }
}

impl Serialize for FourCc {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl From<&[u8; 4]> for FourCc {
    fn from(bytes: &[u8; 4]) -> Self {
        FourCc(*bytes)
    }
}
