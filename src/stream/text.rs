//! Fixed and length-prefixed text fields kept as raw bytes
//!
//! Vendor files fill name and version fields with whatever the authoring
//! tool had in memory: Latin-1 text, a NUL terminator and then stale bytes
//! up to the field width. Decoding keeps all of it so an unmodified field
//! encodes back to the same bytes; [`RawText::text`] gives the readable part.

use std::fmt;

use serde::{Serialize, Serializer};

/// Text field stored exactly as it appeared in the file
#[derive(Clone, Default, PartialEq, Eq, Hash)]
pub struct RawText(Vec<u8>);

impl RawText {
    /// Wrap raw field bytes
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    /// Bytes as stored, including any NUL and trailing garbage
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Take the stored bytes
    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }

    /// Stored length in bytes
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// True if nothing is stored
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Readable text: everything before the first NUL, decoded as Latin-1
    pub fn text(&self) -> String {
        let end = self.0.iter().position(|&b| b == 0).unwrap_or(self.0.len());
        self.0[..end].iter().map(|&b| b as char).collect()
    }
}

impl fmt::Display for RawText {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text())
    }
}

impl fmt::Debug for RawText {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.text())
    }
}

impl Serialize for RawText {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.text())
    }
}

impl From<&str> for RawText {
    fn from(text: &str) -> Self {
        Self(text.as_bytes().to_vec())
    }
}

impl From<String> for RawText {
    fn from(text: String) -> Self {
        Self(text.into_bytes())
    }
}

impl From<Vec<u8>> for RawText {
    fn from(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }
}

impl From<&[u8]> for RawText {
    fn from(bytes: &[u8]) -> Self {
        Self(bytes.to_vec())
    }
}

impl PartialEq<str> for RawText {
    fn eq(&self, other: &str) -> bool {
        self.0 == other.as_bytes()
    }
}

impl PartialEq<&str> for RawText {
    fn eq(&self, other: &&str) -> bool {
        self.0 == other.as_bytes()
    }
}
