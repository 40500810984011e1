//! Chunk dialects and chunk-id registries
//!
//! A dialect fixes everything that differs between chunk-based containers:
//! byte order, which tags open a group, whether payloads are padded to an
//! even length, whether a group starts with a form-type prefix and whether a
//! group is terminated by an upper-case closing marker.

use std::collections::{HashMap, HashSet};

use bitflags::bitflags;

use super::{Chunk, FourCc};
use crate::stream::Endian;

bitflags! {
    /// Structural options of a chunk dialect
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct DialectFlags: u8 {
        /// Odd payloads are followed by one pad byte
        const PAD_TO_EVEN = 0x01;
        /// Group payloads begin with a four-byte form type
        const GROUP_PREFIX = 0x02;
        /// Groups end with a zero-length chunk tagged with the upper-cased group tag
        const SYMMETRIC_CLOSE = 0x04;
    }
}

/// Size of the tag + length framing in front of every chunk
pub const CHUNK_HEADER_LEN: u32 = 8;

/// Size of the form-type prefix of dialects with [`DialectFlags::GROUP_PREFIX`]
pub const GROUP_PREFIX_LEN: u32 = 4;

/// Tags that open the root group of the vendor container
pub const VENDOR_CONTAINER_TAG: FourCc = FourCc::new(b"hsin");
/// Child item list inside a vendor container group
pub const VENDOR_SUBITEMS_TAG: FourCc = FourCc::new(b"sbit");
/// Preset chunk group of the vendor container
pub const VENDOR_PRESET_TAG: FourCc = FourCc::new(b"pchk");

/// Description of one chunk container dialect
#[derive(Debug, Clone)]
pub struct Dialect {
    name: &'static str,
    endian: Endian,
    group_tags: HashSet<FourCc>,
    flags: DialectFlags,
}

impl Dialect {
    /// Create a custom dialect
    pub fn new(
        name: &'static str,
        endian: Endian,
        group_tags: impl IntoIterator<Item = FourCc>,
        flags: DialectFlags,
    ) -> Self {
        Self {
            name,
            endian,
            group_tags: group_tags.into_iter().collect(),
            flags,
        }
    }

    /// Microsoft RIFF (WAV and friends)
    pub fn riff() -> Self {
        Self::new(
            "RIFF",
            Endian::Little,
            [FourCc::new(b"RIFF"), FourCc::new(b"LIST")],
            DialectFlags::PAD_TO_EVEN | DialectFlags::GROUP_PREFIX,
        )
    }

    /// Electronic Arts IFF (AIFF and friends)
    pub fn iff() -> Self {
        Self::new(
            "IFF",
            Endian::Big,
            [
                FourCc::new(b"FORM"),
                FourCc::new(b"LIST"),
                FourCc::new(b"CAT "),
            ],
            DialectFlags::PAD_TO_EVEN | DialectFlags::GROUP_PREFIX,
        )
    }

    /// The modern vendor chunk-dictionary container
    pub fn vendor() -> Self {
        Self::new(
            "vendor",
            Endian::Little,
            [VENDOR_CONTAINER_TAG, VENDOR_SUBITEMS_TAG, VENDOR_PRESET_TAG],
            DialectFlags::SYMMETRIC_CLOSE,
        )
    }

    /// Dialect name for diagnostics
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Byte order of chunk lengths
    pub fn endian(&self) -> Endian {
        self.endian
    }

    /// Structural options
    pub fn flags(&self) -> DialectFlags {
        self.flags
    }

    /// True if `tag` opens a group in this dialect
    pub fn is_group(&self, tag: FourCc) -> bool {
        self.group_tags.contains(&tag)
    }

    /// Register an additional group tag
    pub fn add_group_tag(&mut self, tag: FourCc) {
        self.group_tags.insert(tag);
    }

    /// Length of the prefix stored in front of a group's children
    pub fn group_prefix_len(&self) -> u32 {
        if self.flags.contains(DialectFlags::GROUP_PREFIX) {
            GROUP_PREFIX_LEN
        } else {
            0
        }
    }

    /// Closing marker tag for a group, if this dialect uses them
    pub fn closing_tag(&self, tag: FourCc) -> Option<FourCc> {
        if self.flags.contains(DialectFlags::SYMMETRIC_CLOSE) {
            Some(tag.to_ascii_uppercase())
        } else {
            None
        }
    }

    /// Pad bytes that follow a payload of `len` bytes
    pub fn pad_len(&self, len: u32) -> u32 {
        if self.flags.contains(DialectFlags::PAD_TO_EVEN) {
            len & 1
        } else {
            0
        }
    }
}

/// Result of looking a chunk up in a [`ChunkIdRegistry`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classified<Id> {
    /// The tag is registered under this semantic id
    Known(Id),
    /// The tag is not registered; the chunk is kept verbatim
    Unknown(FourCc),
}

/// Maps raw tags of one dialect to semantic chunk ids
#[derive(Debug, Clone)]
pub struct ChunkIdRegistry<Id> {
    ids: HashMap<FourCc, Id>,
}

impl<Id: Copy + Eq> ChunkIdRegistry<Id> {
    /// Create an empty registry
    pub fn new() -> Self {
        Self {
            ids: HashMap::new(),
        }
    }

    /// Register a tag under a semantic id
    pub fn register(mut self, tag: FourCc, id: Id) -> Self {
        self.ids.insert(tag, id);
        self
    }

    /// Semantic id of a tag
    pub fn id_of(&self, tag: FourCc) -> Option<Id> {
        self.ids.get(&tag).copied()
    }

    /// Raw tag registered for a semantic id
    pub fn tag_of(&self, id: Id) -> Option<FourCc> {
        self.ids
            .iter()
            .find_map(|(tag, known)| (*known == id).then_some(*tag))
    }

    /// Classify a chunk; unregistered tags come back as [`Classified::Unknown`]
    pub fn classify(&self, chunk: &Chunk) -> Classified<Id> {
        match self.id_of(chunk.tag) {
            Some(id) => Classified::Known(id),
            None => Classified::Unknown(chunk.tag),
        }
    }

    /// Number of registered tags
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    /// True if nothing is registered
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

impl<Id: Copy + Eq> Default for ChunkIdRegistry<Id> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_dialects() {
        let riff = Dialect::riff();
        assert!(riff.is_group(FourCc::new(b"LIST")));
        assert!(!riff.is_group(FourCc::new(b"fmt ")));
        assert_eq!(riff.group_prefix_len(), 4);
        assert_eq!(riff.pad_len(3), 1);
        assert_eq!(riff.closing_tag(FourCc::new(b"LIST")), None);

        let vendor = Dialect::vendor();
        assert_eq!(vendor.group_prefix_len(), 0);
        assert_eq!(vendor.pad_len(3), 0);
        assert_eq!(
            vendor.closing_tag(VENDOR_CONTAINER_TAG),
            Some(FourCc::new(b"HSIN"))
        );
    }

    #[test]
    fn test_registry_classification() {
        #[derive(Debug, Clone, Copy, PartialEq, Eq)]
        enum WaveId {
            Format,
            Data,
        }
        let registry = ChunkIdRegistry::new()
            .register(FourCc::new(b"fmt "), WaveId::Format)
            .register(FourCc::new(b"data"), WaveId::Data);

        let known = Chunk::leaf(FourCc::new(b"data"), vec![1, 2]);
        let unknown = Chunk::leaf(FourCc::new(b"smpl"), vec![]);
        assert_eq!(registry.classify(&known), Classified::Known(WaveId::Data));
        assert_eq!(
            registry.classify(&unknown),
            Classified::Unknown(FourCc::new(b"smpl"))
        );
        assert_eq!(registry.tag_of(WaveId::Format), Some(FourCc::new(b"fmt ")));
        assert_eq!(registry.len(), 2);
    }
}
