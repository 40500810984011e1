//! Vendor container codecs
//!
//! Two container families are selected by [`FormatSniffer`]:
//! - Legacy flat header (three layouts) followed by a compressed payload
//! - Modern chunk dictionary (tag tree with typed leaf records)

pub mod categories;
pub mod chunk_data;
pub mod legacy;
pub mod modern;

pub use categories::CategoryIndex;
pub use chunk_data::{
    Application, Authorization, AuthoringApplication, ChunkData, ChunkDataId, PresetData,
    RootInfo, PRESET_DATA_MAGIC,
};
pub use legacy::{Checksum, ContainerHeader, DeclaredCounts, LegacyContainer, LegacyHeader};
pub use modern::ModernContainer;

use std::fs::File;
use std::io::{BufReader, Read, Seek};
use std::path::Path;

use serde::Serialize;

use crate::config::CodecConfig;
use crate::sniff::{CodecVariant, FormatSniffer};
use crate::stream::{ChunkStream, Endian};
use crate::{CodecError, Result};

/// Version number packed as `major << 20 | minor << 12 | patch`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct PackedVersion {
    /// Major version (12 bits)
    pub major: u16,
    /// Minor version (8 bits)
    pub minor: u8,
    /// Patch level (12 bits)
    pub patch: u16,
}

impl PackedVersion {
    /// Build a version
    pub fn new(major: u16, minor: u8, patch: u16) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }

    /// Unpack from the 32-bit wire form
    pub fn from_packed(packed: u32) -> Self {
        Self {
            major: (packed >> 20) as u16,
            minor: ((packed >> 12) & 0xFF) as u8,
            patch: (packed & 0xFFF) as u16,
        }
    }

    /// Pack into the 32-bit wire form
    pub fn packed(&self) -> u32 {
        ((self.major as u32 & 0xFFF) << 20)
            | ((self.minor as u32) << 12)
            | (self.patch as u32 & 0xFFF)
    }
}

impl std::fmt::Display for PackedVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

/// Trait for vendor container codecs
pub trait ContainerCodec {
    /// Decode a container at the cursor
    fn read<S: Read + Seek>(
        &self,
        stream: &mut ChunkStream<S>,
        endian: Endian,
        config: &CodecConfig,
    ) -> Result<VendorContainer>;

    /// Get codec name
    fn name(&self) -> &str;
}

/// Codec for the legacy flat-header family
pub struct LegacyCodec;

impl ContainerCodec for LegacyCodec {
    fn read<S: Read + Seek>(
        &self,
        stream: &mut ChunkStream<S>,
        endian: Endian,
        config: &CodecConfig,
    ) -> Result<VendorContainer> {
        LegacyContainer::read(stream, endian, config).map(VendorContainer::Legacy)
    }

    fn name(&self) -> &str {
        "legacy"
    }
}

/// Codec for the modern chunk-dictionary family
pub struct ModernCodec;

impl ContainerCodec for ModernCodec {
    fn read<S: Read + Seek>(
        &self,
        stream: &mut ChunkStream<S>,
        _endian: Endian,
        config: &CodecConfig,
    ) -> Result<VendorContainer> {
        ModernContainer::read(stream, config).map(VendorContainer::Modern)
    }

    fn name(&self) -> &str {
        "chunk-dictionary"
    }
}

/// Either container family
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VendorContainer {
    /// Legacy flat header plus payload
    Legacy(LegacyContainer),
    /// Modern chunk dictionary
    Modern(ModernContainer),
}

impl VendorContainer {
    /// Format-independent header
    pub fn header(&self) -> ContainerHeader {
        match self {
            VendorContainer::Legacy(legacy) => legacy.header.container_header(),
            VendorContainer::Modern(modern) => modern.header(),
        }
    }

    /// Re-encode in the family it was decoded from
    pub fn encode(&self) -> Result<Vec<u8>> {
        match self {
            VendorContainer::Legacy(legacy) => legacy.encode(),
            VendorContainer::Modern(modern) => modern.encode(),
        }
    }
}

/// Sniff and decode a vendor container at the cursor
pub fn read<S: Read + Seek>(
    stream: &mut ChunkStream<S>,
    config: &CodecConfig,
) -> Result<VendorContainer> {
    let sniffed = FormatSniffer::sniff(stream)?;
    match sniffed.variant {
        CodecVariant::LegacyFlat(_) => LegacyCodec.read(stream, sniffed.endian, config),
        CodecVariant::ChunkDictionary => ModernCodec.read(stream, sniffed.endian, config),
        other => Err(CodecError::UnsupportedVariant(format!(
            "{other} input is not a vendor container"
        ))),
    }
}

/// Sniff and decode a vendor container from memory
pub fn decode(data: &[u8], config: &CodecConfig) -> Result<VendorContainer> {
    let mut stream = ChunkStream::from_slice(data).with_max_block_len(config.max_block_len);
    read(&mut stream, config)
}

/// Decode a vendor container file; the file is closed before returning
pub fn decode_file(path: impl AsRef<Path>, config: &CodecConfig) -> Result<VendorContainer> {
    let file = File::open(path.as_ref())?;
    let mut stream =
        ChunkStream::new(BufReader::new(file))?.with_max_block_len(config.max_block_len);
    read(&mut stream, config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_packed_version() {
        let version = PackedVersion::from_packed(0x0060_2003);
        assert_eq!(version, PackedVersion::new(6, 2, 3));
        assert_eq!(version.packed(), 0x0060_2003);
        assert_eq!(version.to_string(), "6.2.3");
    }

    #[test]
    fn test_non_vendor_input_unsupported() {
        let err = decode(b"RIFF\x04\0\0\0WAVE", &CodecConfig::default()).unwrap_err();
        assert!(matches!(err, CodecError::UnsupportedVariant(_)));
    }

    #[test]
    fn test_codec_names() {
        assert_eq!(LegacyCodec.name(), "legacy");
        assert_eq!(ModernCodec.name(), "chunk-dictionary");
    }
}
