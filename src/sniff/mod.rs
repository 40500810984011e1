//! Format detection
//!
//! Inspects the first bytes of a file to pick a codec variant before any
//! structural parsing happens:
//! - Legacy vendor container: magic `0x1290A87F` in either byte order, layout at byte 8
//! - Modern chunk-dictionary container: secondary magic `hsin` at byte 12
//! - Monolith resource archive: magic `54 AC 70 5E` (big-endian form is detected but unsupported)
//! - RIFF / IFF chunk files
//!
//! At most [`SNIFF_LEN`] bytes are read and the cursor is always restored.

use std::io::{Read, Seek};

use log::debug;
use num_derive::FromPrimitive;
use num_traits::FromPrimitive;
use serde::Serialize;

use crate::stream::{ChunkStream, Endian};
use crate::tree::VENDOR_CONTAINER_TAG;
use crate::{CodecError, Result};

/// Maximum number of bytes the sniffer looks at
pub const SNIFF_LEN: usize = 16;

/// Legacy container magic as stored little-endian
pub const LEGACY_MAGIC_LE: [u8; 4] = [0x7F, 0xA8, 0x90, 0x12];
/// Legacy container magic as stored big-endian
pub const LEGACY_MAGIC_BE: [u8; 4] = [0x12, 0x90, 0xA8, 0x7F];
/// Monolith directory magic (little-endian files)
pub const MONOLITH_MAGIC_LE: [u8; 4] = [0x54, 0xAC, 0x70, 0x5E];
/// Monolith directory magic as written by big-endian hosts
pub const MONOLITH_MAGIC_BE: [u8; 4] = [0x5E, 0x70, 0xAC, 0x54];

/// Offset of the layout field in a legacy header
const LEGACY_LAYOUT_OFFSET: usize = 8;
/// Offset of the root group tag in a modern container
const DICTIONARY_TAG_OFFSET: usize = 12;

/// Historical layouts of the legacy flat header
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, FromPrimitive, Serialize)]
#[repr(u16)]
pub enum LegacyLayout {
    /// 16-bit counts, 8-bit indices, 16-byte author, 4-byte checksum
    V1 = 0x0100,
    /// 32-bit counts, 16-bit indices, 32-byte author, 4-byte checksum
    V2 = 0x0110,
    /// As V2 with a 16-byte hash
    V3 = 0x0111,
}

impl LegacyLayout {
    /// Map a raw layout field to a known layout
    pub fn from_raw(raw: u16) -> Option<Self> {
        Self::from_u16(raw)
    }

    /// Raw layout field value
    pub fn raw(self) -> u16 {
        self as u16
    }

    /// Size of the fixed header in bytes
    pub fn header_len(self) -> usize {
        match self {
            LegacyLayout::V1 => 0x30,
            LegacyLayout::V2 => 0x48,
            LegacyLayout::V3 => 0x54,
        }
    }

    /// Size of the checksum or hash field
    pub fn checksum_len(self) -> usize {
        match self {
            LegacyLayout::V1 | LegacyLayout::V2 => 4,
            LegacyLayout::V3 => 16,
        }
    }
}

/// Codec selected by the sniffer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CodecVariant {
    /// Legacy vendor container with a flat header
    LegacyFlat(LegacyLayout),
    /// Modern vendor chunk-dictionary container
    ChunkDictionary,
    /// Monolith resource archive
    Monolith,
    /// RIFF chunk file
    Riff,
    /// IFF chunk file
    Iff,
}

impl CodecVariant {
    /// Short name for diagnostics
    pub fn name(&self) -> &'static str {
        match self {
            CodecVariant::LegacyFlat(LegacyLayout::V1) => "legacy-v1",
            CodecVariant::LegacyFlat(LegacyLayout::V2) => "legacy-v2",
            CodecVariant::LegacyFlat(LegacyLayout::V3) => "legacy-v3",
            CodecVariant::ChunkDictionary => "chunk-dictionary",
            CodecVariant::Monolith => "monolith",
            CodecVariant::Riff => "riff",
            CodecVariant::Iff => "iff",
        }
    }
}

impl std::fmt::Display for CodecVariant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Result of format detection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Sniffed {
    /// Selected codec
    pub variant: CodecVariant,
    /// Byte order of the container
    pub endian: Endian,
}

/// Magic-number based format detector
pub struct FormatSniffer;

impl FormatSniffer {
    /// Detect the format at the cursor; the cursor is left where it was
    pub fn sniff<S: Read + Seek>(stream: &mut ChunkStream<S>) -> Result<Sniffed> {
        let start = stream.position();
        let result = Self::sniff_at(stream, start);
        stream.seek(start)?;
        result
    }

    /// Detect the format of an in-memory buffer
    pub fn sniff_bytes(data: &[u8]) -> Result<Sniffed> {
        Self::sniff(&mut ChunkStream::from_slice(data))
    }

    fn sniff_at<S: Read + Seek>(stream: &mut ChunkStream<S>, start: u64) -> Result<Sniffed> {
        let available = stream.remaining()?.min(SNIFF_LEN as u64) as usize;
        let head = stream.read_bytes(available)?;
        if head.len() < 4 {
            return Err(CodecError::unrecognized(&head, "input shorter than a magic number"));
        }

        let magic: [u8; 4] = [head[0], head[1], head[2], head[3]];
        let sniffed = match magic {
            LEGACY_MAGIC_LE => Self::legacy(&head, start, Endian::Little)?,
            LEGACY_MAGIC_BE => Self::legacy(&head, start, Endian::Big)?,
            MONOLITH_MAGIC_LE => Sniffed {
                variant: CodecVariant::Monolith,
                endian: Endian::Little,
            },
            MONOLITH_MAGIC_BE => Sniffed {
                variant: CodecVariant::Monolith,
                endian: Endian::Big,
            },
            [b'R', b'I', b'F', b'F'] => Sniffed {
                variant: CodecVariant::Riff,
                endian: Endian::Little,
            },
            [b'F', b'O', b'R', b'M'] => Sniffed {
                variant: CodecVariant::Iff,
                endian: Endian::Big,
            },
            _ if head.len() >= DICTIONARY_TAG_OFFSET + 4
                && head[DICTIONARY_TAG_OFFSET..DICTIONARY_TAG_OFFSET + 4]
                    == VENDOR_CONTAINER_TAG.0 =>
            {
                Sniffed {
                    variant: CodecVariant::ChunkDictionary,
                    endian: Endian::Little,
                }
            }
            _ => return Err(CodecError::unrecognized(&head, "no known magic number")),
        };

        debug!(
            "Detected {} ({}) at offset {}",
            sniffed.variant, sniffed.endian, start
        );
        Ok(sniffed)
    }

    fn legacy(head: &[u8], start: u64, endian: Endian) -> Result<Sniffed> {
        if head.len() < LEGACY_LAYOUT_OFFSET + 2 {
            return Err(CodecError::UnexpectedEof {
                position: start + head.len() as u64,
                needed: LEGACY_LAYOUT_OFFSET + 2 - head.len(),
            });
        }
        let bytes = [head[LEGACY_LAYOUT_OFFSET], head[LEGACY_LAYOUT_OFFSET + 1]];
        let raw = match endian {
            Endian::Big => u16::from_be_bytes(bytes),
            Endian::Little => u16::from_le_bytes(bytes),
        };
        let layout = LegacyLayout::from_raw(raw).ok_or_else(|| {
            CodecError::unrecognized(&bytes, format!("unknown legacy layout 0x{raw:04X}"))
        })?;
        Ok(Sniffed {
            variant: CodecVariant::LegacyFlat(layout),
            endian,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_legacy_both_byte_orders() {
        let mut le = Vec::new();
        le.extend_from_slice(&0x1290_A87Fu32.to_le_bytes());
        le.extend_from_slice(&0u32.to_le_bytes());
        le.extend_from_slice(&0x0110u16.to_le_bytes());
        let sniffed = FormatSniffer::sniff_bytes(&le).unwrap();
        assert_eq!(sniffed.variant, CodecVariant::LegacyFlat(LegacyLayout::V2));
        assert_eq!(sniffed.endian, Endian::Little);

        let mut be = Vec::new();
        be.extend_from_slice(&0x1290_A87Fu32.to_be_bytes());
        be.extend_from_slice(&0u32.to_be_bytes());
        be.extend_from_slice(&0x0111u16.to_be_bytes());
        let sniffed = FormatSniffer::sniff_bytes(&be).unwrap();
        assert_eq!(sniffed.variant, CodecVariant::LegacyFlat(LegacyLayout::V3));
        assert_eq!(sniffed.endian, Endian::Big);
    }

    #[test]
    fn test_unknown_legacy_layout() {
        let mut data = Vec::new();
        data.extend_from_slice(&LEGACY_MAGIC_LE);
        data.extend_from_slice(&0u32.to_le_bytes());
        data.extend_from_slice(&0x0200u16.to_le_bytes());
        let err = FormatSniffer::sniff_bytes(&data).unwrap_err();
        assert!(matches!(err, CodecError::UnrecognizedFormat { .. }));
    }

    #[test]
    fn test_secondary_magic_selects_dictionary() {
        let mut data = Vec::new();
        data.extend_from_slice(&64u64.to_le_bytes()); // total length
        data.extend_from_slice(&1u32.to_le_bytes()); // container version
        data.extend_from_slice(b"hsin");
        data.extend_from_slice(&[0u8; 8]);
        let sniffed = FormatSniffer::sniff_bytes(&data).unwrap();
        assert_eq!(sniffed.variant, CodecVariant::ChunkDictionary);
    }

    #[test]
    fn test_monolith_and_chunk_files() {
        let sniffed = FormatSniffer::sniff_bytes(&MONOLITH_MAGIC_BE).unwrap();
        assert_eq!(sniffed.variant, CodecVariant::Monolith);
        assert_eq!(sniffed.endian, Endian::Big);
        assert_eq!(
            FormatSniffer::sniff_bytes(b"FORM\0\0\0\x04AIFF").unwrap().variant,
            CodecVariant::Iff
        );
        assert_eq!(
            FormatSniffer::sniff_bytes(b"RIFF\x04\0\0\0WAVE").unwrap().variant,
            CodecVariant::Riff
        );
    }

    #[test]
    fn test_unknown_magic_carries_bytes() {
        let err = FormatSniffer::sniff_bytes(b"YM6!LeOnArD!").unwrap_err();
        match err {
            CodecError::UnrecognizedFormat { magic, .. } => assert_eq!(&magic[..4], b"YM6!"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_cursor_restored() {
        let mut data = vec![0xEE; 4];
        data.extend_from_slice(b"RIFF\x04\0\0\0WAVE");
        let mut stream = ChunkStream::from_slice(&data);
        stream.seek(4).unwrap();
        FormatSniffer::sniff(&mut stream).unwrap();
        assert_eq!(stream.position(), 4);

        stream.seek(0).unwrap();
        assert!(FormatSniffer::sniff(&mut stream).is_err());
        assert_eq!(stream.position(), 0);
    }
}
