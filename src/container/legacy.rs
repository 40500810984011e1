//! Legacy flat-header vendor container
//!
//! Three historical layouts share a 10-byte prefix (magic, payload length,
//! layout) and then diverge in field widths:
//!
//! | field | V1 | V2 | V3 |
//! |---|---|---|---|
//! | minimum version, timestamp | u32, u32 | u32, u32 | u32, u32 |
//! | zones / groups / instruments | 3 x u16 | 3 x u32 | 3 x u32 |
//! | icon / category / character | 3 x u8 + reserved | 3 x u16 | 3 x u16 |
//! | author | 16 bytes | 32 bytes | 32 bytes |
//! | checksum | 4 bytes | 4 bytes | 16-byte hash |
//!
//! The header is read field by field; the layout value read early decides
//! the width of every later field.

use std::io::{Read, Seek, Write};

use log::{debug, warn};
use serde::Serialize;

use super::categories::{CategoryIndex, CATEGORIES, CHARACTERS, ICONS};
use super::PackedVersion;
use crate::config::CodecConfig;
use crate::sniff::LegacyLayout;
use crate::stream::{ChunkStream, Endian, RawText};
use crate::{CodecError, Result};

/// Magic value at offset 0 of every legacy header
pub const LEGACY_MAGIC: u32 = 0x1290_A87F;

/// Checksum field of a container header
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Checksum {
    /// 4-byte checksum (V1, V2)
    Crc32([u8; 4]),
    /// 16-byte hash (V3)
    Hash([u8; 16]),
}

impl Checksum {
    /// Raw checksum bytes
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Checksum::Crc32(b) => b,
            Checksum::Hash(b) => b,
        }
    }
}

/// Item counts declared by a header
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DeclaredCounts {
    /// Number of sample zones
    pub zones: u32,
    /// Number of groups
    pub groups: u32,
    /// Number of instruments
    pub instruments: u32,
}

/// Format-independent view of a container header
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContainerHeader {
    /// Layout or container version
    pub schema_version: u32,
    /// Byte order
    pub endian: Endian,
    /// Checksum or hash, when the layout carries one
    pub checksum: Option<Checksum>,
    /// Advisory item counts
    pub declared_counts: DeclaredCounts,
}

impl ContainerHeader {
    /// Cross-check declared counts against what a reader actually decoded
    ///
    /// Fewer decoded items than declared means the file was truncated. With
    /// `strict_counts` disabled the mismatch is only logged.
    pub fn check_counts(&self, actual: &DeclaredCounts, config: &CodecConfig) -> Result<()> {
        let declared = &self.declared_counts;
        let short = [
            ("zones", declared.zones, actual.zones),
            ("groups", declared.groups, actual.groups),
            ("instruments", declared.instruments, actual.instruments),
        ]
        .into_iter()
        .filter(|(_, want, got)| got < want)
        .map(|(what, want, got)| format!("{what}: declared {want}, decoded {got}"))
        .collect::<Vec<_>>();

        if short.is_empty() {
            return Ok(());
        }
        let message = format!("Container is missing items ({})", short.join("; "));
        if config.strict_counts {
            Err(CodecError::MalformedContainer(message))
        } else {
            warn!("{message}");
            Ok(())
        }
    }
}

/// Fully decoded legacy header
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LegacyHeader {
    /// Header layout
    pub layout: LegacyLayout,
    /// Byte order
    pub endian: Endian,
    /// Length of the compressed payload following the header
    pub payload_len: u32,
    /// Oldest tool version able to open the file
    pub min_version: PackedVersion,
    /// Creation time, unix seconds
    pub timestamp: u32,
    /// Declared zone/group/instrument counts
    pub counts: DeclaredCounts,
    /// Icon index
    pub icon: CategoryIndex,
    /// Category index
    pub category: CategoryIndex,
    /// Character index
    pub character: CategoryIndex,
    /// Reserved byte (V1 only)
    pub reserved: u8,
    /// Author field as stored; bytes after the name's NUL are preserved
    pub author: RawText,
    /// Checksum (V1, V2) or hash (V3)
    pub checksum: Checksum,
}

/// Header fields in wire order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Magic,
    PayloadLength,
    Layout,
    MinVersion,
    Timestamp,
    Counts,
    Indices,
    Reserved,
    Author,
    Checksum,
    Done,
}

impl Field {
    fn next(self, layout: Option<LegacyLayout>) -> Field {
        match self {
            Field::Magic => Field::PayloadLength,
            Field::PayloadLength => Field::Layout,
            Field::Layout => Field::MinVersion,
            Field::MinVersion => Field::Timestamp,
            Field::Timestamp => Field::Counts,
            Field::Counts => Field::Indices,
            Field::Indices if layout == Some(LegacyLayout::V1) => Field::Reserved,
            Field::Indices | Field::Reserved => Field::Author,
            Field::Author => Field::Checksum,
            Field::Checksum | Field::Done => Field::Done,
        }
    }
}

fn author_len(layout: LegacyLayout) -> usize {
    match layout {
        LegacyLayout::V1 => 16,
        LegacyLayout::V2 | LegacyLayout::V3 => 32,
    }
}

impl LegacyHeader {
    /// Read a header at the cursor
    pub fn read<S: Read + Seek>(stream: &mut ChunkStream<S>, endian: Endian) -> Result<Self> {
        let start = stream.position();
        let mut layout = None;
        let mut payload_len = 0;
        let mut min_version = PackedVersion::default();
        let mut timestamp = 0;
        let mut counts = DeclaredCounts::default();
        let mut indices = [0u16; 3];
        let mut reserved = 0;
        let mut author = RawText::default();
        let mut checksum = Checksum::Crc32([0; 4]);

        let mut field = Field::Magic;
        while field != Field::Done {
            match field {
                Field::Magic => {
                    let magic = stream.read_u32(endian)?;
                    if magic != LEGACY_MAGIC {
                        return Err(CodecError::unrecognized(
                            &endian.u32_to(magic),
                            "legacy container magic",
                        ));
                    }
                }
                Field::PayloadLength => payload_len = stream.read_u32(endian)?,
                Field::Layout => {
                    let raw = stream.read_u16(endian)?;
                    layout = Some(LegacyLayout::from_raw(raw).ok_or_else(|| {
                        CodecError::unrecognized(
                            &raw.to_be_bytes(),
                            format!("unknown legacy layout 0x{raw:04X}"),
                        )
                    })?);
                }
                Field::MinVersion => {
                    min_version = PackedVersion::from_packed(stream.read_u32(endian)?)
                }
                Field::Timestamp => timestamp = stream.read_u32(endian)?,
                Field::Counts => {
                    let mut values = [0u32; 3];
                    for value in &mut values {
                        *value = match layout {
                            Some(LegacyLayout::V1) => stream.read_u16(endian)? as u32,
                            _ => stream.read_u32(endian)?,
                        };
                    }
                    counts = DeclaredCounts {
                        zones: values[0],
                        groups: values[1],
                        instruments: values[2],
                    };
                }
                Field::Indices => {
                    for index in &mut indices {
                        *index = match layout {
                            Some(LegacyLayout::V1) => stream.read_u8()? as u16,
                            _ => stream.read_u16(endian)?,
                        };
                    }
                }
                Field::Reserved => reserved = stream.read_u8()?,
                Field::Author => {
                    let len = layout.map(author_len).unwrap_or(0);
                    author = stream.read_text(len)?;
                }
                Field::Checksum => {
                    checksum = match layout {
                        Some(LegacyLayout::V3) => {
                            let mut hash = [0u8; 16];
                            hash.copy_from_slice(&stream.read_bytes(16)?);
                            Checksum::Hash(hash)
                        }
                        _ => {
                            let mut crc = [0u8; 4];
                            crc.copy_from_slice(&stream.read_bytes(4)?);
                            Checksum::Crc32(crc)
                        }
                    };
                }
                Field::Done => {}
            }
            field = field.next(layout);
        }

        let layout = layout.ok_or_else(|| {
            CodecError::MalformedContainer("Legacy header has no layout field".into())
        })?;
        debug_assert_eq!(stream.position() - start, layout.header_len() as u64);

        Ok(LegacyHeader {
            layout,
            endian,
            payload_len,
            min_version,
            timestamp,
            counts,
            icon: CategoryIndex::resolve(&ICONS, indices[0]),
            category: CategoryIndex::resolve(&CATEGORIES, indices[1]),
            character: CategoryIndex::resolve(&CHARACTERS, indices[2]),
            reserved,
            author,
            checksum,
        })
    }

    /// Write the header at the cursor
    pub fn write<S: Write + Seek>(&self, stream: &mut ChunkStream<S>) -> Result<()> {
        let endian = self.endian;
        stream.write_u32(LEGACY_MAGIC, endian)?;
        stream.write_u32(self.payload_len, endian)?;
        stream.write_u16(self.layout.raw(), endian)?;
        stream.write_u32(self.min_version.packed(), endian)?;
        stream.write_u32(self.timestamp, endian)?;

        let counts = [self.counts.zones, self.counts.groups, self.counts.instruments];
        let indices = [self.icon.raw, self.category.raw, self.character.raw];
        match self.layout {
            LegacyLayout::V1 => {
                for count in counts {
                    let narrow = u16::try_from(count).map_err(|_| {
                        CodecError::MalformedContainer(format!(
                            "Count {count} does not fit the 16-bit V1 field"
                        ))
                    })?;
                    stream.write_u16(narrow, endian)?;
                }
                for index in indices {
                    let narrow = u8::try_from(index).map_err(|_| {
                        CodecError::MalformedContainer(format!(
                            "Index {index} does not fit the 8-bit V1 field"
                        ))
                    })?;
                    stream.write_u8(narrow)?;
                }
                stream.write_u8(self.reserved)?;
            }
            LegacyLayout::V2 | LegacyLayout::V3 => {
                for count in counts {
                    stream.write_u32(count, endian)?;
                }
                for index in indices {
                    stream.write_u16(index, endian)?;
                }
            }
        }

        stream.write_text(&self.author, author_len(self.layout))?;

        let checksum_fits = matches!(
            (self.layout, &self.checksum),
            (LegacyLayout::V3, Checksum::Hash(_))
                | (LegacyLayout::V1 | LegacyLayout::V2, Checksum::Crc32(_))
        );
        if !checksum_fits {
            return Err(CodecError::MalformedContainer(format!(
                "Checksum kind does not match layout {:?}",
                self.layout
            )));
        }
        stream.write_bytes(self.checksum.as_bytes())
    }

    /// Encode the header on its own
    pub fn encode(&self) -> Result<Vec<u8>> {
        let mut stream = ChunkStream::in_memory();
        self.write(&mut stream)?;
        Ok(stream.into_bytes())
    }

    /// Author name for display
    pub fn author_name(&self) -> String {
        self.author.text()
    }

    /// Format-independent view
    pub fn container_header(&self) -> ContainerHeader {
        ContainerHeader {
            schema_version: self.layout.raw() as u32,
            endian: self.endian,
            checksum: Some(self.checksum),
            declared_counts: self.counts,
        }
    }
}

/// Legacy header plus its opaque compressed payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LegacyContainer {
    /// Decoded header
    pub header: LegacyHeader,
    /// Compressed preset payload
    pub payload: Vec<u8>,
}

impl LegacyContainer {
    /// Decode a legacy container at the cursor
    ///
    /// The payload may not exceed `config.max_chunk_len`.
    pub fn read<S: Read + Seek>(
        stream: &mut ChunkStream<S>,
        endian: Endian,
        config: &CodecConfig,
    ) -> Result<Self> {
        let header = LegacyHeader::read(stream, endian)?;
        if header.payload_len > config.max_chunk_len {
            return Err(CodecError::MalformedContainer(format!(
                "Legacy payload of {} bytes exceeds limit of {}",
                header.payload_len, config.max_chunk_len
            )));
        }
        debug!(
            "Legacy {:?} header: {} zones, {} groups, {} instruments, {} payload bytes",
            header.layout,
            header.counts.zones,
            header.counts.groups,
            header.counts.instruments,
            header.payload_len
        );

        let payload = stream
            .read_bytes(header.payload_len as usize)
            .map_err(|e| match e {
                CodecError::UnexpectedEof { position, .. } => {
                    CodecError::MalformedContainer(format!(
                        "Header declares {} payload bytes at offset {} but the input ends early",
                        header.payload_len, position
                    ))
                }
                other => other,
            })?;

        Ok(Self { header, payload })
    }

    /// Decode a legacy container from memory
    pub fn decode(data: &[u8], endian: Endian, config: &CodecConfig) -> Result<Self> {
        Self::read(&mut ChunkStream::from_slice(data), endian, config)
    }

    /// Encode header and payload; the payload length field follows the payload
    pub fn encode(&self) -> Result<Vec<u8>> {
        let mut header = self.header.clone();
        header.payload_len = u32::try_from(self.payload.len()).map_err(|_| {
            CodecError::MalformedContainer("Payload too large for a legacy container".into())
        })?;
        let mut stream = ChunkStream::in_memory();
        header.write(&mut stream)?;
        stream.write_bytes(&self.payload)?;
        Ok(stream.into_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v1_header(zones: u16, groups: u16, instruments: u16, payload: &[u8]) -> Vec<u8> {
        let mut data = Vec::new();
        data.extend_from_slice(&LEGACY_MAGIC.to_le_bytes());
        data.extend_from_slice(&(payload.len() as u32).to_le_bytes());
        data.extend_from_slice(&0x0100u16.to_le_bytes()); // layout V1
        data.extend_from_slice(&0x0050_2000u32.to_le_bytes()); // 5.2.0
        data.extend_from_slice(&1_200_000_000u32.to_le_bytes()); // timestamp
        data.extend_from_slice(&zones.to_le_bytes());
        data.extend_from_slice(&groups.to_le_bytes());
        data.extend_from_slice(&instruments.to_le_bytes());
        data.extend_from_slice(&[6, 1, 200]); // icon, category, character
        data.push(0); // reserved
        let mut author = [0u8; 16];
        author[..6].copy_from_slice(b"Sample");
        data.extend_from_slice(&author);
        data.extend_from_slice(&[0xDE, 0xAD, 0xBE, 0xEF]);
        data.extend_from_slice(payload);
        data
    }

    #[test]
    fn test_minimal_v1_header_counts() {
        let data = v1_header(3, 1, 1, b"xyz");
        let container = LegacyContainer::decode(&data, Endian::Little, &CodecConfig::default())
            .unwrap();
        let header = &container.header;
        assert_eq!(header.layout, LegacyLayout::V1);
        assert_eq!(
            header.counts,
            DeclaredCounts {
                zones: 3,
                groups: 1,
                instruments: 1
            }
        );
        assert_eq!(header.author_name(), "Sample");
        assert_eq!(header.author.len(), 16);
        assert_eq!(header.checksum, Checksum::Crc32([0xDE, 0xAD, 0xBE, 0xEF]));
        assert_eq!(header.min_version, PackedVersion::new(5, 2, 0));
        assert_eq!(header.icon.name, "Piano");
        assert_eq!(header.character.name, "Other");
        assert_eq!(header.character.raw, 200);
        assert_eq!(container.payload, b"xyz");

        let view = header.container_header();
        assert_eq!(view.schema_version, 0x0100);
        assert_eq!(view.declared_counts.zones, 3);
    }

    #[test]
    fn test_v1_reencodes_identically() {
        let data = v1_header(3, 1, 1, b"payload");
        let container =
            LegacyContainer::decode(&data, Endian::Little, &CodecConfig::default()).unwrap();
        assert_eq!(container.encode().unwrap(), data);
    }

    #[test]
    fn test_v3_big_endian_offsets() {
        let mut data = Vec::new();
        data.extend_from_slice(&LEGACY_MAGIC.to_be_bytes());
        data.extend_from_slice(&0u32.to_be_bytes()); // empty payload
        data.extend_from_slice(&0x0111u16.to_be_bytes());
        data.extend_from_slice(&0x0060_0000u32.to_be_bytes());
        data.extend_from_slice(&0u32.to_be_bytes());
        data.extend_from_slice(&70_000u32.to_be_bytes()); // zones > u16
        data.extend_from_slice(&4u32.to_be_bytes());
        data.extend_from_slice(&2u32.to_be_bytes());
        data.extend_from_slice(&3u16.to_be_bytes());
        data.extend_from_slice(&0u16.to_be_bytes());
        data.extend_from_slice(&1u16.to_be_bytes());
        data.extend_from_slice(&[0u8; 32]); // author
        assert_eq!(data.len(), 0x44);
        data.extend_from_slice(&[0x11; 16]); // hash

        let mut stream = ChunkStream::from_slice(&data);
        let header = LegacyHeader::read(&mut stream, Endian::Big).unwrap();
        assert_eq!(stream.position(), 0x54);
        assert_eq!(header.counts.zones, 70_000);
        assert_eq!(header.icon.name, "Bell");
        assert_eq!(header.checksum, Checksum::Hash([0x11; 16]));
        assert_eq!(header.encode().unwrap(), data);
    }

    #[test]
    fn test_v2_little_endian_offsets() {
        let mut data = Vec::new();
        data.extend_from_slice(&LEGACY_MAGIC.to_le_bytes());
        data.extend_from_slice(&2u32.to_le_bytes());
        data.extend_from_slice(&0x0110u16.to_le_bytes());
        data.extend_from_slice(&0x0050_5000u32.to_le_bytes()); // 5.5.0
        data.extend_from_slice(&1_300_000_000u32.to_le_bytes());
        assert_eq!(data.len(), 0x12);
        data.extend_from_slice(&12u32.to_le_bytes());
        data.extend_from_slice(&3u32.to_le_bytes());
        data.extend_from_slice(&1u32.to_le_bytes());
        assert_eq!(data.len(), 0x1E);
        data.extend_from_slice(&5u16.to_le_bytes());
        data.extend_from_slice(&2u16.to_le_bytes());
        data.extend_from_slice(&0u16.to_le_bytes());
        assert_eq!(data.len(), 0x24);
        let mut author = [0u8; 32];
        author[..6].copy_from_slice(b"Studio");
        data.extend_from_slice(&author);
        assert_eq!(data.len(), 0x44);
        data.extend_from_slice(&[0xCA, 0xFE, 0xF0, 0x0D]);
        data.extend_from_slice(b"pp");

        let mut stream = ChunkStream::from_slice(&data);
        let container =
            LegacyContainer::read(&mut stream, Endian::Little, &CodecConfig::default()).unwrap();
        let header = &container.header;
        assert_eq!(stream.position(), data.len() as u64);
        assert_eq!(header.layout, LegacyLayout::V2);
        assert_eq!(
            header.counts,
            DeclaredCounts {
                zones: 12,
                groups: 3,
                instruments: 1
            }
        );
        assert_eq!(header.icon.name, "Guitar");
        assert_eq!(header.category.raw, 2);
        assert_eq!(header.author_name(), "Studio");
        assert_eq!(header.checksum, Checksum::Crc32([0xCA, 0xFE, 0xF0, 0x0D]));
        assert_eq!(container.payload, b"pp");

        let mut header_only = ChunkStream::from_slice(&data);
        LegacyHeader::read(&mut header_only, Endian::Little).unwrap();
        assert_eq!(header_only.position(), 0x48);
        assert_eq!(container.encode().unwrap(), data);
    }

    #[test]
    fn test_author_bytes_survive_reencode() {
        let mut data = v1_header(2, 1, 1, b"zz");
        let mut author = [0x5Au8; 16];
        author[..7].copy_from_slice(b"M\xFCller\0");
        author[12..].copy_from_slice(&[0xFF, 0x01, 0x80, 0x7F]);
        data[0x1C..0x2C].copy_from_slice(&author);

        let container =
            LegacyContainer::decode(&data, Endian::Little, &CodecConfig::default()).unwrap();
        assert_eq!(container.header.author_name(), "M\u{fc}ller");
        assert_eq!(container.header.author.as_bytes(), &author);
        assert_eq!(container.encode().unwrap(), data);
    }

    #[test]
    fn test_payload_limit_from_config() {
        let data = v1_header(1, 1, 1, &[0u8; 64]);
        let config = CodecConfig {
            max_chunk_len: 32,
            ..CodecConfig::default()
        };
        let err = LegacyContainer::decode(&data, Endian::Little, &config).unwrap_err();
        assert!(matches!(err, CodecError::MalformedContainer(_)), "{err}");
        assert!(LegacyContainer::decode(&data, Endian::Little, &CodecConfig::default()).is_ok());
    }

    #[test]
    fn test_missing_payload_is_malformed() {
        let mut data = v1_header(1, 1, 1, b"0123456789");
        data.truncate(data.len() - 4);
        let err = LegacyContainer::decode(&data, Endian::Little, &CodecConfig::default())
            .unwrap_err();
        assert!(matches!(err, CodecError::MalformedContainer(_)));
    }

    #[test]
    fn test_bad_magic() {
        let mut data = v1_header(1, 1, 1, b"");
        data[0] = 0;
        let err = LegacyContainer::decode(&data, Endian::Little, &CodecConfig::default())
            .unwrap_err();
        assert!(matches!(err, CodecError::UnrecognizedFormat { .. }));
    }

    #[test]
    fn test_count_check_policies() {
        let data = v1_header(3, 1, 1, b"");
        let container =
            LegacyContainer::decode(&data, Endian::Little, &CodecConfig::default()).unwrap();
        let header = container.header.container_header();
        let decoded = DeclaredCounts {
            zones: 2,
            groups: 1,
            instruments: 1,
        };
        assert!(header
            .check_counts(&decoded, &CodecConfig::default())
            .is_err());
        assert!(header.check_counts(&decoded, &CodecConfig::lenient()).is_ok());
        assert!(header
            .check_counts(&header.declared_counts, &CodecConfig::default())
            .is_ok());
    }

    #[test]
    fn test_v1_rejects_wide_values_on_encode() {
        let data = v1_header(1, 1, 1, b"");
        let mut container =
            LegacyContainer::decode(&data, Endian::Little, &CodecConfig::default()).unwrap();
        container.header.counts.zones = 100_000;
        assert!(container.encode().is_err());
    }
}
