//! Typed leaf records of the modern container
//!
//! Every record payload starts with `version: u32 = 1` followed by
//! record-specific fields, all little-endian. The set of records is closed;
//! leaves with other tags stay raw in the tree.

use nom::multi::{length_count, length_data};
use nom::number::complete::le_u32;
use num_derive::FromPrimitive;
use num_traits::FromPrimitive;
use serde::Serialize;

use super::PackedVersion;
use crate::stream::{ChunkStream, Endian, RawText};
use crate::tree::{ChunkIdRegistry, FourCc};
use crate::{CodecError, Result};

/// Only defined record version
pub const CHUNK_DATA_VERSION: u32 = 1;

/// Trailing magic of a preset-data record
pub const PRESET_DATA_MAGIC: u32 = 0x8565_620D;

/// Root / repository record
pub const ROOT_TAG: FourCc = FourCc::new(b"RTIN");
/// Authoring application record
pub const APPLICATION_TAG: FourCc = FourCc::new(b"APIN");
/// Authorization record
pub const AUTHORIZATION_TAG: FourCc = FourCc::new(b"AUTH");
/// Preset data record
pub const PRESET_DATA_TAG: FourCc = FourCc::new(b"PRDA");

type ParseResult<'a, T> = nom::IResult<&'a [u8], T>;

/// Semantic id of a registered leaf
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChunkDataId {
    /// `RTIN`
    Root,
    /// `APIN`
    AuthoringApplication,
    /// `AUTH`
    Authorization,
    /// `PRDA`
    PresetData,
}

/// Registry of the typed leaves of the vendor dialect
pub fn registry() -> ChunkIdRegistry<ChunkDataId> {
    ChunkIdRegistry::new()
        .register(ROOT_TAG, ChunkDataId::Root)
        .register(APPLICATION_TAG, ChunkDataId::AuthoringApplication)
        .register(AUTHORIZATION_TAG, ChunkDataId::Authorization)
        .register(PRESET_DATA_TAG, ChunkDataId::PresetData)
}

/// Known authoring applications
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromPrimitive, Serialize)]
pub enum Application {
    /// Full sampler
    Kontakt = 1,
    /// Free player edition
    KontaktPlayer = 2,
    /// Synthesizer workstation
    Reaktor = 3,
    /// Groove production
    Maschine = 4,
    /// Drum sampler
    Battery = 5,
}

/// Repository information
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RootInfo {
    /// Repository magic
    pub repository_magic: u32,
    /// Repository type
    pub repository_type: u32,
    /// Writer version
    pub version: PackedVersion,
}

/// Application that wrote the file
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuthoringApplication {
    /// Raw application id
    pub application: u32,
    /// Application version string, bytes as stored
    pub version: RawText,
}

impl AuthoringApplication {
    /// The application id as a known application
    pub fn known(&self) -> Option<Application> {
        Application::from_u32(self.application)
    }
}

/// Serial-number bound protection markers
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Authorization {
    /// Protection identifiers; non-empty means the preset blob is encrypted
    pub serial_ids: Vec<RawText>,
}

/// Single-entry dictionary wrapping the preset blob
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PresetData {
    /// Dictionary type field
    pub dictionary_type: u32,
    /// Reserved field
    pub reserved: u32,
    /// Opaque preset bytes
    #[serde(skip)]
    pub item: Vec<u8>,
    /// Padding word following the item
    pub padding: u32,
}

/// Closed union of typed leaf records
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum ChunkData {
    /// `RTIN`
    Root(RootInfo),
    /// `APIN`
    AuthoringApplication(AuthoringApplication),
    /// `AUTH`
    Authorization(Authorization),
    /// `PRDA`
    PresetData(PresetData),
}

fn nom_error(tag: FourCc, err: nom::Err<nom::error::Error<&[u8]>>) -> CodecError {
    let detail = match err {
        nom::Err::Incomplete(_) => "incomplete".to_string(),
        nom::Err::Error(e) | nom::Err::Failure(e) => {
            format!("{:?} with {} bytes left", e.code, e.input.len())
        }
    };
    CodecError::MalformedContainer(format!("Chunk '{tag}' payload is malformed: {detail}"))
}

fn text_block(input: &[u8]) -> ParseResult<'_, RawText> {
    let (input, bytes) = length_data(le_u32)(input)?;
    Ok((input, RawText::from(bytes)))
}

fn parse_root(input: &[u8]) -> ParseResult<'_, RootInfo> {
    let (input, repository_magic) = le_u32(input)?;
    let (input, repository_type) = le_u32(input)?;
    let (input, packed) = le_u32(input)?;
    Ok((
        input,
        RootInfo {
            repository_magic,
            repository_type,
            version: PackedVersion::from_packed(packed),
        },
    ))
}

fn parse_application(input: &[u8]) -> ParseResult<'_, AuthoringApplication> {
    let (input, application) = le_u32(input)?;
    let (input, version) = text_block(input)?;
    Ok((
        input,
        AuthoringApplication {
            application,
            version,
        },
    ))
}

fn parse_authorization(input: &[u8]) -> ParseResult<'_, Authorization> {
    let (input, serial_ids) = length_count(le_u32, text_block)(input)?;
    Ok((input, Authorization { serial_ids }))
}

/// `(dictionary_type, item_count, item_size, reserved)`
fn parse_preset_header(input: &[u8]) -> ParseResult<'_, (u32, u32, u32, u32)> {
    let (input, dictionary_type) = le_u32(input)?;
    let (input, item_count) = le_u32(input)?;
    let (input, item_size) = le_u32(input)?;
    let (input, reserved) = le_u32(input)?;
    Ok((input, (dictionary_type, item_count, item_size, reserved)))
}

/// `(item, padding, magic)`
fn parse_preset_body(input: &[u8], item_size: u32) -> ParseResult<'_, (&[u8], u32, u32)> {
    let (input, item) = nom::bytes::complete::take(item_size)(input)?;
    let (input, padding) = le_u32(input)?;
    let (input, magic) = le_u32(input)?;
    Ok((input, (item, padding, magic)))
}

fn finish<T>(tag: FourCc, rest: &[u8], value: T) -> Result<T> {
    if rest.is_empty() {
        Ok(value)
    } else {
        Err(CodecError::MalformedContainer(format!(
            "Chunk '{tag}' has {} unexpected trailing bytes",
            rest.len()
        )))
    }
}

impl ChunkData {
    /// Parse the payload of a registered leaf
    pub fn parse(id: ChunkDataId, payload: &[u8]) -> Result<Self> {
        let tag = Self::tag_for(id);
        let (input, version) = le_u32(payload).map_err(|e| nom_error(tag, e))?;
        if version != CHUNK_DATA_VERSION {
            return Err(CodecError::unrecognized(
                &version.to_le_bytes(),
                format!("chunk '{tag}' record version {version}"),
            ));
        }

        match id {
            ChunkDataId::Root => {
                let (rest, root) = parse_root(input).map_err(|e| nom_error(tag, e))?;
                finish(tag, rest, ChunkData::Root(root))
            }
            ChunkDataId::AuthoringApplication => {
                let (rest, app) = parse_application(input).map_err(|e| nom_error(tag, e))?;
                finish(tag, rest, ChunkData::AuthoringApplication(app))
            }
            ChunkDataId::Authorization => {
                let (rest, auth) = parse_authorization(input).map_err(|e| nom_error(tag, e))?;
                finish(tag, rest, ChunkData::Authorization(auth))
            }
            ChunkDataId::PresetData => {
                let (input, (dictionary_type, item_count, item_size, reserved)) =
                    parse_preset_header(input).map_err(|e| nom_error(tag, e))?;
                if item_count != 1 {
                    return Err(CodecError::UnsupportedVariant(format!(
                        "Preset dictionary with {item_count} entries (only single-entry dictionaries are supported)"
                    )));
                }
                let (rest, (item, padding, magic)) =
                    parse_preset_body(input, item_size).map_err(|e| nom_error(tag, e))?;
                if magic != PRESET_DATA_MAGIC {
                    return Err(CodecError::MalformedContainer(format!(
                        "Preset data magic 0x{magic:08X}, expected 0x{PRESET_DATA_MAGIC:08X}"
                    )));
                }
                finish(
                    tag,
                    rest,
                    ChunkData::PresetData(PresetData {
                        dictionary_type,
                        reserved,
                        item: item.to_vec(),
                        padding,
                    }),
                )
            }
        }
    }

    /// Semantic id
    pub fn id(&self) -> ChunkDataId {
        match self {
            ChunkData::Root(_) => ChunkDataId::Root,
            ChunkData::AuthoringApplication(_) => ChunkDataId::AuthoringApplication,
            ChunkData::Authorization(_) => ChunkDataId::Authorization,
            ChunkData::PresetData(_) => ChunkDataId::PresetData,
        }
    }

    /// Leaf tag for a semantic id
    pub fn tag_for(id: ChunkDataId) -> FourCc {
        match id {
            ChunkDataId::Root => ROOT_TAG,
            ChunkDataId::AuthoringApplication => APPLICATION_TAG,
            ChunkDataId::Authorization => AUTHORIZATION_TAG,
            ChunkDataId::PresetData => PRESET_DATA_TAG,
        }
    }

    /// Leaf tag of this record
    pub fn tag(&self) -> FourCc {
        Self::tag_for(self.id())
    }

    /// Serialize the record payload, version field included
    pub fn encode(&self) -> Result<Vec<u8>> {
        let le = Endian::Little;
        let mut stream = ChunkStream::in_memory();
        stream.write_u32(CHUNK_DATA_VERSION, le)?;
        match self {
            ChunkData::Root(root) => {
                stream.write_u32(root.repository_magic, le)?;
                stream.write_u32(root.repository_type, le)?;
                stream.write_u32(root.version.packed(), le)?;
            }
            ChunkData::AuthoringApplication(app) => {
                stream.write_u32(app.application, le)?;
                stream.write_length_prefixed_block(app.version.as_bytes(), le)?;
            }
            ChunkData::Authorization(auth) => {
                stream.write_u32(auth.serial_ids.len() as u32, le)?;
                for id in &auth.serial_ids {
                    stream.write_length_prefixed_block(id.as_bytes(), le)?;
                }
            }
            ChunkData::PresetData(preset) => {
                stream.write_u32(preset.dictionary_type, le)?;
                stream.write_u32(1, le)?;
                let item_size = u32::try_from(preset.item.len()).map_err(|_| {
                    CodecError::MalformedContainer("Preset item too large".into())
                })?;
                stream.write_u32(item_size, le)?;
                stream.write_u32(preset.reserved, le)?;
                stream.write_bytes(&preset.item)?;
                stream.write_u32(preset.padding, le)?;
                stream.write_u32(PRESET_DATA_MAGIC, le)?;
            }
        }
        Ok(stream.into_bytes())
    }
}
