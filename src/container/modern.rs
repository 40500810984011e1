//! Modern chunk-dictionary container
//!
//! Layout (little-endian):
//! - `u64` total length of the container, these 12 prefix bytes included
//! - `u32` container version (1)
//! - one vendor-dialect tag tree rooted at an `hsin` group
//!
//! Typed leaves (`RTIN`, `APIN`, `AUTH`, `PRDA`) are validated on decode;
//! everything else in the tree is carried through untouched.

use std::io::{Read, Seek};

use log::debug;

use super::chunk_data::{
    registry, Authorization, AuthoringApplication, ChunkData, ChunkDataId, PresetData, RootInfo,
    PRESET_DATA_TAG,
};
use super::legacy::{ContainerHeader, DeclaredCounts};
use crate::config::CodecConfig;
use crate::resources::TemplateStore;
use crate::stream::{ChunkStream, Endian};
use crate::tree::{
    decode_chunks, write_chunk, Chunk, ChunkIdRegistry, Classified, Dialect, WalkEvent,
    VENDOR_CONTAINER_TAG,
};
use crate::{CodecError, Result};

/// Only defined container version
pub const CONTAINER_VERSION: u32 = 1;

/// Bytes in front of the tag tree
pub const CONTAINER_PREFIX_LEN: u64 = 12;

/// Decoded modern container
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModernContainer {
    root: Chunk,
}

impl ModernContainer {
    /// Wrap an `hsin` tree, validating every typed leaf
    pub fn from_root(root: Chunk) -> Result<Self> {
        if root.tag != VENDOR_CONTAINER_TAG || !root.is_group() {
            return Err(CodecError::MalformedContainer(format!(
                "Container root is '{}', expected group '{}'",
                root.tag, VENDOR_CONTAINER_TAG
            )));
        }
        let container = Self { root };
        container.records()?;
        Ok(container)
    }

    /// Decode a container at the cursor
    pub fn read<S: Read + Seek>(stream: &mut ChunkStream<S>, config: &CodecConfig) -> Result<Self> {
        let start = stream.position();
        let total_len = stream.read_u64(Endian::Little)?;
        let version = stream.read_u32(Endian::Little)?;
        if version != CONTAINER_VERSION {
            return Err(CodecError::unrecognized(
                &version.to_le_bytes(),
                format!("container version {version}"),
            ));
        }
        if total_len < CONTAINER_PREFIX_LEN {
            return Err(CodecError::MalformedContainer(format!(
                "Container declares {total_len} bytes, less than its own prefix"
            )));
        }

        let end = start.checked_add(total_len).ok_or_else(|| {
            CodecError::MalformedContainer(format!(
                "Container at offset {start} declares {total_len} bytes, past any addressable end"
            ))
        })?;
        let available = stream.len()?;
        if end > available {
            return Err(CodecError::MalformedContainer(format!(
                "Container declares {} bytes but only {} are present",
                total_len,
                available - start
            )));
        }

        let mut chunks = decode_chunks(stream, end, &Dialect::vendor(), config)?;
        if chunks.len() != 1 {
            return Err(CodecError::MalformedContainer(format!(
                "Container holds {} top-level chunks, expected one '{}' group",
                chunks.len(),
                VENDOR_CONTAINER_TAG
            )));
        }
        let container = Self::from_root(chunks.remove(0))?;
        debug!(
            "Modern container: {} chunks, encrypted: {}",
            container.root.node_count(),
            container.is_encrypted()?
        );
        Ok(container)
    }

    /// Decode a container from memory
    pub fn decode(data: &[u8], config: &CodecConfig) -> Result<Self> {
        let mut stream = ChunkStream::from_slice(data).with_max_block_len(config.max_block_len);
        Self::read(&mut stream, config)
    }

    /// Decode a factory template under the caller's limits
    pub fn from_template(store: &TemplateStore, name: &str, config: &CodecConfig) -> Result<Self> {
        let bytes = store.get(name)?;
        Self::decode(&bytes, config)
    }

    /// Encode the container; every length field is recomputed
    pub fn encode(&self) -> Result<Vec<u8>> {
        let dialect = Dialect::vendor();
        let total_len = CONTAINER_PREFIX_LEN + self.root.encoded_len(&dialect);
        let mut stream = ChunkStream::in_memory();
        stream.write_u64(total_len, Endian::Little)?;
        stream.write_u32(CONTAINER_VERSION, Endian::Little)?;
        write_chunk(&mut stream, &self.root, &dialect)?;
        Ok(stream.into_bytes())
    }

    /// Root `hsin` group
    pub fn root(&self) -> &Chunk {
        &self.root
    }

    /// Format-independent header view
    pub fn header(&self) -> ContainerHeader {
        ContainerHeader {
            schema_version: CONTAINER_VERSION,
            endian: Endian::Little,
            checksum: None,
            declared_counts: DeclaredCounts::default(),
        }
    }

    /// All typed records in depth-first order
    pub fn records(&self) -> Result<Vec<ChunkData>> {
        let registry: ChunkIdRegistry<ChunkDataId> = registry();
        self.root
            .walk()
            .filter_map(|event| match event {
                WalkEvent::Leaf(chunk, _) => match registry.classify(chunk) {
                    Classified::Known(id) => Some(ChunkData::parse(id, &chunk.payload)),
                    Classified::Unknown(_) => None,
                },
                _ => None,
            })
            .collect()
    }

    /// Repository info from the first `RTIN` record
    pub fn root_info(&self) -> Result<RootInfo> {
        self.records()?
            .into_iter()
            .find_map(|record| match record {
                ChunkData::Root(root) => Some(root),
                _ => None,
            })
            .ok_or_else(|| CodecError::MalformedContainer("No root info record".into()))
    }

    /// Authoring application, checked against the expected tool family
    pub fn authoring_application(&self, config: &CodecConfig) -> Result<AuthoringApplication> {
        let app = self
            .records()?
            .into_iter()
            .find_map(|record| match record {
                ChunkData::AuthoringApplication(app) => Some(app),
                _ => None,
            })
            .ok_or_else(|| {
                CodecError::MalformedContainer("No authoring application record".into())
            })?;
        if !config.expected_applications.contains(&app.application) {
            return Err(CodecError::unrecognized(
                &app.application.to_le_bytes(),
                format!("authoring application {}", app.application),
            ));
        }
        Ok(app)
    }

    /// Protection identifiers from every authorization record
    pub fn protection_ids(&self) -> Result<Vec<String>> {
        Ok(self
            .records()?
            .into_iter()
            .filter_map(|record| match record {
                ChunkData::Authorization(Authorization { serial_ids }) => Some(serial_ids),
                _ => None,
            })
            .flatten()
            .map(|id| id.text())
            .collect())
    }

    /// True if any protection identifier is present
    pub fn is_encrypted(&self) -> Result<bool> {
        Ok(!self.protection_ids()?.is_empty())
    }

    /// The preset blob; refused when the container is protected
    pub fn preset_data(&self) -> Result<PresetData> {
        let protection_ids = self.protection_ids()?;
        if !protection_ids.is_empty() {
            return Err(CodecError::EncryptedContent { protection_ids });
        }
        self.records()?
            .into_iter()
            .find_map(|record| match record {
                ChunkData::PresetData(preset) => Some(preset),
                _ => None,
            })
            .ok_or_else(|| CodecError::MalformedContainer("No preset data record".into()))
    }

    /// A copy of this container with the preset blob replaced
    pub fn replace_preset_data(&self, item: Vec<u8>) -> Result<Self> {
        let mut preset = self.preset_data()?;
        preset.item = item;
        let payload = ChunkData::PresetData(preset).encode()?;

        let mut edited = self.root.clone();
        let leaf = edited
            .find_mut(PRESET_DATA_TAG)
            .ok_or_else(|| CodecError::MalformedContainer("No preset data record".into()))?;
        leaf.payload = payload;
        Ok(Self { root: edited })
    }
}
