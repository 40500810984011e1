//! Monolith resource dictionary
//!
//! A monolith bundles an instrument and all of its samples in one file. Its
//! directory is a small pointer graph:
//! - 22-byte header: magic `54 AC 70 5E`, reserved bytes, item count at byte 14
//! - `count` item records: `length u16, offset u32, kind u16, content (length - 8)`
//! - `SubDictionary` items point at another directory at an absolute offset
//!
//! Sibling items are read first and pointers are followed afterwards, so the
//! shared cursor is never moved in the middle of a sibling list.

mod resource;

pub use resource::{read_dictionary_file, MonolithReader};

use std::collections::HashSet;
use std::io::{Read, Seek};

use log::{debug, trace};
use num_derive::FromPrimitive;
use num_traits::FromPrimitive;
use serde::Serialize;

use crate::config::CodecConfig;
use crate::sniff::{MONOLITH_MAGIC_BE, MONOLITH_MAGIC_LE};
use crate::stream::{ChunkStream, Endian};
use crate::{CodecError, Result};

/// Size of a directory header
pub const DIRECTORY_HEADER_LEN: u64 = 22;

/// Offset of the item count inside a directory header
pub const ITEM_COUNT_OFFSET: u64 = 14;

/// Fixed part of an item record (length, offset, kind)
pub const ITEM_HEADER_LEN: u16 = 8;

/// What a directory item refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, FromPrimitive, Serialize)]
#[repr(u16)]
pub enum ReferenceKind {
    /// Terminator entry
    End = 0,
    /// Nested directory
    SubDictionary = 1,
    /// Sample audio (WAV)
    Sample = 2,
    /// Preset bytes
    Preset = 3,
    /// Auxiliary image
    Wallpaper = 4,
}

/// One directory record
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DictionaryItem {
    /// Record length including the 8-byte fixed part
    pub length: u16,
    /// Absolute offset of the referenced data
    pub offset: u32,
    /// Reference kind
    pub reference_kind: ReferenceKind,
    /// Inline content
    #[serde(skip)]
    pub content: Vec<u8>,
    /// Resolved nested directory for `SubDictionary` items
    pub sub_dictionary: Option<Box<Dictionary>>,
}

impl DictionaryItem {
    /// Name stored as NUL-terminated UTF-16LE at the start of the content
    pub fn name(&self) -> Option<String> {
        let units = self
            .content
            .chunks_exact(2)
            .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
            .take_while(|&unit| unit != 0);
        let name: String = char::decode_utf16(units)
            .map(|c| c.unwrap_or(char::REPLACEMENT_CHARACTER))
            .collect();
        (!name.is_empty()).then_some(name)
    }

    /// True for items that reference data rather than structure
    pub fn is_terminal(&self) -> bool {
        !matches!(
            self.reference_kind,
            ReferenceKind::End | ReferenceKind::SubDictionary
        )
    }
}

/// A decoded directory and everything below it
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Dictionary {
    /// Absolute offset of the directory header
    pub offset: u64,
    /// Items in file order
    pub items: Vec<DictionaryItem>,
}

/// A flattened terminal item
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResourceRef {
    /// Slash-separated item names from the top directory down
    pub path: String,
    /// Reference kind
    pub kind: ReferenceKind,
    /// Absolute offset of the data
    pub offset: u32,
}

impl Dictionary {
    /// Terminal items of the whole tree in depth-first order
    pub fn resources(&self) -> Vec<ResourceRef> {
        let mut out = Vec::new();
        self.collect_resources("", &mut out);
        out
    }

    fn collect_resources(&self, prefix: &str, out: &mut Vec<ResourceRef>) {
        for (index, item) in self.items.iter().enumerate() {
            let name = item.name().unwrap_or_else(|| format!("#{index}"));
            let path = if prefix.is_empty() {
                name
            } else {
                format!("{prefix}/{name}")
            };
            if let Some(sub) = &item.sub_dictionary {
                sub.collect_resources(&path, out);
            } else if item.is_terminal() {
                out.push(ResourceRef {
                    path,
                    kind: item.reference_kind,
                    offset: item.offset,
                });
            }
        }
    }

    /// Number of directories in this tree, this one included
    pub fn dictionary_count(&self) -> usize {
        1 + self
            .items
            .iter()
            .filter_map(|item| item.sub_dictionary.as_deref())
            .map(Dictionary::dictionary_count)
            .sum::<usize>()
    }
}

/// Follows directory pointers through one owned cursor
///
/// Every directory offset may be entered once; a second visit means the
/// pointer graph has a cycle or shared node and the file is rejected.
pub struct DictionaryResolver<S> {
    stream: ChunkStream<S>,
    visited: HashSet<u64>,
    max_depth: usize,
}

impl<S: Read + Seek> DictionaryResolver<S> {
    /// Take ownership of the cursor
    pub fn new(stream: ChunkStream<S>, config: &CodecConfig) -> Self {
        Self {
            stream,
            visited: HashSet::new(),
            max_depth: config.max_depth,
        }
    }

    /// Decode the directory at `offset` and everything it points to
    pub fn resolve(&mut self, offset: u64) -> Result<Dictionary> {
        let dictionary = self.resolve_at(offset, 0)?;
        debug!(
            "Resolved monolith dictionary at offset {}: {} directories, {} resources",
            offset,
            dictionary.dictionary_count(),
            dictionary.resources().len()
        );
        Ok(dictionary)
    }

    /// Give the cursor back
    pub fn into_stream(self) -> ChunkStream<S> {
        self.stream
    }

    fn resolve_at(&mut self, offset: u64, depth: usize) -> Result<Dictionary> {
        if depth >= self.max_depth {
            return Err(CodecError::MalformedContainer(format!(
                "Dictionary at offset {} exceeds maximum nesting depth {}",
                offset, self.max_depth
            )));
        }
        if !self.visited.insert(offset) {
            return Err(CodecError::MalformedContainer(format!(
                "Dictionary offset {offset} is referenced twice"
            )));
        }

        self.stream.seek(offset)?;
        let count = self.read_header()?;
        trace!("Dictionary at offset {offset}: {count} items");

        // Pass 1: sibling records
        let mut items = Vec::with_capacity((count as usize).min(1024));
        for _ in 0..count {
            items.push(self.read_item()?);
        }

        // Pass 2: follow pointers
        for item in &mut items {
            if item.reference_kind == ReferenceKind::SubDictionary {
                let sub = self.resolve_at(item.offset as u64, depth + 1)?;
                item.sub_dictionary = Some(Box::new(sub));
            }
        }

        Ok(Dictionary { offset, items })
    }

    fn read_header(&mut self) -> Result<u32> {
        let start = self.stream.position();
        let magic = self.stream.read_bytes(4)?;
        if magic == MONOLITH_MAGIC_BE {
            return Err(CodecError::UnsupportedVariant(
                "Big-endian monolith dictionaries are not supported".into(),
            ));
        }
        if magic != MONOLITH_MAGIC_LE {
            return Err(CodecError::unrecognized(&magic, "monolith directory magic"));
        }
        self.stream.seek(start + ITEM_COUNT_OFFSET)?;
        let count = self.stream.read_u32(Endian::Little)?;
        self.stream.seek(start + DIRECTORY_HEADER_LEN)?;
        Ok(count)
    }

    fn read_item(&mut self) -> Result<DictionaryItem> {
        let start = self.stream.position();
        let length = self.stream.read_u16(Endian::Little)?;
        let offset = self.stream.read_u32(Endian::Little)?;
        let kind = self.stream.read_u16(Endian::Little)?;

        if length < ITEM_HEADER_LEN {
            return Err(CodecError::MalformedContainer(format!(
                "Dictionary item at offset {start} is {length} bytes, shorter than its header"
            )));
        }
        let reference_kind = ReferenceKind::from_u16(kind).ok_or_else(|| {
            CodecError::MalformedContainer(format!(
                "Dictionary item at offset {start} has unknown reference kind {kind}"
            ))
        })?;
        let content = self
            .stream
            .read_bytes((length - ITEM_HEADER_LEN) as usize)?;

        Ok(DictionaryItem {
            length,
            offset,
            reference_kind,
            content,
            sub_dictionary: None,
        })
    }
}

/// Decode the dictionary at the start of an in-memory monolith
pub fn read_dictionary(data: &[u8], config: &CodecConfig) -> Result<Dictionary> {
    let stream = ChunkStream::from_slice(data).with_max_block_len(config.max_block_len);
    DictionaryResolver::new(stream, config).resolve(0)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn header(count: u32) -> Vec<u8> {
        let mut data = Vec::new();
        data.extend_from_slice(&MONOLITH_MAGIC_LE);
        data.extend_from_slice(&[0u8; 10]); // reserved
        data.extend_from_slice(&count.to_le_bytes());
        data.extend_from_slice(&[0u8; 4]); // reserved
        data
    }

    pub(crate) fn item(kind: u16, offset: u32, name: &str) -> Vec<u8> {
        let mut content: Vec<u8> = name.encode_utf16().flat_map(u16::to_le_bytes).collect();
        content.extend_from_slice(&[0, 0]);
        let mut data = Vec::new();
        data.extend_from_slice(&(content.len() as u16 + 8).to_le_bytes());
        data.extend_from_slice(&offset.to_le_bytes());
        data.extend_from_slice(&kind.to_le_bytes());
        data.extend_from_slice(&content);
        data
    }

    #[test]
    fn test_flat_directory() {
        let mut data = header(2);
        data.extend_from_slice(&item(2, 0x1000, "kick.wav"));
        data.extend_from_slice(&item(3, 0x2000, "kit.nki"));
        let dictionary = read_dictionary(&data, &CodecConfig::default()).unwrap();
        assert_eq!(dictionary.items.len(), 2);
        assert_eq!(dictionary.items[0].reference_kind, ReferenceKind::Sample);
        assert_eq!(dictionary.items[0].name().as_deref(), Some("kick.wav"));
        assert_eq!(dictionary.items[1].offset, 0x2000);
    }

    #[test]
    fn test_declared_count_exceeds_records() {
        let mut data = header(3);
        data.extend_from_slice(&item(2, 0, "a.wav"));
        data.extend_from_slice(&item(2, 0, "b.wav"));
        let err = read_dictionary(&data, &CodecConfig::default()).unwrap_err();
        assert!(err.is_truncation(), "{err}");
    }

    #[test]
    fn test_nested_directory_resolved_after_siblings() {
        let mut data = header(2);
        let sub_offset = (data.len() + item(1, 0, "Samples").len() + item(3, 0, "p").len()) as u32;
        data.extend_from_slice(&item(1, sub_offset, "Samples"));
        data.extend_from_slice(&item(3, 0x4000, "p"));
        assert_eq!(data.len() as u32, sub_offset);
        data.extend_from_slice(&header(1));
        data.extend_from_slice(&item(2, 0x5000, "pad.wav"));

        let dictionary = read_dictionary(&data, &CodecConfig::default()).unwrap();
        assert_eq!(dictionary.dictionary_count(), 2);
        let resources = dictionary.resources();
        assert_eq!(resources.len(), 2);
        assert_eq!(resources[0].path, "Samples/pad.wav");
        assert_eq!(resources[0].offset, 0x5000);
        assert_eq!(resources[1].path, "p");
    }

    #[test]
    fn test_self_reference_is_rejected() {
        let mut data = header(1);
        data.extend_from_slice(&item(1, 0, "loop"));
        let err = read_dictionary(&data, &CodecConfig::default()).unwrap_err();
        assert!(matches!(err, CodecError::MalformedContainer(_)));
    }

    #[test]
    fn test_unknown_kind_rejected() {
        let mut data = header(1);
        data.extend_from_slice(&item(9, 0, "x"));
        let err = read_dictionary(&data, &CodecConfig::default()).unwrap_err();
        assert!(matches!(err, CodecError::MalformedContainer(_)));
    }

    #[test]
    fn test_short_item_length_rejected() {
        let mut data = header(1);
        data.extend_from_slice(&4u16.to_le_bytes());
        data.extend_from_slice(&0u32.to_le_bytes());
        data.extend_from_slice(&2u16.to_le_bytes());
        let err = read_dictionary(&data, &CodecConfig::default()).unwrap_err();
        assert!(matches!(err, CodecError::MalformedContainer(_)));
    }

    #[test]
    fn test_big_endian_unsupported() {
        let mut data = MONOLITH_MAGIC_BE.to_vec();
        data.extend_from_slice(&[0u8; 18]);
        let err = read_dictionary(&data, &CodecConfig::default()).unwrap_err();
        assert!(matches!(err, CodecError::UnsupportedVariant(_)));
    }
}
