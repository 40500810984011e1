//! Tag tree decoding and encoding
//!
//! Wire shape: `tag (4 bytes), length (u32, dialect byte order), payload`.
//! Group payloads hold the dialect prefix followed by nested chunks, and in
//! symmetric dialects a zero-length upper-case closing chunk.

use std::io::{Read, Seek, Write};

use log::trace;

use super::{Chunk, ChunkKind, Dialect, FourCc, CHUNK_HEADER_LEN};
use crate::config::CodecConfig;
use crate::stream::ChunkStream;
use crate::{CodecError, Result};

/// Recursive-descent decoder bound to one dialect and one set of limits
pub struct TreeDecoder<'a> {
    dialect: &'a Dialect,
    config: &'a CodecConfig,
}

impl<'a> TreeDecoder<'a> {
    /// Create a decoder
    pub fn new(dialect: &'a Dialect, config: &'a CodecConfig) -> Self {
        Self { dialect, config }
    }

    /// Decode sibling chunks from the cursor up to the absolute offset `end`
    pub fn decode_sequence<S: Read + Seek>(
        &self,
        stream: &mut ChunkStream<S>,
        end: u64,
    ) -> Result<Vec<Chunk>> {
        let mut chunks = Vec::new();
        while stream.position() < end {
            if end - stream.position() < CHUNK_HEADER_LEN as u64 {
                return Err(CodecError::MalformedContainer(format!(
                    "{} trailing bytes at offset {} are too short for a chunk header",
                    end - stream.position(),
                    stream.position()
                )));
            }
            chunks.push(self.decode_chunk(stream, end, 0)?);
        }
        Ok(chunks)
    }

    /// Decode one chunk whose encoded bytes must end at or before `limit`
    pub fn decode_chunk<S: Read + Seek>(
        &self,
        stream: &mut ChunkStream<S>,
        limit: u64,
        depth: usize,
    ) -> Result<Chunk> {
        let endian = self.dialect.endian();
        let start = stream.position();
        let tag = stream.read_fourcc()?;
        let len = stream.read_u32(endian)?;

        if len > self.config.max_chunk_len {
            return Err(CodecError::MalformedContainer(format!(
                "Chunk '{}' at offset {} declares {} bytes, limit is {}",
                tag, start, len, self.config.max_chunk_len
            )));
        }

        let body_start = stream.position();
        let body_end = body_start + len as u64;
        if body_end > limit {
            return Err(CodecError::MalformedContainer(format!(
                "Chunk '{}' at offset {} declares {} bytes but only {} remain in its parent",
                tag,
                start,
                len,
                limit.saturating_sub(body_start)
            )));
        }

        let chunk = if self.dialect.is_group(tag) {
            self.decode_group_body(stream, tag, len, body_end, depth)?
        } else {
            let payload = stream.read_bytes(len as usize)?;
            Chunk::leaf(tag, payload)
        };

        trace!(
            "{} chunk '{}' at offset {} ({} bytes)",
            self.dialect.name(),
            tag,
            start,
            len
        );

        // Some writers drop the final pad byte of the outermost chunk.
        let pad = self.dialect.pad_len(len) as u64;
        if pad > 0 && stream.position() + pad <= limit {
            stream.skip(pad)?;
        }

        Ok(chunk)
    }

    fn decode_group_body<S: Read + Seek>(
        &self,
        stream: &mut ChunkStream<S>,
        tag: FourCc,
        len: u32,
        body_end: u64,
        depth: usize,
    ) -> Result<Chunk> {
        if depth >= self.config.max_depth {
            return Err(CodecError::MalformedContainer(format!(
                "Group '{}' at offset {} exceeds maximum nesting depth {}",
                tag,
                stream.position(),
                self.config.max_depth
            )));
        }

        let prefix_len = self.dialect.group_prefix_len();
        if len < prefix_len {
            return Err(CodecError::MalformedContainer(format!(
                "Group '{}' is {} bytes, shorter than its {}-byte prefix",
                tag, len, prefix_len
            )));
        }
        let prefix = stream.read_bytes(prefix_len as usize)?;

        let closing = self.dialect.closing_tag(tag);
        let mut children = Vec::new();
        let mut closed = false;

        while stream.position() < body_end {
            if body_end - stream.position() < CHUNK_HEADER_LEN as u64 {
                return Err(CodecError::MalformedContainer(format!(
                    "Group '{}' has {} stray bytes at offset {}",
                    tag,
                    body_end - stream.position(),
                    stream.position()
                )));
            }

            if let Some(close) = closing {
                let next = stream.peek_bytes(4)?;
                if next.as_slice() == close.as_bytes() {
                    let marker_at = stream.position();
                    stream.read_fourcc()?;
                    let marker_len = stream.read_u32(self.dialect.endian())?;
                    if marker_len != 0 || stream.position() != body_end {
                        return Err(CodecError::MalformedContainer(format!(
                            "Closing marker '{}' at offset {} is not the empty last child of '{}'",
                            close, marker_at, tag
                        )));
                    }
                    closed = true;
                    break;
                }
            }

            children.push(self.decode_chunk(stream, body_end, depth + 1)?);
        }

        if let Some(close) = closing {
            if !closed {
                return Err(CodecError::MalformedContainer(format!(
                    "Group '{}' ends without closing marker '{}'",
                    tag, close
                )));
            }
        }

        Ok(Chunk {
            tag,
            kind: ChunkKind::Group,
            payload: prefix,
            children,
        })
    }
}

/// Decode a complete byte buffer into its top-level chunks
pub fn decode_tree(data: &[u8], dialect: &Dialect, config: &CodecConfig) -> Result<Vec<Chunk>> {
    let mut stream = ChunkStream::from_slice(data).with_max_block_len(config.max_block_len);
    let end = data.len() as u64;
    TreeDecoder::new(dialect, config).decode_sequence(&mut stream, end)
}

/// Decode chunks from the cursor up to the absolute offset `end`
pub fn decode_chunks<S: Read + Seek>(
    stream: &mut ChunkStream<S>,
    end: u64,
    dialect: &Dialect,
    config: &CodecConfig,
) -> Result<Vec<Chunk>> {
    TreeDecoder::new(dialect, config).decode_sequence(stream, end)
}

/// Encode a sequence of chunks, recomputing every length field
pub fn encode_tree(chunks: &[Chunk], dialect: &Dialect) -> Result<Vec<u8>> {
    let mut stream = ChunkStream::in_memory();
    for chunk in chunks {
        write_chunk(&mut stream, chunk, dialect)?;
    }
    Ok(stream.into_bytes())
}

/// Write one chunk and its subtree at the cursor
pub fn write_chunk<S: Write + Seek>(
    stream: &mut ChunkStream<S>,
    chunk: &Chunk,
    dialect: &Dialect,
) -> Result<()> {
    let endian = dialect.endian();
    let body_len = u32::try_from(chunk.body_len(dialect)).map_err(|_| {
        CodecError::MalformedContainer(format!(
            "Chunk '{}' is too large for a 32-bit length field",
            chunk.tag
        ))
    })?;

    match chunk.kind {
        ChunkKind::Leaf => {
            if dialect.is_group(chunk.tag) {
                return Err(CodecError::MalformedContainer(format!(
                    "Leaf chunk uses group tag '{}' of the {} dialect",
                    chunk.tag,
                    dialect.name()
                )));
            }
            stream.write_fourcc(chunk.tag)?;
            stream.write_u32(body_len, endian)?;
            stream.write_bytes(&chunk.payload)?;
        }
        ChunkKind::Group => {
            if !dialect.is_group(chunk.tag) {
                return Err(CodecError::MalformedContainer(format!(
                    "Tag '{}' is not a group in the {} dialect",
                    chunk.tag,
                    dialect.name()
                )));
            }
            if chunk.payload.len() != dialect.group_prefix_len() as usize {
                return Err(CodecError::MalformedContainer(format!(
                    "Group '{}' prefix is {} bytes, dialect expects {}",
                    chunk.tag,
                    chunk.payload.len(),
                    dialect.group_prefix_len()
                )));
            }
            let closing = dialect.closing_tag(chunk.tag);

            stream.write_fourcc(chunk.tag)?;
            stream.write_u32(body_len, endian)?;
            stream.write_bytes(&chunk.payload)?;
            for child in &chunk.children {
                if Some(child.tag) == closing {
                    return Err(CodecError::MalformedContainer(format!(
                        "Child '{}' collides with the closing marker of '{}'",
                        child.tag, chunk.tag
                    )));
                }
                write_chunk(stream, child, dialect)?;
            }
            if let Some(close) = closing {
                stream.write_fourcc(close)?;
                stream.write_u32(0, endian)?;
            }
        }
    }

    if dialect.pad_len(body_len) > 0 {
        stream.write_u8(0)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::{VENDOR_CONTAINER_TAG, VENDOR_SUBITEMS_TAG};

    fn riff_bytes() -> Vec<u8> {
        let mut data = Vec::new();
        data.extend_from_slice(b"RIFF");
        data.extend_from_slice(&24u32.to_le_bytes()); // WAVE + junk (3 + pad) + data (0)
        data.extend_from_slice(b"WAVE");
        data.extend_from_slice(b"junk");
        data.extend_from_slice(&3u32.to_le_bytes());
        data.extend_from_slice(&[1, 2, 3, 0]); // odd payload + pad
        data.extend_from_slice(b"data");
        data.extend_from_slice(&0u32.to_le_bytes());
        data
    }

    #[test]
    fn test_decode_riff_with_padding() {
        let config = CodecConfig::default();
        let tree = decode_tree(&riff_bytes(), &Dialect::riff(), &config).unwrap();
        assert_eq!(tree.len(), 1);
        let riff = &tree[0];
        assert_eq!(riff.form_type(), Some(FourCc::new(b"WAVE")));
        assert_eq!(riff.children.len(), 2);
        assert_eq!(riff.children[0].payload, vec![1, 2, 3]);
        assert_eq!(riff.children[1].kind, ChunkKind::Leaf);
        assert!(riff.children[1].payload.is_empty());
    }

    #[test]
    fn test_riff_reencodes_identically() {
        let config = CodecConfig::default();
        let bytes = riff_bytes();
        let tree = decode_tree(&bytes, &Dialect::riff(), &config).unwrap();
        assert_eq!(encode_tree(&tree, &Dialect::riff()).unwrap(), bytes);
    }

    #[test]
    fn test_vendor_closing_marker() {
        let tree = vec![Chunk::group(
            VENDOR_CONTAINER_TAG,
            vec![
                Chunk::leaf(FourCc::new(b"RTIN"), vec![9; 5]),
                Chunk::group(VENDOR_SUBITEMS_TAG, vec![]),
            ],
        )];
        let dialect = Dialect::vendor();
        let bytes = encode_tree(&tree, &dialect).unwrap();

        // hsin(8) + RTIN(8+5) + sbit(8 + SBIT 8) + HSIN(8)
        assert_eq!(bytes.len(), 45);
        assert_eq!(&bytes[bytes.len() - 8..bytes.len() - 4], b"HSIN");
        assert_eq!(u32::from_le_bytes(bytes[4..8].try_into().unwrap()), 37);

        let decoded = decode_tree(&bytes, &dialect, &CodecConfig::default()).unwrap();
        assert_eq!(decoded, tree);
    }

    #[test]
    fn test_missing_closing_marker_rejected() {
        let mut data = Vec::new();
        data.extend_from_slice(b"hsin");
        data.extend_from_slice(&9u32.to_le_bytes());
        data.extend_from_slice(b"abcd");
        data.extend_from_slice(&1u32.to_le_bytes());
        data.push(0xFF);
        let err = decode_tree(&data, &Dialect::vendor(), &CodecConfig::default()).unwrap_err();
        assert!(matches!(err, CodecError::MalformedContainer(_)));
    }

    #[test]
    fn test_child_overrunning_parent_rejected() {
        let mut data = Vec::new();
        data.extend_from_slice(b"LIST");
        data.extend_from_slice(&16u32.to_le_bytes());
        data.extend_from_slice(b"INFO");
        data.extend_from_slice(b"INAM");
        data.extend_from_slice(&100u32.to_le_bytes()); // claims more than LIST holds
        data.extend_from_slice(&[0u8; 4]);
        let err = decode_tree(&data, &Dialect::riff(), &CodecConfig::default()).unwrap_err();
        assert!(matches!(err, CodecError::MalformedContainer(_)));
    }

    #[test]
    fn test_depth_limit() {
        let mut node = Chunk::form(FourCc::new(b"LIST"), FourCc::new(b"leaf"), vec![]);
        for _ in 0..5 {
            node = Chunk::form(FourCc::new(b"LIST"), FourCc::new(b"nest"), vec![node]);
        }
        let bytes = encode_tree(&[node], &Dialect::riff()).unwrap();
        let config = CodecConfig {
            max_depth: 3,
            ..CodecConfig::default()
        };
        let err = decode_tree(&bytes, &Dialect::riff(), &config).unwrap_err();
        assert!(matches!(err, CodecError::MalformedContainer(_)));
        assert!(decode_tree(&bytes, &Dialect::riff(), &CodecConfig::default()).is_ok());
    }

    #[test]
    fn test_encode_rejects_leaf_with_group_tag() {
        let tree = vec![Chunk::leaf(FourCc::new(b"LIST"), vec![])];
        assert!(encode_tree(&tree, &Dialect::riff()).is_err());
    }

    #[test]
    fn test_edit_propagates_to_ancestor_lengths() {
        let config = CodecConfig::default();
        let mut tree = decode_tree(&riff_bytes(), &Dialect::riff(), &config).unwrap();
        tree[0].find_mut(FourCc::new(b"data")).unwrap().payload = vec![0xAA; 10];
        let bytes = encode_tree(&tree, &Dialect::riff()).unwrap();
        assert_eq!(u32::from_le_bytes(bytes[4..8].try_into().unwrap()), 34);
        assert_eq!(bytes.len(), 42);
    }
}
