//! Chunk stream cursor
//!
//! A thin cursor over any `Read + Seek` source or `Write + Seek` sink that
//! reads and writes the primitive values every container codec is built from:
//! fixed-width integers in either byte order, four-character codes, text
//! fields, length-prefixed blocks and raw byte runs.
//!
//! The cursor tracks the absolute position itself and never buffers ahead, so
//! seeking backwards and forwards again (as the monolith dictionary resolver
//! does) always lands on the same bytes. A failed read restores the position
//! it started from; no partial values are returned.

mod endian;
mod text;

pub use endian::Endian;
pub use text::RawText;

use std::io::{Cursor, Read, Seek, SeekFrom, Write};

use crate::config::DEFAULT_MAX_BLOCK_LEN;
use crate::tree::FourCc;
use crate::{CodecError, Result};

/// Cursor over a random-access byte source or sink
pub struct ChunkStream<S> {
    inner: S,
    position: u64,
    // Stream length, known up front for buffers and cached after the first lookup
    end: Option<u64>,
    max_block_len: u32,
}

impl<'a> ChunkStream<Cursor<&'a [u8]>> {
    /// Create a reader over an in-memory byte slice
    pub fn from_slice(data: &'a [u8]) -> Self {
        Self {
            inner: Cursor::new(data),
            position: 0,
            end: Some(data.len() as u64),
            max_block_len: DEFAULT_MAX_BLOCK_LEN,
        }
    }
}

impl ChunkStream<Cursor<Vec<u8>>> {
    /// Create a writer backed by a growable buffer
    pub fn in_memory() -> Self {
        Self {
            inner: Cursor::new(Vec::new()),
            position: 0,
            end: Some(0),
            max_block_len: DEFAULT_MAX_BLOCK_LEN,
        }
    }

    /// Consume the writer and return the bytes written so far
    pub fn into_bytes(self) -> Vec<u8> {
        self.inner.into_inner()
    }
}

impl<S: Seek> ChunkStream<S> {
    /// Wrap a seekable stream; the current stream position becomes the cursor position
    pub fn new(mut inner: S) -> Result<Self> {
        let position = inner.stream_position()?;
        Ok(Self {
            inner,
            position,
            end: None,
            max_block_len: DEFAULT_MAX_BLOCK_LEN,
        })
    }

    /// Limit the size accepted by [`ChunkStream::read_length_prefixed_block`]
    pub fn with_max_block_len(mut self, max_block_len: u32) -> Self {
        self.max_block_len = max_block_len;
        self
    }

    /// Absolute position of the cursor
    pub fn position(&self) -> u64 {
        self.position
    }

    /// Move the cursor to an absolute offset
    pub fn seek(&mut self, offset: u64) -> Result<()> {
        self.position = self.inner.seek(SeekFrom::Start(offset))?;
        Ok(())
    }

    /// Total length of the underlying stream
    ///
    /// Only the first call on a wrapped stream seeks to the end; the result is
    /// cached and kept current by the write methods.
    pub fn len(&mut self) -> Result<u64> {
        if let Some(end) = self.end {
            return Ok(end);
        }
        let end = self.inner.seek(SeekFrom::End(0))?;
        self.inner.seek(SeekFrom::Start(self.position))?;
        self.end = Some(end);
        Ok(end)
    }

    /// True if the underlying stream holds no bytes
    pub fn is_empty(&mut self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Bytes between the cursor and the end of the stream
    pub fn remaining(&mut self) -> Result<u64> {
        Ok(self.len()?.saturating_sub(self.position))
    }

    /// Access the wrapped stream
    pub fn get_ref(&self) -> &S {
        &self.inner
    }

    /// Unwrap the stream
    pub fn into_inner(self) -> S {
        self.inner
    }
}

impl<S: Read + Seek> ChunkStream<S> {
    /// Fill `buf` completely or fail without moving the cursor.
    fn fill(&mut self, buf: &mut [u8]) -> Result<()> {
        let start = self.position;
        match self.inner.read_exact(buf) {
            Ok(()) => {
                self.position += buf.len() as u64;
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                self.inner.seek(SeekFrom::Start(start))?;
                Err(CodecError::UnexpectedEof {
                    position: start,
                    needed: buf.len(),
                })
            }
            Err(e) => Err(e.into()),
        }
    }

    fn read_array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let mut buf = [0u8; N];
        self.fill(&mut buf)?;
        Ok(buf)
    }

    /// Read one byte
    pub fn read_u8(&mut self) -> Result<u8> {
        Ok(self.read_array::<1>()?[0])
    }

    /// Read a 16-bit unsigned integer
    pub fn read_u16(&mut self, endian: Endian) -> Result<u16> {
        let b = self.read_array::<2>()?;
        Ok(match endian {
            Endian::Big => u16::from_be_bytes(b),
            Endian::Little => u16::from_le_bytes(b),
        })
    }

    /// Read a 32-bit unsigned integer
    pub fn read_u32(&mut self, endian: Endian) -> Result<u32> {
        let b = self.read_array::<4>()?;
        Ok(match endian {
            Endian::Big => u32::from_be_bytes(b),
            Endian::Little => u32::from_le_bytes(b),
        })
    }

    /// Read a 32-bit signed integer
    pub fn read_i32(&mut self, endian: Endian) -> Result<i32> {
        Ok(self.read_u32(endian)? as i32)
    }

    /// Read a 64-bit unsigned integer
    pub fn read_u64(&mut self, endian: Endian) -> Result<u64> {
        let b = self.read_array::<8>()?;
        Ok(match endian {
            Endian::Big => u64::from_be_bytes(b),
            Endian::Little => u64::from_le_bytes(b),
        })
    }

    /// Read a four-character code
    pub fn read_fourcc(&mut self) -> Result<FourCc> {
        Ok(FourCc(self.read_array::<4>()?))
    }

    /// Read exactly `len` raw bytes
    pub fn read_bytes(&mut self, len: usize) -> Result<Vec<u8>> {
        // Check the remaining length first so a corrupt size cannot trigger a huge allocation.
        let remaining = self.remaining()?;
        if len as u64 > remaining {
            return Err(CodecError::UnexpectedEof {
                position: self.position,
                needed: len,
            });
        }
        let mut buf = vec![0u8; len];
        self.fill(&mut buf)?;
        Ok(buf)
    }

    /// Read a fixed-width text field, keeping padding and trailing bytes
    pub fn read_text(&mut self, len: usize) -> Result<RawText> {
        Ok(RawText::new(self.read_bytes(len)?))
    }

    /// Read a fixed-width field as text, dropping the NUL and everything after it
    pub fn read_ascii(&mut self, len: usize) -> Result<String> {
        Ok(self.read_text(len)?.text())
    }

    /// Read ASCII up to (and consuming) a NUL terminator
    pub fn read_null_terminated_ascii(&mut self) -> Result<String> {
        let start = self.position;
        let mut s = String::new();
        loop {
            match self.read_u8() {
                Ok(0) => return Ok(s),
                Ok(b) => s.push(b as char),
                Err(e) => {
                    self.seek(start)?;
                    return Err(e);
                }
            }
        }
    }

    /// Read a u32 length followed by that many bytes
    pub fn read_length_prefixed_block(&mut self, endian: Endian) -> Result<Vec<u8>> {
        let start = self.position;
        let len = self.read_u32(endian)?;
        if len > self.max_block_len {
            self.seek(start)?;
            return Err(CodecError::MalformedContainer(format!(
                "Block length {} at offset {} exceeds limit of {}",
                len, start, self.max_block_len
            )));
        }
        match self.read_bytes(len as usize) {
            Ok(bytes) => Ok(bytes),
            Err(e) => {
                self.seek(start)?;
                Err(e)
            }
        }
    }

    /// Advance the cursor by `count` bytes, failing if that passes the end
    pub fn skip(&mut self, count: u64) -> Result<()> {
        if count > self.remaining()? {
            return Err(CodecError::UnexpectedEof {
                position: self.position,
                needed: count as usize,
            });
        }
        self.seek(self.position + count)
    }

    /// Look at the next `len` bytes without moving the cursor
    pub fn peek_bytes(&mut self, len: usize) -> Result<Vec<u8>> {
        let start = self.position;
        let bytes = self.read_bytes(len)?;
        self.seek(start)?;
        Ok(bytes)
    }
}

impl<S: Write + Seek> ChunkStream<S> {
    /// Write raw bytes
    pub fn write_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        self.inner.write_all(bytes)?;
        self.position += bytes.len() as u64;
        if let Some(end) = self.end.as_mut() {
            *end = (*end).max(self.position);
        }
        Ok(())
    }

    /// Write one byte
    pub fn write_u8(&mut self, value: u8) -> Result<()> {
        self.write_bytes(&[value])
    }

    /// Write a 16-bit unsigned integer
    pub fn write_u16(&mut self, value: u16, endian: Endian) -> Result<()> {
        match endian {
            Endian::Big => self.write_bytes(&value.to_be_bytes()),
            Endian::Little => self.write_bytes(&value.to_le_bytes()),
        }
    }

    /// Write a 32-bit unsigned integer
    pub fn write_u32(&mut self, value: u32, endian: Endian) -> Result<()> {
        match endian {
            Endian::Big => self.write_bytes(&value.to_be_bytes()),
            Endian::Little => self.write_bytes(&value.to_le_bytes()),
        }
    }

    /// Write a 32-bit signed integer
    pub fn write_i32(&mut self, value: i32, endian: Endian) -> Result<()> {
        self.write_u32(value as u32, endian)
    }

    /// Write a 64-bit unsigned integer
    pub fn write_u64(&mut self, value: u64, endian: Endian) -> Result<()> {
        match endian {
            Endian::Big => self.write_bytes(&value.to_be_bytes()),
            Endian::Little => self.write_bytes(&value.to_le_bytes()),
        }
    }

    /// Write a four-character code
    pub fn write_fourcc(&mut self, tag: FourCc) -> Result<()> {
        self.write_bytes(&tag.0)
    }

    /// Write a text field of exactly `len` bytes, NUL padded; longer text is an error
    pub fn write_text(&mut self, text: &RawText, len: usize) -> Result<()> {
        if text.len() > len {
            return Err(CodecError::MalformedContainer(format!(
                "Field value {text:?} does not fit {len} bytes"
            )));
        }
        let mut field = vec![0u8; len];
        field[..text.len()].copy_from_slice(text.as_bytes());
        self.write_bytes(&field)
    }

    /// Write ASCII into a fixed-width field, NUL padded
    pub fn write_ascii(&mut self, text: &str, len: usize) -> Result<()> {
        if !text.is_ascii() {
            return Err(CodecError::MalformedContainer(format!(
                "Field value {text:?} is not ASCII"
            )));
        }
        self.write_text(&RawText::from(text), len)
    }

    /// Write ASCII followed by a NUL terminator
    pub fn write_null_terminated_ascii(&mut self, text: &str) -> Result<()> {
        self.write_bytes(text.as_bytes())?;
        self.write_u8(0)
    }

    /// Write a u32 length followed by the bytes
    pub fn write_length_prefixed_block(&mut self, bytes: &[u8], endian: Endian) -> Result<()> {
        let len = u32::try_from(bytes.len()).map_err(|_| {
            CodecError::MalformedContainer(format!("Block of {} bytes is too large", bytes.len()))
        })?;
        self.write_u32(len, endian)?;
        self.write_bytes(bytes)
    }

    /// Overwrite a u32 at an absolute offset and return to the current position
    pub fn patch_u32_at(&mut self, offset: u64, value: u32, endian: Endian) -> Result<()> {
        let resume = self.position;
        self.seek(offset)?;
        self.write_u32(value, endian)?;
        self.seek(resume)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_integers_both_orders() {
        let data = [0x12, 0x34, 0x56, 0x78, 0x12, 0x34, 0x56, 0x78];
        let mut stream = ChunkStream::from_slice(&data);
        assert_eq!(stream.read_u32(Endian::Big).unwrap(), 0x1234_5678);
        assert_eq!(stream.read_u32(Endian::Little).unwrap(), 0x7856_3412);
        assert_eq!(stream.position(), 8);
    }

    #[test]
    fn test_eof_restores_position() {
        let data = [1u8, 2, 3];
        let mut stream = ChunkStream::from_slice(&data);
        stream.read_u8().unwrap();
        let err = stream.read_u32(Endian::Little).unwrap_err();
        assert!(matches!(
            err,
            CodecError::UnexpectedEof {
                position: 1,
                needed: 4
            }
        ));
        assert_eq!(stream.position(), 1);
        assert_eq!(stream.read_u16(Endian::Big).unwrap(), 0x0203);
    }

    #[test]
    fn test_seek_back_and_forth_is_idempotent() {
        let data: Vec<u8> = (0u8..32).collect();
        let mut stream = ChunkStream::from_slice(&data);
        stream.seek(20).unwrap();
        let first = stream.read_u32(Endian::Little).unwrap();
        stream.seek(4).unwrap();
        stream.read_u32(Endian::Little).unwrap();
        stream.seek(20).unwrap();
        assert_eq!(stream.read_u32(Endian::Little).unwrap(), first);
    }

    #[test]
    fn test_ascii_fields() {
        let mut data = Vec::new();
        data.extend_from_slice(b"Moss\0\0\0\0");
        data.extend_from_slice(b"hello\0");
        let mut stream = ChunkStream::from_slice(&data);
        assert_eq!(stream.read_ascii(8).unwrap(), "Moss");
        assert_eq!(stream.read_null_terminated_ascii().unwrap(), "hello");
    }

    #[test]
    fn test_unterminated_string_fails() {
        let mut stream = ChunkStream::from_slice(b"abc");
        assert!(stream.read_null_terminated_ascii().is_err());
        assert_eq!(stream.position(), 0);
    }

    #[test]
    fn test_length_prefixed_block_limits() {
        let mut data = Vec::new();
        data.extend_from_slice(&100u32.to_le_bytes());
        data.extend_from_slice(&[0u8; 100]);
        let mut stream = ChunkStream::from_slice(&data).with_max_block_len(10);
        let err = stream.read_length_prefixed_block(Endian::Little).unwrap_err();
        assert!(matches!(err, CodecError::MalformedContainer(_)));
        assert_eq!(stream.position(), 0);
    }

    #[test]
    fn test_truncated_block_is_eof() {
        let mut data = Vec::new();
        data.extend_from_slice(&8u32.to_be_bytes());
        data.extend_from_slice(&[0u8; 3]);
        let mut stream = ChunkStream::from_slice(&data);
        let err = stream.read_length_prefixed_block(Endian::Big).unwrap_err();
        assert!(err.is_io());
        assert_eq!(stream.position(), 0);
    }

    #[test]
    fn test_writer_round_trip() {
        let mut writer = ChunkStream::in_memory();
        writer.write_u16(0x0110, Endian::Little).unwrap();
        writer.write_u32(0, Endian::Big).unwrap();
        writer.write_text(&"ab".into(), 4).unwrap();
        writer.write_length_prefixed_block(b"xyz", Endian::Little).unwrap();
        writer.patch_u32_at(2, 0xCAFE_BABE, Endian::Big).unwrap();
        assert_eq!(writer.position(), 17);
        let bytes = writer.into_bytes();

        let mut reader = ChunkStream::from_slice(&bytes);
        assert_eq!(reader.read_u16(Endian::Little).unwrap(), 0x0110);
        assert_eq!(reader.read_u32(Endian::Big).unwrap(), 0xCAFE_BABE);
        assert_eq!(reader.read_text(4).unwrap().as_bytes(), b"ab\0\0");
        assert_eq!(reader.read_length_prefixed_block(Endian::Little).unwrap(), b"xyz");
    }

    #[test]
    fn test_oversized_text_rejected() {
        let mut writer = ChunkStream::in_memory();
        assert!(writer.write_text(&"too long".into(), 4).is_err());
        assert!(writer.write_ascii("M\u{fc}ller", 8).is_err());
        assert_eq!(writer.position(), 0);
    }

    #[test]
    fn test_text_field_keeps_every_byte() {
        let field = b"M\xFCller\0\x13\x37";
        let mut stream = ChunkStream::from_slice(field);
        let text = stream.read_text(field.len()).unwrap();
        assert_eq!(text.text(), "M\u{fc}ller");

        let mut writer = ChunkStream::in_memory();
        writer.write_text(&text, field.len()).unwrap();
        assert_eq!(writer.into_bytes(), field);
    }

    /// Cursor that counts how often it is asked for its end
    struct EndCounting {
        inner: Cursor<Vec<u8>>,
        end_seeks: usize,
    }

    impl Read for EndCounting {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            self.inner.read(buf)
        }
    }

    impl Seek for EndCounting {
        fn seek(&mut self, pos: SeekFrom) -> std::io::Result<u64> {
            if matches!(pos, SeekFrom::End(_)) {
                self.end_seeks += 1;
            }
            self.inner.seek(pos)
        }
    }

    #[test]
    fn test_length_cached_for_wrapped_stream() {
        let source = EndCounting {
            inner: Cursor::new((0u8..64).collect()),
            end_seeks: 0,
        };
        let mut stream = ChunkStream::new(source).unwrap();
        for _ in 0..8 {
            stream.read_bytes(4).unwrap();
            stream.skip(2).unwrap();
        }
        assert_eq!(stream.position(), 48);
        assert_eq!(stream.remaining().unwrap(), 16);
        assert!(stream.read_bytes(17).is_err());
        assert_eq!(stream.get_ref().end_seeks, 1);
    }

    #[test]
    fn test_length_tracks_writes() {
        let mut writer = ChunkStream::in_memory();
        writer.write_u32(7, Endian::Little).unwrap();
        writer.write_bytes(b"abcd").unwrap();
        assert_eq!(writer.len().unwrap(), 8);
        writer.patch_u32_at(0, 9, Endian::Little).unwrap();
        assert_eq!(writer.len().unwrap(), 8);
        assert_eq!(writer.remaining().unwrap(), 0);
    }
}
