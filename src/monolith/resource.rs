//! Resource extraction from a monolith

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, Cursor, Read, Seek};
use std::path::Path;

use log::debug;

use super::{Dictionary, DictionaryResolver, ReferenceKind, ResourceRef};
use crate::config::CodecConfig;
use crate::stream::{ChunkStream, Endian};
use crate::tree::FourCc;
use crate::{CodecError, Result};

const RIFF_TAG: FourCc = FourCc::new(b"RIFF");

/// A monolith with its dictionary resolved and the cursor kept for extraction
pub struct MonolithReader<S> {
    stream: ChunkStream<S>,
    dictionary: Dictionary,
}

impl<S: Read + Seek> MonolithReader<S> {
    /// Resolve the dictionary at the cursor
    pub fn open(stream: ChunkStream<S>, config: &CodecConfig) -> Result<Self> {
        let start = stream.position();
        let mut resolver = DictionaryResolver::new(stream, config);
        let dictionary = resolver.resolve(start)?;
        Ok(Self {
            stream: resolver.into_stream(),
            dictionary,
        })
    }

    /// The resolved dictionary
    pub fn dictionary(&self) -> &Dictionary {
        &self.dictionary
    }

    /// Flattened terminal items
    pub fn resources(&self) -> Vec<ResourceRef> {
        self.dictionary.resources()
    }

    /// Read a resource; its extent comes from its own RIFF header
    pub fn read_resource(&mut self, resource: &ResourceRef) -> Result<Vec<u8>> {
        let offset = resource.offset as u64;
        self.stream.seek(offset)?;
        let tag = self.stream.read_fourcc()?;
        if tag != RIFF_TAG {
            return Err(CodecError::UnsupportedVariant(format!(
                "Resource '{}' at offset {} starts with '{}', its extent is unknown",
                resource.path, offset, tag
            )));
        }
        let len = self.stream.read_u32(Endian::Little)?;
        self.stream.seek(offset)?;
        self.stream.read_bytes(8 + len as usize)
    }

    /// Frame count of a sample resource
    pub fn sample_frame_count(&mut self, resource: &ResourceRef) -> Result<u32> {
        if resource.kind != ReferenceKind::Sample {
            return Err(CodecError::UnsupportedVariant(format!(
                "Resource '{}' is a {:?}, not a sample",
                resource.path, resource.kind
            )));
        }
        let bytes = self.read_resource(resource)?;
        let reader = hound::WavReader::new(Cursor::new(bytes)).map_err(|e| {
            CodecError::MalformedContainer(format!(
                "Sample '{}' is not a readable WAV: {e}",
                resource.path
            ))
        })?;
        Ok(reader.duration())
    }

    /// Frame counts of every sample, keyed by resource path
    pub fn sample_lengths(&mut self) -> Result<HashMap<String, u64>> {
        let samples: Vec<ResourceRef> = self
            .resources()
            .into_iter()
            .filter(|r| r.kind == ReferenceKind::Sample)
            .collect();
        let mut lengths = HashMap::with_capacity(samples.len());
        for sample in samples {
            let frames = self.sample_frame_count(&sample)?;
            debug!("Sample '{}': {} frames", sample.path, frames);
            lengths.insert(sample.path, frames as u64);
        }
        Ok(lengths)
    }
}

impl MonolithReader<BufReader<File>> {
    /// Open a monolith file; the handle lives as long as the reader
    pub fn open_file(path: impl AsRef<Path>, config: &CodecConfig) -> Result<Self> {
        let file = File::open(path.as_ref())?;
        let stream =
            ChunkStream::new(BufReader::new(file))?.with_max_block_len(config.max_block_len);
        Self::open(stream, config)
    }
}

/// Decode only the dictionary of a monolith file; the file is closed before returning
pub fn read_dictionary_file(path: impl AsRef<Path>, config: &CodecConfig) -> Result<Dictionary> {
    Ok(MonolithReader::open_file(path, config)?.dictionary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::monolith::tests::{header, item};

    fn wav_bytes(frames: u32) -> Vec<u8> {
        let spec = hound::WavSpec {
            channels: 2,
            sample_rate: 44100,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut cursor = Cursor::new(Vec::new());
        {
            let mut writer = hound::WavWriter::new(&mut cursor, spec).unwrap();
            for i in 0..frames {
                writer.write_sample(i as i16).unwrap();
                writer.write_sample(-(i as i16)).unwrap();
            }
            writer.finalize().unwrap();
        }
        cursor.into_inner()
    }

    fn monolith_with_sample(frames: u32) -> Vec<u8> {
        let mut data = header(2);
        let directory_len = data.len() + item(2, 0, "a.wav").len() + item(4, 0, "bg").len();
        data.extend_from_slice(&item(2, directory_len as u32, "a.wav"));
        data.extend_from_slice(&item(4, 0, "bg"));
        data.extend_from_slice(&wav_bytes(frames));
        data
    }

    #[test]
    fn test_sample_extraction_and_length() {
        let data = monolith_with_sample(100);
        let mut reader =
            MonolithReader::open(ChunkStream::from_slice(&data), &CodecConfig::default()).unwrap();
        let resources = reader.resources();
        assert_eq!(resources.len(), 2);

        let sample = &resources[0];
        let bytes = reader.read_resource(sample).unwrap();
        assert_eq!(&bytes[..4], b"RIFF");
        assert_eq!(reader.sample_frame_count(sample).unwrap(), 100);
        assert_eq!(reader.sample_lengths().unwrap()["a.wav"], 100);
    }

    #[test]
    fn test_non_sample_length_refused() {
        let data = monolith_with_sample(4);
        let mut reader =
            MonolithReader::open(ChunkStream::from_slice(&data), &CodecConfig::default()).unwrap();
        let wallpaper = reader.resources()[1].clone();
        assert!(reader.sample_frame_count(&wallpaper).is_err());
    }
}
