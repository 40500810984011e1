//! Codec configuration
//!
//! Limits and policies shared by every decoder. Configurations are plain
//! serde structs so a format adapter can load them from its own settings file.

use serde::{Deserialize, Serialize};

use crate::{CodecError, Result};

/// Default maximum nesting depth for chunk trees and dictionaries
pub const DEFAULT_MAX_DEPTH: usize = 32;

/// Default maximum payload size of a single chunk (256 MiB)
pub const DEFAULT_MAX_CHUNK_LEN: u32 = 256 * 1024 * 1024;

/// Default maximum size of a length-prefixed block (16 MiB)
pub const DEFAULT_MAX_BLOCK_LEN: u32 = 16 * 1024 * 1024;

/// Application ids of the tool family that writes the vendor container
pub const KONTAKT_APPLICATIONS: [u32; 2] = [0x0000_0001, 0x0000_0002];

/// Decoder limits and policies
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CodecConfig {
    /// Maximum nesting depth of groups / sub-dictionaries
    pub max_depth: usize,
    /// Maximum payload length accepted for one chunk
    pub max_chunk_len: u32,
    /// Maximum length accepted for a length-prefixed block
    pub max_block_len: u32,
    /// Fail when fewer items decode than a header declares (otherwise warn)
    pub strict_counts: bool,
    /// Application ids accepted in the authoring-application record
    pub expected_applications: Vec<u32>,
}

impl Default for CodecConfig {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
            max_chunk_len: DEFAULT_MAX_CHUNK_LEN,
            max_block_len: DEFAULT_MAX_BLOCK_LEN,
            strict_counts: true,
            expected_applications: KONTAKT_APPLICATIONS.to_vec(),
        }
    }
}

impl CodecConfig {
    /// Parse a configuration from JSON; missing fields take their defaults.
    pub fn from_json(text: &str) -> Result<Self> {
        let config: CodecConfig = serde_json::from_str(text)
            .map_err(|e| CodecError::Config(format!("Failed to parse codec config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject limits that would make every decode fail.
    pub fn validate(&self) -> Result<()> {
        if self.max_depth == 0 {
            return Err(CodecError::Config("max_depth must be at least 1".into()));
        }
        if self.max_chunk_len == 0 {
            return Err(CodecError::Config("max_chunk_len must be non-zero".into()));
        }
        if self.max_block_len == 0 {
            return Err(CodecError::Config("max_block_len must be non-zero".into()));
        }
        Ok(())
    }

    /// Lenient variant: declared header counts only produce warnings.
    pub fn lenient() -> Self {
        Self {
            strict_counts: false,
            ..Self::default()
        }
    }
}
