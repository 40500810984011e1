//! Error types for container decoding, encoding and model validation

/// Error type for codec and model operations
///
/// Codec functions never recover on their own: every structural problem is
/// returned to the caller, which decides whether to skip the file or abort.
#[derive(thiserror::Error, Debug)]
pub enum CodecError {
    /// IO error from the underlying stream or filesystem
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A read ran past the end of the input
    #[error("Unexpected end of input at position {position} (needed {needed} more bytes)")]
    UnexpectedEof {
        /// Absolute position where the failed read started
        position: u64,
        /// Number of bytes the read required
        needed: usize,
    },

    /// Magic bytes or version not in the set this codec understands
    #[error("Unrecognized format ({context}): magic {}", hex(.magic))]
    UnrecognizedFormat {
        /// Raw bytes that failed to match
        magic: Vec<u8>,
        /// Where the mismatch was detected
        context: String,
    },

    /// Declared length or count disagrees with the actual content
    #[error("Malformed container: {0}")]
    MalformedContainer(String),

    /// Structurally valid, but uses a feature this codec does not implement
    #[error("Unsupported variant: {0}")]
    UnsupportedVariant(String),

    /// Authorization markers present, the payload is not decoded
    #[error("Encrypted content (protection ids: {})", .protection_ids.join(", "))]
    EncryptedContent {
        /// Serial-number bound protection identifiers found in the container
        protection_ids: Vec<String>,
    },

    /// A sample zone violates its range invariants
    #[error("Invalid zone: {0}")]
    InvalidZone(String),

    /// Invalid codec configuration
    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl CodecError {
    /// Build an [`CodecError::UnrecognizedFormat`] from raw bytes.
    pub fn unrecognized(magic: &[u8], context: impl Into<String>) -> Self {
        CodecError::UnrecognizedFormat {
            magic: magic.to_vec(),
            context: context.into(),
        }
    }

    /// True for failures of the underlying stream, including truncated input.
    pub fn is_io(&self) -> bool {
        matches!(self, CodecError::Io(_) | CodecError::UnexpectedEof { .. })
    }

    /// True when the input ended early or a declared size did not match.
    pub fn is_truncation(&self) -> bool {
        matches!(
            self,
            CodecError::UnexpectedEof { .. } | CodecError::MalformedContainer(_)
        )
    }
}

fn hex(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|b| format!("{b:02X}"))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Result type for codec operations
pub type Result<T> = std::result::Result<T, CodecError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unrecognized_format_shows_magic() {
        let err = CodecError::unrecognized(&[0xDE, 0xAD, 0x01], "sniffer");
        let text = err.to_string();
        assert!(text.contains("DE AD 01"), "{text}");
        assert!(text.contains("sniffer"));
    }

    #[test]
    fn test_truncation_classification() {
        let eof = CodecError::UnexpectedEof {
            position: 10,
            needed: 4,
        };
        assert!(eof.is_io());
        assert!(eof.is_truncation());
        assert!(!CodecError::UnsupportedVariant("x".into()).is_truncation());
    }
}
