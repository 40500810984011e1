//! Multisample sampler container codecs
//!
//! Lossless codecs for the binary containers used by multisample instrument
//! presets, plus the canonical instrument model that every format reader
//! fills and every writer consumes.
//!
//! # Features
//! - Cursor over any `Read + Seek` / `Write + Seek` stream with either byte order
//! - Generic tag trees (RIFF, IFF, vendor dialect) that keep unknown chunks
//! - Magic-number sniffing of every supported container variant
//! - Vendor container family: three legacy flat-header layouts and the
//!   modern chunk dictionary with encryption detection
//! - Monolith resource dictionaries with pointer-cycle protection
//! - Instrument model with key/velocity mapping and tuning fixups
//!
//! # Crate feature flags
//! - `monolith` (default): monolith dictionary and resource extraction (`monolith`)
//!
//! # Quick start
//! ## Identify and decode a vendor container
//! ```no_run
//! use multisample::{container, CodecConfig, FormatSniffer};
//! let data = std::fs::read("preset.nki").unwrap();
//! let sniffed = FormatSniffer::sniff_bytes(&data).unwrap();
//! println!("{} ({})", sniffed.variant, sniffed.endian);
//! let decoded = container::decode(&data, &CodecConfig::default()).unwrap();
//! let header = decoded.header();
//! println!("{} zones declared", header.declared_counts.zones);
//! ```
//!
//! ## Map zones from root keys
//! ```
//! use multisample::model::{partition_key_ranges, SampleZone};
//! let mut zones: Vec<SampleZone> = [36, 48, 60, 72]
//!     .iter()
//!     .map(|&root| SampleZone::new(format!("z{root}"), format!("{root}.wav"), root))
//!     .collect();
//! partition_key_ranges(&mut zones);
//! assert_eq!((zones[2].key_low, zones[2].key_high), (54, 65));
//! ```

#![warn(missing_docs)]

pub mod config; // Decoder limits and policies
pub mod container; // Vendor container family
mod error;
pub mod model; // Canonical instrument model
#[cfg(feature = "monolith")]
pub mod monolith; // Monolith resource dictionaries
pub mod resources; // Template loading
pub mod sniff; // Format detection
pub mod stream; // Byte cursor
pub mod tree; // Tag trees

pub use config::CodecConfig;
pub use container::{ModernContainer, VendorContainer};
pub use error::{CodecError, Result};
pub use model::{Group, MultisampleSource, SampleZone};
#[cfg(feature = "monolith")]
pub use monolith::{Dictionary, DictionaryResolver, MonolithReader};
pub use resources::{TemplateSource, TemplateStore};
pub use sniff::{CodecVariant, FormatSniffer, Sniffed};
pub use stream::{ChunkStream, Endian, RawText};
pub use tree::{Chunk, Dialect, FourCc};
