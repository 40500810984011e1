//! Canonical instrument model
//!
//! Every format reader fills a [`MultisampleSource`] and every writer
//! consumes one, so formats only ever convert to and from this model:
//! - [`MultisampleSource`]: name, metadata, global filter, groups
//! - [`Group`]: zones sharing a trigger
//! - [`SampleZone`]: one sample with key/velocity ranges, tuning, loops, envelope
//!
//! Models are built up by one reader and then handed to a writer as a whole.

pub mod envelope;
pub mod mapping;
pub mod units;
pub mod zone;

pub use envelope::{Envelope, Filter, FilterType, Modulator, ModulatorSource};
pub use mapping::{
    apply_key_crossfade, correct_mono_panning, layer_by_velocity, partition_key_ranges,
    reconcile_root_and_tuning,
};
pub use zone::{Crossfade, Loop, LoopType, SampleZone, MAX_MIDI_VALUE};

use std::collections::HashMap;

use log::debug;
use serde::{Deserialize, Serialize};

use crate::{CodecError, Result};

/// Descriptive metadata
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metadata {
    /// Author / sound designer
    pub creator: String,
    /// Sound category
    pub category: String,
    /// Free text description
    pub description: String,
    /// Search keywords
    pub keywords: Vec<String>,
}

/// When the zones of a group sound
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Trigger {
    /// On note-on
    #[default]
    Attack,
    /// On note-off
    Release,
}

/// A set of zones
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Group {
    /// Group name
    pub name: String,
    /// Zones in playback-priority order
    pub zones: Vec<SampleZone>,
    /// Trigger
    pub trigger: Trigger,
}

impl Group {
    /// Empty attack-triggered group
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Order zones by root key; zones with equal roots keep their order
    pub fn sort_by_root(&mut self) {
        self.zones.sort_by_key(|z| z.key_root);
    }
}

/// A complete multisample instrument
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MultisampleSource {
    /// Instrument name
    pub name: String,
    /// Groups in order
    pub groups: Vec<Group>,
    /// Filter applied to every zone without its own
    pub global_filter: Option<Filter>,
    /// Descriptive metadata
    pub metadata: Metadata,
}

impl MultisampleSource {
    /// Empty instrument
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Total number of zones
    pub fn zone_count(&self) -> usize {
        self.groups.iter().map(|g| g.zones.len()).sum()
    }

    /// All zones of all groups
    pub fn zones(&self) -> impl Iterator<Item = &SampleZone> {
        self.groups.iter().flat_map(|g| g.zones.iter())
    }

    /// Fixups every reader applies after loading: tuning spill and mono-pan pairs
    pub fn apply_default_fixups(&mut self) {
        let mut centered = 0;
        for group in &mut self.groups {
            for zone in &mut group.zones {
                reconcile_root_and_tuning(zone);
            }
            if correct_mono_panning(group) {
                centered += 1;
            }
        }
        if centered > 0 {
            debug!("{}: centered {} mono-panned groups", self.name, centered);
        }
    }

    /// Resolve stop positions and relative loop ends once sample lengths are known
    pub fn resolve_sample_lengths(&mut self, lengths: &HashMap<String, u64>) -> Result<()> {
        for zone in self.groups.iter_mut().flat_map(|g| g.zones.iter_mut()) {
            let length = lengths.get(&zone.sample_ref).ok_or_else(|| {
                CodecError::InvalidZone(format!(
                    "{}: no length known for sample '{}'",
                    zone.name, zone.sample_ref
                ))
            })?;
            zone.resolve_sample_length(*length)?;
        }
        Ok(())
    }

    /// Validate every zone
    pub fn validate(&self) -> Result<()> {
        self.zones().try_for_each(SampleZone::validate)
    }
}
