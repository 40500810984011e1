//! Sample zones and loops

use serde::{Deserialize, Serialize};

use super::envelope::{Envelope, Filter, Modulator};
use crate::{CodecError, Result};

/// Highest MIDI key / velocity value
pub const MAX_MIDI_VALUE: u8 = 127;

/// Fade widths at the lower and upper edge of a range
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Crossfade {
    /// Fade-in width at the low edge
    pub low: u8,
    /// Fade-out width at the high edge
    pub high: u8,
}

/// Loop playback direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LoopType {
    /// Start to end, repeat
    Forward,
    /// Ping-pong
    Alternating,
    /// End to start, repeat
    Backward,
}

/// Loop points in sample frames
///
/// `end <= 0` is relative to the end of the sample and stays unresolved until
/// the sample length is known.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Loop {
    /// Direction
    pub loop_type: LoopType,
    /// First frame of the loop
    pub start: i64,
    /// Frame after the loop, or an offset from the sample end when `<= 0`
    pub end: i64,
    /// Crossfade length in frames
    pub crossfade_samples: u32,
}

impl Loop {
    /// Forward loop without crossfade
    pub fn forward(start: i64, end: i64) -> Self {
        Self {
            loop_type: LoopType::Forward,
            start,
            end,
            crossfade_samples: 0,
        }
    }

    /// True once `end` is an absolute frame position
    pub fn is_resolved(&self) -> bool {
        self.end > 0
    }

    /// Turn a relative end into an absolute one and check the bounds
    pub fn resolve(&mut self, sample_length: u64) -> Result<()> {
        let length = i64::try_from(sample_length).map_err(|_| {
            CodecError::InvalidZone(format!("Sample length {sample_length} too large"))
        })?;
        if self.end <= 0 {
            self.end += length;
        }
        if self.start < 0 || self.start >= self.end || self.end > length {
            return Err(CodecError::InvalidZone(format!(
                "Loop {}..{} does not fit a sample of {} frames",
                self.start, self.end, length
            )));
        }
        Ok(())
    }
}

/// One sample mapped onto a key and velocity range
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SampleZone {
    /// Zone name
    pub name: String,
    /// Reference to the sample (path or resource name)
    pub sample_ref: String,
    /// Lowest key
    pub key_low: u8,
    /// Key at which the sample plays at its recorded pitch
    pub key_root: u8,
    /// Highest key
    pub key_high: u8,
    /// Lowest velocity
    pub velocity_low: u8,
    /// Highest velocity
    pub velocity_high: u8,
    /// Key crossfade widths
    pub key_crossfade: Crossfade,
    /// Velocity crossfade widths
    pub velocity_crossfade: Crossfade,
    /// First frame played
    pub start: u64,
    /// Frame after the last one played; `None` plays to the sample end
    pub stop: Option<u64>,
    /// Play backwards
    pub reversed: bool,
    /// Fine tuning in cents
    pub tuning_cents: i32,
    /// Gain in dB
    pub gain_db: f64,
    /// Panning, -1 (left) to 1 (right)
    pub panning: f64,
    /// Loops in playback order
    pub loops: Vec<Loop>,
    /// Amplitude envelope
    pub amplitude_envelope: Envelope,
    /// Pitch modulation
    pub pitch_modulator: Modulator,
    /// Zone filter
    pub filter: Option<Filter>,
}

impl SampleZone {
    /// Zone covering the whole keyboard and velocity range
    pub fn new(name: impl Into<String>, sample_ref: impl Into<String>, key_root: u8) -> Self {
        Self {
            name: name.into(),
            sample_ref: sample_ref.into(),
            key_low: 0,
            key_root: key_root.min(MAX_MIDI_VALUE),
            key_high: MAX_MIDI_VALUE,
            velocity_low: 0,
            velocity_high: MAX_MIDI_VALUE,
            key_crossfade: Crossfade::default(),
            velocity_crossfade: Crossfade::default(),
            start: 0,
            stop: None,
            reversed: false,
            tuning_cents: 0,
            gain_db: 0.0,
            panning: 0.0,
            loops: Vec::new(),
            amplitude_envelope: Envelope::default(),
            pitch_modulator: Modulator::default(),
            filter: None,
        }
    }

    /// Set the key range
    pub fn with_key_range(mut self, low: u8, high: u8) -> Self {
        self.key_low = low;
        self.key_high = high;
        self
    }

    /// Set the velocity range
    pub fn with_velocity_range(mut self, low: u8, high: u8) -> Self {
        self.velocity_low = low;
        self.velocity_high = high;
        self
    }

    /// Check range ordering and bounds
    pub fn validate(&self) -> Result<()> {
        let fail = |what: String| Err(CodecError::InvalidZone(format!("{}: {what}", self.name)));

        if self.key_high > MAX_MIDI_VALUE || self.velocity_high > MAX_MIDI_VALUE {
            return fail("range exceeds 127".into());
        }
        if !(self.key_low <= self.key_root && self.key_root <= self.key_high) {
            return fail(format!(
                "root {} outside key range {}..={}",
                self.key_root, self.key_low, self.key_high
            ));
        }
        if self.velocity_low > self.velocity_high {
            return fail(format!(
                "velocity range {}..={} is inverted",
                self.velocity_low, self.velocity_high
            ));
        }
        if !(-1.0..=1.0).contains(&self.panning) {
            return fail(format!("panning {} outside [-1, 1]", self.panning));
        }
        if let Some(stop) = self.stop {
            if stop <= self.start {
                return fail(format!("play range {}..{} is empty", self.start, stop));
            }
        }
        for l in self.loops.iter().filter(|l| l.is_resolved()) {
            if l.start < 0 || l.start >= l.end {
                return fail(format!("loop {}..{} is empty", l.start, l.end));
            }
        }
        Ok(())
    }

    /// Second phase of loading: fill in everything that needs the sample length
    pub fn resolve_sample_length(&mut self, sample_length: u64) -> Result<()> {
        let stop = *self.stop.get_or_insert(sample_length);
        if stop > sample_length || self.start >= stop {
            return Err(CodecError::InvalidZone(format!(
                "{}: play range {}..{} does not fit {} frames",
                self.name, self.start, stop, sample_length
            )));
        }
        for l in &mut self.loops {
            l.resolve(sample_length)?;
        }
        Ok(())
    }

    /// Number of keys covered
    pub fn key_span(&self) -> u8 {
        self.key_high.saturating_sub(self.key_low) + 1
    }
}
