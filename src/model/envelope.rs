//! Envelopes, modulators and filters

use serde::{Deserialize, Serialize};

/// DAHDSR envelope; times in seconds, sustain level in `[0, 1]`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    /// Delay before the attack starts
    pub delay: f64,
    /// Attack time
    pub attack: f64,
    /// Hold time at full level
    pub hold: f64,
    /// Decay time to the sustain level
    pub decay: f64,
    /// Sustain level
    pub sustain: f64,
    /// Release time
    pub release: f64,
}

impl Default for Envelope {
    fn default() -> Self {
        Self {
            delay: 0.0,
            attack: 0.0,
            hold: 0.0,
            decay: 0.0,
            sustain: 1.0,
            release: 0.0,
        }
    }
}

impl Envelope {
    /// Clamp times to be non-negative and the sustain level to `[0, 1]`
    pub fn clamped(self) -> Self {
        Self {
            delay: self.delay.max(0.0),
            attack: self.attack.max(0.0),
            hold: self.hold.max(0.0),
            decay: self.decay.max(0.0),
            sustain: self.sustain.clamp(0.0, 1.0),
            release: self.release.max(0.0),
        }
    }
}

/// Where a modulator takes its signal from
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum ModulatorSource {
    /// Constant offset
    Fixed,
    /// Envelope generator
    Envelope(Envelope),
}

/// Depth scalar paired with a source
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Modulator {
    /// Depth, `[-1, 1]` or `[0, 1]` depending on the target
    pub depth: f64,
    /// Signal source
    pub source: ModulatorSource,
}

impl Default for Modulator {
    fn default() -> Self {
        Self {
            depth: 0.0,
            source: ModulatorSource::Fixed,
        }
    }
}

impl Modulator {
    /// Envelope modulator with the given depth
    pub fn envelope(depth: f64, envelope: Envelope) -> Self {
        Self {
            depth,
            source: ModulatorSource::Envelope(envelope),
        }
    }

    /// True when the modulator has no effect
    pub fn is_inactive(&self) -> bool {
        self.depth == 0.0
    }
}

/// Filter response
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FilterType {
    /// Low pass
    LowPass,
    /// High pass
    HighPass,
    /// Band pass
    BandPass,
    /// Band reject (notch)
    BandReject,
}

/// Filter settings
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Filter {
    /// Response type
    pub filter_type: FilterType,
    /// Number of poles (slope / 6 dB per octave)
    pub poles: u8,
    /// Cutoff frequency
    pub cutoff_hz: f64,
    /// Resonance in `[0, 1]`
    pub resonance: f64,
    /// Modulation of the cutoff
    pub cutoff_modulator: Modulator,
}

impl Filter {
    /// Filter without cutoff modulation
    pub fn new(filter_type: FilterType, poles: u8, cutoff_hz: f64, resonance: f64) -> Self {
        Self {
            filter_type,
            poles,
            cutoff_hz,
            resonance: resonance.clamp(0.0, 1.0),
            cutoff_modulator: Modulator::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_envelope_clamping() {
        let env = Envelope {
            attack: -1.0,
            sustain: 1.5,
            ..Envelope::default()
        }
        .clamped();
        assert_eq!(env.attack, 0.0);
        assert_eq!(env.sustain, 1.0);
    }

    #[test]
    fn test_filter_resonance_clamped() {
        let filter = Filter::new(FilterType::LowPass, 4, 1200.0, 3.0);
        assert_eq!(filter.resonance, 1.0);
        assert!(filter.cutoff_modulator.is_inactive());
    }
}
