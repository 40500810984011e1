//! Unit conversions shared by format adapters

/// Level treated as silence by [`linear_to_db`]
pub const MIN_DB: f64 = -144.0;

const NOTE_NAMES: [&str; 12] = [
    "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
];

/// Decibels to a linear gain factor
pub fn db_to_linear(db: f64) -> f64 {
    10f64.powf(db / 20.0)
}

/// Linear gain factor to decibels, floored at [`MIN_DB`]
pub fn linear_to_db(linear: f64) -> f64 {
    if linear <= 0.0 {
        return MIN_DB;
    }
    (20.0 * linear.log10()).max(MIN_DB)
}

/// Frequency ratio of a pitch offset in cents
pub fn cents_to_ratio(cents: f64) -> f64 {
    2f64.powf(cents / 1200.0)
}

/// Map `[0, 1]` exponentially onto `[min, max]` (both positive)
fn exp_scale(value: f64, min: f64, max: f64) -> f64 {
    min * (max / min).powf(value.clamp(0.0, 1.0))
}

/// Inverse of [`exp_scale`]
fn exp_unscale(actual: f64, min: f64, max: f64) -> f64 {
    ((actual.clamp(min, max) / min).ln() / (max / min).ln()).clamp(0.0, 1.0)
}

/// Normalized envelope time to seconds on an exponential curve
pub fn denormalize_time(value: f64, min_seconds: f64, max_seconds: f64) -> f64 {
    exp_scale(value, min_seconds, max_seconds)
}

/// Seconds to a normalized envelope time
pub fn normalize_time(seconds: f64, min_seconds: f64, max_seconds: f64) -> f64 {
    exp_unscale(seconds, min_seconds, max_seconds)
}

/// Normalized cutoff to Hertz on an exponential curve
pub fn normalized_to_hz(value: f64, min_hz: f64, max_hz: f64) -> f64 {
    exp_scale(value, min_hz, max_hz)
}

/// Hertz to a normalized cutoff
pub fn hz_to_normalized(hz: f64, min_hz: f64, max_hz: f64) -> f64 {
    exp_unscale(hz, min_hz, max_hz)
}

/// Note name with octave, MIDI 60 = "C4"
pub fn note_name(note: u8) -> String {
    let octave = note as i32 / 12 - 1;
    format!("{}{}", NOTE_NAMES[(note % 12) as usize], octave)
}
