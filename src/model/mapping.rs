//! Zone range computation
//!
//! Source formats that store only root keys, or store tuning that spills
//! over whole semitones, are normalized here before a writer sees them.

use super::zone::{SampleZone, MAX_MIDI_VALUE};
use super::Group;
use crate::{CodecError, Result};

/// Distinct root keys in ascending order
fn distinct_roots(zones: &[SampleZone]) -> Vec<u8> {
    let mut roots: Vec<u8> = zones.iter().map(|z| z.key_root).collect();
    roots.sort_unstable();
    roots.dedup();
    roots
}

/// Lower bound of every root's range: midpoint to the previous root, at least one key above it
fn lower_bounds(roots: &[u8]) -> Vec<u8> {
    roots
        .iter()
        .enumerate()
        .map(|(i, &root)| match i {
            0 => 0,
            _ => {
                let prev = roots[i - 1] as u16;
                let mid = (prev + root as u16) / 2;
                mid.max(prev + 1) as u8
            }
        })
        .collect()
}

/// Assign key ranges from root keys alone
///
/// The keyboard is split at the midpoints between neighbouring roots; the
/// lowest range starts at 0 and the highest ends at 127, so the ranges cover
/// every key exactly once. Zones with the same root get the same range.
pub fn partition_key_ranges(zones: &mut [SampleZone]) {
    let roots = distinct_roots(zones);
    let lows = lower_bounds(&roots);

    for zone in zones.iter_mut() {
        let Ok(i) = roots.binary_search(&zone.key_root) else {
            continue;
        };
        zone.key_low = lows[i];
        zone.key_high = match lows.get(i + 1) {
            Some(next) => next - 1,
            None => MAX_MIDI_VALUE,
        };
        zone.key_crossfade.low = 0;
        zone.key_crossfade.high = 0;
    }
}

/// Overlap neighbouring key ranges for crossfading
///
/// Run after [`partition_key_ranges`]. Between two neighbouring roots the
/// applied width is `min(requested, gap)`; the upper zone extends down by
/// half of it (rounded down) and the lower zone extends up by the rest. Both
/// zones record the applied width as their fade at that edge.
pub fn apply_key_crossfade(zones: &mut [SampleZone], requested: u8) {
    let roots = distinct_roots(zones);
    if roots.len() < 2 || requested == 0 {
        return;
    }

    // (extend_down, fade_low, extend_up, fade_high) per root
    let mut edges = vec![(0u8, 0u8, 0u8, 0u8); roots.len()];
    for i in 1..roots.len() {
        let gap = roots[i] - roots[i - 1];
        let width = requested.min(gap);
        let down = width / 2;
        edges[i].0 = down;
        edges[i].1 = width;
        edges[i - 1].2 = width - down;
        edges[i - 1].3 = width;
    }

    for zone in zones.iter_mut() {
        let Ok(i) = roots.binary_search(&zone.key_root) else {
            continue;
        };
        let (down, fade_low, up, fade_high) = edges[i];
        zone.key_low = zone.key_low.saturating_sub(down);
        zone.key_high = zone.key_high.saturating_add(up).min(MAX_MIDI_VALUE);
        zone.key_crossfade.low = fade_low;
        zone.key_crossfade.high = fade_high;
    }
}

/// Move whole semitones of fine tuning into the root key
///
/// `root -= tuning / 100` (truncating), `tuning %= 100`. Applying it again
/// changes nothing because the remaining tuning is below 100 cents.
pub fn reconcile_root_and_tuning(zone: &mut SampleZone) {
    let semitones = zone.tuning_cents / 100;
    if semitones == 0 {
        return;
    }
    zone.key_root = (zone.key_root as i32 - semitones).clamp(0, MAX_MIDI_VALUE as i32) as u8;
    zone.tuning_cents %= 100;
    zone.key_low = zone.key_low.min(zone.key_root);
    zone.key_high = zone.key_high.max(zone.key_root);
}

/// Center a group whose zones all sit at the same hard-left or hard-right pan
///
/// That pattern is a stereo pair split into mono zones, not a placement.
/// Returns true if the group was changed.
pub fn correct_mono_panning(group: &mut Group) -> bool {
    let Some(first) = group.zones.first().map(|z| z.panning) else {
        return false;
    };
    let hard = first == -1.0 || first == 1.0;
    if !hard || group.zones.iter().any(|z| z.panning != first) {
        return false;
    }
    for zone in &mut group.zones {
        zone.panning = 0.0;
    }
    true
}

/// Spread zones over the velocity range as equal layers
///
/// Layer `i` of `N` starts at `i * (127 / N)` and is extended upwards by
/// `min(band, crossfade)`; the top layer ends at 127 without extension.
pub fn layer_by_velocity(zones: &mut [SampleZone], crossfade: u8) -> Result<()> {
    let count = zones.len();
    if count == 0 {
        return Ok(());
    }
    if count > MAX_MIDI_VALUE as usize {
        return Err(CodecError::InvalidZone(format!(
            "Cannot split the velocity range into {count} layers"
        )));
    }

    let band = MAX_MIDI_VALUE / count as u8;
    let extension = band.min(crossfade);
    for (i, zone) in zones.iter_mut().enumerate() {
        let i = i as u8;
        let top = i as usize == count - 1;
        let ext = if top { 0 } else { extension };
        zone.velocity_low = i * band;
        zone.velocity_high = if top {
            MAX_MIDI_VALUE
        } else {
            (i + 1) * band - 1 + ext
        };
        zone.velocity_crossfade.low = 0;
        zone.velocity_crossfade.high = ext;
    }
    Ok(())
}
