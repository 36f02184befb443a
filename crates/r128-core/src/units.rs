//! Level conversions
//!
//! Every conversion takes an explicit floor and never returns NaN or an
//! infinity: zero, negative, NaN and infinite inputs map to the floor.

/// BS.1770 loudness offset in dB (compensates the K-weighting gain at 1 kHz)
pub const LUFS_OFFSET: f64 = -0.691;

/// Mean-square values at or below this are treated as digital silence
pub const POWER_EPSILON: f64 = 1e-20;

/// Default loudness floor (LUFS)
pub const DEFAULT_LOUDNESS_FLOOR: f64 = -70.0;

/// Default level floor (dBFS)
pub const DEFAULT_LEVEL_FLOOR: f64 = -120.0;

/// Mean square of K-weighted samples to LUFS
#[inline]
pub fn mean_square_to_lufs(mean_square: f64, floor: f64) -> f64 {
    if !(mean_square > POWER_EPSILON) || !mean_square.is_finite() {
        return floor;
    }
    (LUFS_OFFSET + 10.0 * mean_square.log10()).max(floor)
}

/// LUFS back to mean square (inverse of `mean_square_to_lufs` above the floor)
#[inline]
pub fn lufs_to_mean_square(lufs: f64) -> f64 {
    10.0_f64.powf((lufs - LUFS_OFFSET) / 10.0)
}

/// Linear amplitude to dBFS
#[inline]
pub fn amplitude_to_db(amplitude: f64, floor: f64) -> f64 {
    let amplitude = amplitude.abs();
    if !(amplitude > 0.0) || !amplitude.is_finite() {
        return floor;
    }
    (20.0 * amplitude.log10()).max(floor)
}

/// Mean-square power to dBFS
#[inline]
pub fn power_to_db(mean_square: f64, floor: f64) -> f64 {
    if !(mean_square > POWER_EPSILON) || !mean_square.is_finite() {
        return floor;
    }
    (10.0 * mean_square.log10()).max(floor)
}

/// dB to linear amplitude
#[inline]
pub fn db_to_amplitude(db: f64) -> f64 {
    10.0_f64.powf(db / 20.0)
}

/// Replace a non-finite value with `fallback`
#[inline]
pub fn finite_or(value: f64, fallback: f64) -> f64 {
    if value.is_finite() { value } else { fallback }
}
