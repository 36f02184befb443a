//! r128-core: Shared types for the R128 metering pipeline
//!
//! This crate provides the foundational types used across all r128 crates:
//! - `Sample` / `StereoSample` - internal f64 sample representation
//! - `SampleBlock` - borrowed view of one incoming audio block
//! - `MeterConfig` - validated session configuration
//! - `MeterError` - error taxonomy for the control boundary
//! - `units` - LUFS / dBFS conversions with floors

mod block;
mod config;
mod error;
mod sample;
pub mod units;

pub use block::*;
pub use config::*;
pub use error::*;
pub use sample::*;

/// Lowest sample rate a session accepts
pub const MIN_SAMPLE_RATE: u32 = 8_000;

/// Highest sample rate a session accepts
pub const MAX_SAMPLE_RATE: u32 = 384_000;

/// Maximum number of channels per block
pub const MAX_CHANNELS: usize = 8;

/// Check a sample rate against the supported range
#[inline]
pub fn validate_sample_rate(sample_rate: u32) -> MeterResult<u32> {
    if (MIN_SAMPLE_RATE..=MAX_SAMPLE_RATE).contains(&sample_rate) {
        Ok(sample_rate)
    } else {
        Err(MeterError::InvalidSampleRate(sample_rate))
    }
}

/// Check a channel count against the supported range
#[inline]
pub fn validate_channels(channels: usize) -> MeterResult<usize> {
    if (1..=MAX_CHANNELS).contains(&channels) {
        Ok(channels)
    } else {
        Err(MeterError::InvalidChannelCount(channels))
    }
}

/// Convert a duration in milliseconds to a sample count (at least 1)
#[inline]
pub fn ms_to_samples(ms: f64, sample_rate: u32) -> usize {
    ((ms * 0.001 * sample_rate as f64).round() as usize).max(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sample_rate_range() {
        assert!(validate_sample_rate(44_100).is_ok());
        assert!(validate_sample_rate(384_000).is_ok());
        assert!(matches!(
            validate_sample_rate(0),
            Err(MeterError::InvalidSampleRate(0))
        ));
        assert!(validate_sample_rate(768_000).is_err());
    }

    #[test]
    fn test_channel_range() {
        assert!(validate_channels(1).is_ok());
        assert!(validate_channels(8).is_ok());
        assert!(validate_channels(0).is_err());
        assert!(validate_channels(9).is_err());
    }

    #[test]
    fn test_ms_to_samples() {
        assert_eq!(ms_to_samples(400.0, 48_000), 19_200);
        assert_eq!(ms_to_samples(100.0, 44_100), 4_410);
        assert_eq!(ms_to_samples(0.0, 48_000), 1);
    }
}
