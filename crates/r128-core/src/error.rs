//! Error types for the metering pipeline
//!
//! Variants raised on the processing thread carry only plain integers so
//! that constructing them never allocates.

use thiserror::Error;

/// Metering error type
#[derive(Error, Debug)]
pub enum MeterError {
    #[error("Invalid sample rate: {0} Hz (must be between 8000 and 384000)")]
    InvalidSampleRate(u32),

    #[error("Invalid channel count: {0} (must be 1-8)")]
    InvalidChannelCount(usize),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// Interleaved buffer length is not a whole number of frames
    #[error("Incomplete frame: {len} samples do not divide into {channels} channels")]
    IncompleteFrame { len: usize, channels: usize },

    /// Planar channels of different lengths
    #[error("Ragged block: channel {channel} has {got} frames, expected {expected}")]
    RaggedBlock {
        channel: usize,
        expected: usize,
        got: usize,
    },

    #[error("Sample rate mismatch: session runs at {expected} Hz, block is {got} Hz")]
    SampleRateMismatch { expected: u32, got: u32 },

    #[error("Channel mismatch: session has {expected} channels, block has {got}")]
    ChannelMismatch { expected: usize, got: usize },

    /// Operation requires the session to be torn down or reset first
    #[error("Metering session is active; stop it before reconfiguring")]
    SessionActive,

    #[error("Metering session is not running")]
    NotMeasuring,

    #[error("Control queue is full")]
    ControlQueueFull,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Config error: {0}")]
    Config(#[from] serde_json::Error),
}

/// Result type alias
pub type MeterResult<T> = Result<T, MeterError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages() {
        let err = MeterError::SampleRateMismatch {
            expected: 48_000,
            got: 44_100,
        };
        assert_eq!(
            err.to_string(),
            "Sample rate mismatch: session runs at 48000 Hz, block is 44100 Hz"
        );

        let err = MeterError::InvalidChannelCount(12);
        assert!(err.to_string().contains("12"));
    }

    #[test]
    fn test_from_serde() {
        let parse: Result<serde_json::Value, _> = serde_json::from_str("{ nope");
        let err: MeterError = parse.unwrap_err().into();
        assert!(matches!(err, MeterError::Config(_)));
    }
}
