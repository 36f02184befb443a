//! Metering session configuration
//!
//! All sizes derived from the config are computed once at session start;
//! the processing thread only ever sees a validated `MeterConfig`.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::units::{DEFAULT_LEVEL_FLOOR, DEFAULT_LOUDNESS_FLOOR};
use crate::{ms_to_samples, validate_channels, validate_sample_rate, MeterError, MeterResult};

/// BS.1770 weight for surround channels (+1.5 dB)
pub const SURROUND_WEIGHT: f64 = 1.41;

/// Inter-sample peak estimation method
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TruePeakMode {
    /// 4x polyphase FIR interpolation
    #[default]
    Polyphase,
    /// Linear interpolation at quarter-sample offsets (lower fidelity)
    Linear,
}

/// Metering session configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MeterConfig {
    /// Stream sample rate (Hz)
    pub sample_rate: u32,
    /// Channel count of incoming blocks
    pub channels: usize,
    /// Per-channel loudness weights (empty = BS.1770 defaults for the channel count)
    pub channel_weights: Vec<f64>,

    /// Momentary / gating block length (ms)
    pub momentary_window_ms: f64,
    /// Short-term window length (ms)
    pub short_term_window_ms: f64,
    /// Hop between successive gating and short-term blocks (ms)
    pub block_hop_ms: f64,

    /// Absolute gate (LUFS)
    pub absolute_gate_lufs: f64,
    /// Relative gate for integrated loudness (LU)
    pub relative_gate_lu: f64,
    /// Relative gate for loudness range (LU)
    pub lra_relative_gate_lu: f64,
    /// Lower LRA percentile (0-1)
    pub lra_low_percentile: f64,
    /// Upper LRA percentile (0-1)
    pub lra_high_percentile: f64,
    /// Retained gating / short-term history (seconds)
    pub history_secs: f64,

    /// True peak estimator
    pub true_peak_mode: TruePeakMode,

    /// RMS window (ms)
    pub rms_window_ms: f64,
    /// Correlation / width analysis window (ms)
    pub correlation_window_ms: f64,
    /// Upper bound for reported stereo width (%)
    pub width_ceiling_pct: f64,

    /// Noise floor chunk length (ms)
    pub noise_floor_window_ms: f64,
    /// Noise floor history (seconds)
    pub noise_floor_history_secs: f64,
    /// Noise floor percentile (0-1)
    pub noise_floor_percentile: f64,

    /// Publish one report every N blocks
    pub report_interval_blocks: u32,
    /// Minimum reported loudness (LUFS)
    pub loudness_floor_lufs: f64,
    /// Minimum reported level (dBFS)
    pub level_floor_db: f64,
    /// Reference level for headroom (dBFS / dBTP)
    pub headroom_reference_db: f64,
    /// Pending control requests the consumer may queue
    pub control_queue_capacity: usize,
}

impl Default for MeterConfig {
    fn default() -> Self {
        Self {
            sample_rate: 48_000,
            channels: 2,
            channel_weights: Vec::new(),
            momentary_window_ms: 400.0,
            short_term_window_ms: 3000.0,
            block_hop_ms: 100.0,
            absolute_gate_lufs: -70.0,
            relative_gate_lu: -10.0,
            lra_relative_gate_lu: -20.0,
            lra_low_percentile: 0.10,
            lra_high_percentile: 0.95,
            history_secs: 3600.0,
            true_peak_mode: TruePeakMode::Polyphase,
            rms_window_ms: 300.0,
            correlation_window_ms: 300.0,
            width_ceiling_pct: 200.0,
            noise_floor_window_ms: 10.0,
            noise_floor_history_secs: 10.0,
            noise_floor_percentile: 0.10,
            report_interval_blocks: 4,
            loudness_floor_lufs: DEFAULT_LOUDNESS_FLOOR,
            level_floor_db: DEFAULT_LEVEL_FLOOR,
            headroom_reference_db: 0.0,
            control_queue_capacity: 64,
        }
    }
}

impl MeterConfig {
    /// Default config for a given stream format
    pub fn new(sample_rate: u32, channels: usize) -> Self {
        Self {
            sample_rate,
            channels,
            ..Self::default()
        }
    }

    /// Parse from JSON; missing fields take their defaults
    pub fn from_json_str(json: &str) -> MeterResult<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a JSON file
    pub fn from_json_file(path: impl AsRef<Path>) -> MeterResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        let config = Self::from_json_str(&text)?;
        log::info!("Loaded meter config from {}", path.display());
        Ok(config)
    }

    /// Reject configurations the engine cannot run without degrading
    pub fn validate(&self) -> MeterResult<()> {
        validate_sample_rate(self.sample_rate)?;
        validate_channels(self.channels)?;

        if !self.channel_weights.is_empty() {
            if self.channel_weights.len() != self.channels {
                return Err(invalid(format!(
                    "channel_weights has {} entries for {} channels",
                    self.channel_weights.len(),
                    self.channels
                )));
            }
            if self
                .channel_weights
                .iter()
                .any(|w| !w.is_finite() || *w < 0.0)
            {
                return Err(invalid("channel_weights must be finite and >= 0"));
            }
        }

        for (name, value) in [
            ("momentary_window_ms", self.momentary_window_ms),
            ("short_term_window_ms", self.short_term_window_ms),
            ("block_hop_ms", self.block_hop_ms),
            ("history_secs", self.history_secs),
            ("rms_window_ms", self.rms_window_ms),
            ("correlation_window_ms", self.correlation_window_ms),
            ("width_ceiling_pct", self.width_ceiling_pct),
            ("noise_floor_window_ms", self.noise_floor_window_ms),
            ("noise_floor_history_secs", self.noise_floor_history_secs),
        ] {
            if !(value.is_finite() && value > 0.0) {
                return Err(invalid(format!("{name} must be a positive number")));
            }
        }

        if self.block_hop_ms > self.momentary_window_ms
            || self.block_hop_ms > self.short_term_window_ms
        {
            return Err(invalid("block_hop_ms must not exceed the window lengths"));
        }

        for (name, value) in [
            ("absolute_gate_lufs", self.absolute_gate_lufs),
            ("relative_gate_lu", self.relative_gate_lu),
            ("lra_relative_gate_lu", self.lra_relative_gate_lu),
            ("loudness_floor_lufs", self.loudness_floor_lufs),
            ("level_floor_db", self.level_floor_db),
        ] {
            if !(value.is_finite() && value <= 0.0) {
                return Err(invalid(format!("{name} must be finite and <= 0")));
            }
        }

        if !self.headroom_reference_db.is_finite() {
            return Err(invalid("headroom_reference_db must be finite"));
        }

        if !(0.0..1.0).contains(&self.lra_low_percentile)
            || !(0.0..=1.0).contains(&self.lra_high_percentile)
            || self.lra_low_percentile >= self.lra_high_percentile
        {
            return Err(invalid("LRA percentiles must satisfy 0 <= low < high <= 1"));
        }

        if !(0.0..=1.0).contains(&self.noise_floor_percentile) {
            return Err(invalid("noise_floor_percentile must be within 0-1"));
        }

        if self.report_interval_blocks == 0 {
            return Err(invalid("report_interval_blocks must be at least 1"));
        }

        if self.control_queue_capacity == 0 {
            return Err(invalid("control_queue_capacity must be at least 1"));
        }

        Ok(())
    }

    /// Per-channel weights, filling in BS.1770 defaults when none are given
    ///
    /// Five- and six-channel streams are taken as L R C Ls Rs and
    /// L R C LFE Ls Rs; the LFE channel is excluded from loudness.
    pub fn resolved_channel_weights(&self) -> Vec<f64> {
        if !self.channel_weights.is_empty() {
            return self.channel_weights.clone();
        }

        match self.channels {
            5 => vec![1.0, 1.0, 1.0, SURROUND_WEIGHT, SURROUND_WEIGHT],
            6 => vec![1.0, 1.0, 1.0, 0.0, SURROUND_WEIGHT, SURROUND_WEIGHT],
            n => vec![1.0; n],
        }
    }

    /// Samples per momentary / gating block
    pub fn momentary_samples(&self) -> usize {
        ms_to_samples(self.momentary_window_ms, self.sample_rate)
    }

    /// Samples per short-term window
    pub fn short_term_samples(&self) -> usize {
        ms_to_samples(self.short_term_window_ms, self.sample_rate)
    }

    /// Samples between successive blocks
    pub fn hop_samples(&self) -> usize {
        ms_to_samples(self.block_hop_ms, self.sample_rate)
    }

    /// Number of blocks retained for gating and LRA
    pub fn history_capacity(&self) -> usize {
        ((self.history_secs * 1000.0 / self.block_hop_ms).ceil() as usize).max(1)
    }

    /// Number of noise floor chunks retained
    pub fn noise_floor_capacity(&self) -> usize {
        ((self.noise_floor_history_secs * 1000.0 / self.noise_floor_window_ms).ceil() as usize)
            .max(1)
    }
}

fn invalid(message: impl Into<String>) -> MeterError {
    MeterError::InvalidParameter(message.into())
}
