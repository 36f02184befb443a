//! r128-dsp: measurement stages for the R128 metering pipeline
//!
//! Allocation-free per-sample processors. Every buffer is sized in `new()`.
//!
//! ## Modules
//! - `biquad` - Direct Form I second-order sections
//! - `k_weighting` - BS.1770-4 shelf + high-pass cascade
//! - `power_window` - O(1) sliding mean-square windows
//! - `history` - bounded block history rings
//! - `gating` - absolute/relative gated integrated loudness
//! - `lra` - loudness range (EBU Tech 3342)
//! - `true_peak` - 4x oversampled inter-sample peak detection
//! - `stereo` - sample peaks, RMS, correlation and width
//! - `noise_floor` - low-percentile noise floor estimate

pub mod biquad;
pub mod gating;
pub mod history;
pub mod k_weighting;
pub mod lra;
pub mod noise_floor;
pub mod power_window;
pub mod stereo;
pub mod true_peak;

pub use biquad::{BiquadCoeffs, BiquadStage, FilterState};
pub use gating::{gate_blocks, GateConfig, GatedIntegrator, GatingResult};
pub use history::BlockHistory;
pub use k_weighting::KWeightingFilter;
pub use lra::{percentile_index, LoudnessRangeEstimator, LraConfig};
pub use noise_floor::NoiseFloorEstimator;
pub use power_window::{PowerBlock, RunningSum, SlidingPowerWindow};
pub use stereo::{StereoFieldAnalyzer, StereoSnapshot};
pub use true_peak::TruePeakEstimator;

/// Common interface of all measurement stages
pub trait Meter: Send {
    /// Clear all state back to the freshly constructed condition
    fn reset(&mut self);
}
