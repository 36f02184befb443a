//! K-weighting filter (ITU-R BS.1770-4)
//!
//! Stage 1: high shelf (+4 dB above ~1.5 kHz, head acoustics)
//! Stage 2: RLB high-pass (roll-off below ~38 Hz)
//!
//! Coefficients are derived from the operating sample rate; a sample rate
//! change recomputes them and clears the history.

use r128_core::Sample;

use crate::biquad::{BiquadCoeffs, BiquadStage};
use crate::Meter;

/// Two-stage K-weighting cascade for one channel
#[derive(Debug, Clone)]
pub struct KWeightingFilter {
    shelf: BiquadStage,
    highpass: BiquadStage,
    sample_rate: u32,
}

impl KWeightingFilter {
    pub fn new(sample_rate: u32) -> Self {
        let fs = sample_rate as f64;
        Self {
            shelf: BiquadStage::new(BiquadCoeffs::k_weighting_shelf(fs)),
            highpass: BiquadStage::new(BiquadCoeffs::k_weighting_highpass(fs)),
            sample_rate,
        }
    }

    /// Retune for a new sample rate (clears history)
    pub fn set_sample_rate(&mut self, sample_rate: u32) {
        *self = Self::new(sample_rate);
    }

    #[inline]
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    #[inline(always)]
    pub fn process(&mut self, input: Sample) -> Sample {
        self.highpass.process(self.shelf.process(input))
    }

    /// Combined magnitude response at `freq`
    pub fn magnitude_at(&self, freq: f64) -> f64 {
        let fs = self.sample_rate as f64;
        self.shelf.coeffs().magnitude_at(freq, fs) * self.highpass.coeffs().magnitude_at(freq, fs)
    }

    /// Stage access for inspection
    pub fn stages(&self) -> (&BiquadStage, &BiquadStage) {
        (&self.shelf, &self.highpass)
    }
}

impl Meter for KWeightingFilter {
    fn reset(&mut self) {
        self.shelf.reset();
        self.highpass.reset();
    }
}
