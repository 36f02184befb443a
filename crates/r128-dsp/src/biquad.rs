//! Second-order IIR sections
//!
//! Direct Form I with f64 history. DF-I keeps the input and output
//! history separately, so the state stays bounded by the signal itself
//! over unbounded runtimes.

use r128_core::Sample;
use std::f64::consts::PI;

use crate::Meter;

/// History values below this are flushed to zero (denormal guard)
const DENORMAL_THRESHOLD: f64 = 1e-30;

// ═══════════════════════════════════════════════════════════════════════════════
// K-WEIGHTING DESIGN CONSTANTS (ITU-R BS.1770-4)
// ═══════════════════════════════════════════════════════════════════════════════

/// Pre-filter shelf gain (dB)
const SHELF_GAIN_DB: f64 = 3.999843853973347;
/// Pre-filter shelf centre frequency (Hz)
const SHELF_FREQ: f64 = 1681.974450955533;
/// Pre-filter shelf Q
const SHELF_Q: f64 = 0.7071752369554196;
/// Exponent relating the shelf's band gain to its high-frequency gain
const SHELF_VB_EXPONENT: f64 = 0.4996667741545416;
/// RLB high-pass cutoff (Hz)
const HIGHPASS_FREQ: f64 = 38.13547087602444;
/// RLB high-pass Q
const HIGHPASS_Q: f64 = 0.5003270373238773;

/// Biquad coefficients, normalised so that a0 = 1
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct BiquadCoeffs {
    pub b0: f64,
    pub b1: f64,
    pub b2: f64,
    pub a1: f64,
    pub a2: f64,
}

impl BiquadCoeffs {
    /// Stage 1 of K-weighting: high shelf, about +4 dB above 1.5 kHz
    ///
    /// Bilinear-transform design; at 48 kHz this reproduces the
    /// BS.1770-4 table coefficients.
    pub fn k_weighting_shelf(sample_rate: f64) -> Self {
        let k = (PI * SHELF_FREQ / sample_rate).tan();
        let vh = 10.0_f64.powf(SHELF_GAIN_DB / 20.0);
        let vb = vh.powf(SHELF_VB_EXPONENT);
        let a0 = 1.0 + k / SHELF_Q + k * k;

        Self {
            b0: (vh + vb * k / SHELF_Q + k * k) / a0,
            b1: 2.0 * (k * k - vh) / a0,
            b2: (vh - vb * k / SHELF_Q + k * k) / a0,
            a1: 2.0 * (k * k - 1.0) / a0,
            a2: (1.0 - k / SHELF_Q + k * k) / a0,
        }
    }

    /// Stage 2 of K-weighting: RLB high-pass, rolls off below ~38 Hz
    pub fn k_weighting_highpass(sample_rate: f64) -> Self {
        let k = (PI * HIGHPASS_FREQ / sample_rate).tan();
        let a0 = 1.0 + k / HIGHPASS_Q + k * k;

        Self {
            b0: 1.0,
            b1: -2.0,
            b2: 1.0,
            a1: 2.0 * (k * k - 1.0) / a0,
            a2: (1.0 - k / HIGHPASS_Q + k * k) / a0,
        }
    }

    /// Bypass (unity gain, no filtering)
    pub fn bypass() -> Self {
        Self {
            b0: 1.0,
            b1: 0.0,
            b2: 0.0,
            a1: 0.0,
            a2: 0.0,
        }
    }

    /// Magnitude response |H(e^jw)| at `freq`
    pub fn magnitude_at(&self, freq: f64, sample_rate: f64) -> f64 {
        let omega = 2.0 * PI * freq / sample_rate;
        let (cos_w, sin_w) = (omega.cos(), omega.sin());
        let (cos_2w, sin_2w) = ((2.0 * omega).cos(), (2.0 * omega).sin());

        let num_re = self.b0 + self.b1 * cos_w + self.b2 * cos_2w;
        let num_im = -self.b1 * sin_w - self.b2 * sin_2w;
        let den_re = 1.0 + self.a1 * cos_w + self.a2 * cos_2w;
        let den_im = -self.a1 * sin_w - self.a2 * sin_2w;

        ((num_re * num_re + num_im * num_im) / (den_re * den_re + den_im * den_im)).sqrt()
    }
}

/// Input/output history of one section
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FilterState {
    pub x1: f64,
    pub x2: f64,
    pub y1: f64,
    pub y2: f64,
}

impl FilterState {
    #[inline]
    pub fn clear(&mut self) {
        *self = Self::default();
    }
}

/// One Direct Form I biquad section with persistent state
#[derive(Debug, Clone)]
pub struct BiquadStage {
    coeffs: BiquadCoeffs,
    state: FilterState,
}

impl BiquadStage {
    pub fn new(coeffs: BiquadCoeffs) -> Self {
        Self {
            coeffs,
            state: FilterState::default(),
        }
    }

    /// Replace coefficients; history is kept
    #[inline]
    pub fn set_coeffs(&mut self, coeffs: BiquadCoeffs) {
        self.coeffs = coeffs;
    }

    #[inline]
    pub fn coeffs(&self) -> &BiquadCoeffs {
        &self.coeffs
    }

    #[inline]
    pub fn state(&self) -> &FilterState {
        &self.state
    }

    #[inline(always)]
    pub fn process(&mut self, input: Sample) -> Sample {
        let c = &self.coeffs;
        let s = &mut self.state;

        let mut output = c.b0 * input + c.b1 * s.x1 + c.b2 * s.x2 - c.a1 * s.y1 - c.a2 * s.y2;
        if !output.is_finite() {
            // Never keep a NaN/inf in the recursion
            s.clear();
            return 0.0;
        }
        if output.abs() < DENORMAL_THRESHOLD {
            output = 0.0;
        }

        s.x2 = s.x1;
        s.x1 = input;
        s.y2 = s.y1;
        s.y1 = output;

        output
    }
}

impl Meter for BiquadStage {
    fn reset(&mut self) {
        self.state.clear();
    }
}
