//! True peak estimation (BS.1770-4 Annex 2)
//!
//! 4x oversampling with a 48-tap Kaiser-windowed sinc, split into four
//! 12-tap phases. Every phase is normalised to unity DC gain. The raw input
//! magnitude always takes part in the maximum, so the true peak can never
//! fall below the sample peak.

use r128_core::units::amplitude_to_db;
use r128_core::{Sample, TruePeakMode};

use crate::Meter;

/// Oversampling factor
pub const OVERSAMPLE: usize = 4;
/// Taps per polyphase branch
pub const TAPS_PER_PHASE: usize = 12;
const KAISER_BETA: f64 = 4.5;

type PhaseBank = [[f64; TAPS_PER_PHASE]; OVERSAMPLE];

/// Modified Bessel function of the first kind, order 0
fn bessel_i0(x: f64) -> f64 {
    let mut sum = 1.0;
    let mut term = 1.0;
    let x_half = x / 2.0;

    for k in 1..32 {
        term *= (x_half / k as f64).powi(2);
        sum += term;
        if term < 1e-14 * sum {
            break;
        }
    }

    sum
}

/// Polyphase interpolation coefficients, `bank[phase][tap]`
fn design_phase_bank() -> PhaseBank {
    let len = OVERSAMPLE * TAPS_PER_PHASE;
    let centre = (len - 1) as f64 / 2.0;
    let half = len as f64 / 2.0;
    let i0_beta = bessel_i0(KAISER_BETA);

    let mut bank = [[0.0; TAPS_PER_PHASE]; OVERSAMPLE];
    for n in 0..len {
        let t = (n as f64 - centre) / OVERSAMPLE as f64;
        let sinc = if t.abs() < 1e-12 {
            1.0
        } else {
            let x = std::f64::consts::PI * t;
            x.sin() / x
        };
        let a = (n as f64 - centre) / half;
        let window = bessel_i0(KAISER_BETA * (1.0 - a * a).max(0.0).sqrt()) / i0_beta;

        bank[n % OVERSAMPLE][n / OVERSAMPLE] = sinc * window;
    }

    for phase in bank.iter_mut() {
        let gain: f64 = phase.iter().sum();
        for c in phase.iter_mut() {
            *c /= gain;
        }
    }

    bank
}

/// Per-channel true peak and sample peak tracker
#[derive(Debug, Clone)]
pub struct TruePeakEstimator {
    mode: TruePeakMode,
    bank: PhaseBank,
    /// Input history, newest at `pos`
    history: [f64; TAPS_PER_PHASE],
    pos: usize,
    previous: f64,
    sample_peak: f64,
    true_peak: f64,
}

impl TruePeakEstimator {
    pub fn new(mode: TruePeakMode) -> Self {
        Self {
            mode,
            bank: design_phase_bank(),
            history: [0.0; TAPS_PER_PHASE],
            pos: 0,
            previous: 0.0,
            sample_peak: 0.0,
            true_peak: 0.0,
        }
    }

    #[inline]
    pub fn mode(&self) -> TruePeakMode {
        self.mode
    }

    /// Feed one sample, returning the largest magnitude it produced
    #[inline]
    pub fn push(&mut self, sample: Sample) -> f64 {
        let magnitude = sample.abs();
        self.sample_peak = self.sample_peak.max(magnitude);

        let mut peak = magnitude;
        match self.mode {
            TruePeakMode::Polyphase => {
                self.pos += 1;
                if self.pos == TAPS_PER_PHASE {
                    self.pos = 0;
                }
                self.history[self.pos] = sample;

                for phase in &self.bank {
                    let mut acc = 0.0;
                    for (tap, &c) in phase.iter().enumerate() {
                        let idx = if self.pos >= tap {
                            self.pos - tap
                        } else {
                            self.pos + TAPS_PER_PHASE - tap
                        };
                        acc += c * self.history[idx];
                    }
                    peak = peak.max(acc.abs());
                }
            }
            TruePeakMode::Linear => {
                let step = sample - self.previous;
                for k in 1..OVERSAMPLE {
                    let interpolated = self.previous + step * (k as f64 / OVERSAMPLE as f64);
                    peak = peak.max(interpolated.abs());
                }
                self.previous = sample;
            }
        }

        self.true_peak = self.true_peak.max(peak);
        peak
    }

    /// Running sample peak (linear)
    #[inline]
    pub fn sample_peak(&self) -> f64 {
        self.sample_peak
    }

    /// Running true peak (linear)
    #[inline]
    pub fn true_peak(&self) -> f64 {
        self.true_peak.max(self.sample_peak)
    }

    pub fn sample_peak_db(&self, floor: f64) -> f64 {
        amplitude_to_db(self.sample_peak(), floor)
    }

    pub fn true_peak_db(&self, floor: f64) -> f64 {
        amplitude_to_db(self.true_peak(), floor)
    }

    /// Clear the peak maxima; interpolation history is kept
    pub fn reset_peaks(&mut self) {
        self.sample_peak = 0.0;
        self.true_peak = 0.0;
    }
}

impl Meter for TruePeakEstimator {
    fn reset(&mut self) {
        self.history = [0.0; TAPS_PER_PHASE];
        self.pos = 0;
        self.previous = 0.0;
        self.reset_peaks();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use std::f64::consts::PI;

    fn run_tone(mode: TruePeakMode, freq: f64, phase: f64, amplitude: f64) -> TruePeakEstimator {
        let mut tp = TruePeakEstimator::new(mode);
        for n in 0..4800 {
            let x = amplitude * (2.0 * PI * freq * n as f64 / 48_000.0 + phase).sin();
            tp.push(x);
        }
        tp
    }

    #[test]
    fn test_phase_bank_unity_gain() {
        let bank = design_phase_bank();
        for phase in &bank {
            assert_abs_diff_eq!(phase.iter().sum::<f64>(), 1.0, epsilon = 1e-12);
        }
        // Mirror symmetry of the prototype: phase p reversed == phase 3-p
        for tap in 0..TAPS_PER_PHASE {
            assert_abs_diff_eq!(
                bank[0][tap],
                bank[3][TAPS_PER_PHASE - 1 - tap],
                epsilon = 1e-12
            );
        }
    }

    #[test]
    fn test_dc_settles_to_unity() {
        let mut tp = TruePeakEstimator::new(TruePeakMode::Polyphase);
        let mut last = 0.0;
        for _ in 0..48 {
            last = tp.push(0.5);
        }
        assert_abs_diff_eq!(last, 0.5, epsilon = 1e-9);
    }

    #[test]
    fn test_inter_sample_peak_quarter_rate() {
        // fs/4 at 45 degrees: every sample sits at 0.707 of the crest
        let tp = run_tone(TruePeakMode::Polyphase, 12_000.0, PI / 4.0, 0.5);
        let sp_db = tp.sample_peak_db(-120.0);
        let tp_db = tp.true_peak_db(-120.0);

        assert_abs_diff_eq!(sp_db, -9.03, epsilon = 0.05);
        assert!(tp_db - sp_db > 2.5, "tp {tp_db} sp {sp_db}");
        assert_abs_diff_eq!(tp_db, -6.02, epsilon = 0.5);
    }

    #[test]
    fn test_low_frequency_tone() {
        let tp = run_tone(TruePeakMode::Polyphase, 1_000.0, 0.0, 0.5);
        assert_abs_diff_eq!(tp.true_peak_db(-120.0), -6.02, epsilon = 0.1);
    }

    #[test]
    fn test_true_peak_never_below_sample_peak() {
        for mode in [TruePeakMode::Polyphase, TruePeakMode::Linear] {
            let mut tp = TruePeakEstimator::new(mode);
            let mut seed = 12345u32;
            for _ in 0..10_000 {
                seed = seed.wrapping_mul(1_103_515_245).wrapping_add(12_345);
                let x = (seed >> 16) as f64 / 32_768.0 - 1.0;
                let out = tp.push(x);
                assert!(out >= x.abs());
                assert!(tp.true_peak() >= tp.sample_peak());
            }
        }
    }

    #[test]
    fn test_linear_mode_interpolates() {
        let mut tp = TruePeakEstimator::new(TruePeakMode::Linear);
        tp.push(1.0);
        // Between 1.0 and -1.0 the interpolated magnitudes stay within the endpoints
        let out = tp.push(-1.0);
        assert_eq!(out, 1.0);
        assert_eq!(tp.mode(), TruePeakMode::Linear);
    }

    #[test]
    fn test_silence_floors() {
        let tp = TruePeakEstimator::new(TruePeakMode::Polyphase);
        assert_eq!(tp.true_peak_db(-120.0), -120.0);
        assert_eq!(tp.sample_peak_db(-120.0), -120.0);
    }

    #[test]
    fn test_reset_peaks_keeps_history() {
        let mut tp = TruePeakEstimator::new(TruePeakMode::Polyphase);
        for _ in 0..20 {
            tp.push(0.8);
        }
        tp.reset_peaks();
        assert_eq!(tp.sample_peak(), 0.0);

        // Steady DC continues without a restart transient
        let out = tp.push(0.8);
        assert_abs_diff_eq!(out, 0.8, epsilon = 1e-9);

        tp.reset();
        assert_eq!(tp.true_peak(), 0.0);
    }
}
