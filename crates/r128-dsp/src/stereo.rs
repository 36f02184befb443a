//! Stereo field analysis
//!
//! Sample peaks, sliding RMS per channel, phase correlation and stereo
//! width over a bounded window. All sums are updated incrementally.

use r128_core::units::{amplitude_to_db, power_to_db};
use r128_core::{Sample, StereoSample};

use crate::power_window::{RunningSum, SlidingPowerWindow};
use crate::Meter;

/// Guards the correlation and width denominators
const EPSILON: f64 = 1e-20;

/// Correlation and width of the current window
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct StereoSnapshot {
    /// -1 (anti-phase) .. +1 (mono)
    pub correlation: f64,
    /// Side/mid energy ratio in percent (0 = mono)
    pub width_pct: f64,
}

/// Two-channel peak / RMS / correlation / width analyzer
#[derive(Debug, Clone)]
pub struct StereoFieldAnalyzer {
    peak_left: f64,
    peak_right: f64,
    rms_left: SlidingPowerWindow,
    rms_right: SlidingPowerWindow,

    window: Vec<StereoSample>,
    write_pos: usize,
    sum_lr: RunningSum,
    sum_ll: RunningSum,
    sum_rr: RunningSum,
    sum_mid: RunningSum,
    sum_side: RunningSum,
    /// Frames in the window with non-zero side (exact mono detection)
    side_frames: usize,
    /// Frames in the window with any non-zero sample
    active_frames: usize,
}

impl StereoFieldAnalyzer {
    pub fn new(rms_window: usize, correlation_window: usize) -> Self {
        let rms_window = rms_window.max(1);
        Self {
            peak_left: 0.0,
            peak_right: 0.0,
            rms_left: SlidingPowerWindow::new(rms_window, rms_window),
            rms_right: SlidingPowerWindow::new(rms_window, rms_window),
            window: vec![StereoSample::default(); correlation_window.max(1)],
            write_pos: 0,
            sum_lr: RunningSum::default(),
            sum_ll: RunningSum::default(),
            sum_rr: RunningSum::default(),
            sum_mid: RunningSum::default(),
            sum_side: RunningSum::default(),
            side_frames: 0,
            active_frames: 0,
        }
    }

    /// Build from window durations in milliseconds
    pub fn from_duration(sample_rate: u32, rms_window_ms: f64, correlation_window_ms: f64) -> Self {
        Self::new(
            r128_core::ms_to_samples(rms_window_ms, sample_rate),
            r128_core::ms_to_samples(correlation_window_ms, sample_rate),
        )
    }

    /// Non-finite samples are taken as 0 so the running sums stay finite
    #[inline(always)]
    pub fn push(&mut self, left: Sample, right: Sample) {
        let left = if left.is_finite() { left } else { 0.0 };
        let right = if right.is_finite() { right } else { 0.0 };
        self.peak_left = self.peak_left.max(left.abs());
        self.peak_right = self.peak_right.max(right.abs());
        self.rms_left.push(left * left);
        self.rms_right.push(right * right);

        let old = self.window[self.write_pos];
        self.remove(old);
        let frame = StereoSample::new(left, right);
        self.insert(frame);
        self.window[self.write_pos] = frame;

        self.write_pos += 1;
        if self.write_pos == self.window.len() {
            self.write_pos = 0;
        }
    }

    #[inline(always)]
    fn insert(&mut self, frame: StereoSample) {
        let ms = frame.to_mid_side();
        self.sum_lr.add(frame.left * frame.right);
        self.sum_ll.add(frame.left * frame.left);
        self.sum_rr.add(frame.right * frame.right);
        self.sum_mid.add(ms.mid * ms.mid);
        self.sum_side.add(ms.side * ms.side);
        if ms.side != 0.0 {
            self.side_frames += 1;
        }
        if frame.left != 0.0 || frame.right != 0.0 {
            self.active_frames += 1;
        }
    }

    #[inline(always)]
    fn remove(&mut self, frame: StereoSample) {
        let ms = frame.to_mid_side();
        self.sum_lr.sub(frame.left * frame.right);
        self.sum_ll.sub(frame.left * frame.left);
        self.sum_rr.sub(frame.right * frame.right);
        self.sum_mid.sub(ms.mid * ms.mid);
        self.sum_side.sub(ms.side * ms.side);
        if ms.side != 0.0 {
            self.side_frames -= 1;
        }
        if frame.left != 0.0 || frame.right != 0.0 {
            self.active_frames -= 1;
        }
    }

    /// Correlation and width over the correlation window
    pub fn snapshot(&self, width_ceiling_pct: f64) -> StereoSnapshot {
        if self.active_frames == 0 {
            return StereoSnapshot::default();
        }
        if self.side_frames == 0 {
            return StereoSnapshot {
                correlation: 1.0,
                width_pct: 0.0,
            };
        }

        let n = self.window.len() as f64;
        let mean_lr = self.sum_lr.value() / n;
        let rms_l = (self.sum_ll.value().max(0.0) / n).sqrt();
        let rms_r = (self.sum_rr.value().max(0.0) / n).sqrt();
        let correlation = mean_lr / (rms_l * rms_r + EPSILON);

        let mid_energy = self.sum_mid.value().max(0.0);
        let side_energy = self.sum_side.value().max(0.0);
        let width_pct = side_energy / (mid_energy + EPSILON) * 100.0;

        StereoSnapshot {
            correlation: if correlation.is_finite() {
                correlation.clamp(-1.0, 1.0)
            } else {
                0.0
            },
            width_pct: if width_pct.is_finite() {
                width_pct.clamp(0.0, width_ceiling_pct)
            } else {
                width_ceiling_pct
            },
        }
    }

    /// Sliding RMS per channel in dBFS
    pub fn rms_db(&self, floor: f64) -> (f64, f64) {
        (
            power_to_db(self.rms_left.mean_square(), floor),
            power_to_db(self.rms_right.mean_square(), floor),
        )
    }

    /// Sliding mean square per channel (linear)
    pub fn rms_power(&self) -> (f64, f64) {
        (self.rms_left.mean_square(), self.rms_right.mean_square())
    }

    /// Running sample peaks per channel (linear)
    pub fn peaks(&self) -> (f64, f64) {
        (self.peak_left, self.peak_right)
    }

    pub fn peaks_db(&self, floor: f64) -> (f64, f64) {
        (
            amplitude_to_db(self.peak_left, floor),
            amplitude_to_db(self.peak_right, floor),
        )
    }

    pub fn reset_peaks(&mut self) {
        self.peak_left = 0.0;
        self.peak_right = 0.0;
    }
}

impl Meter for StereoFieldAnalyzer {
    fn reset(&mut self) {
        self.reset_peaks();
        self.rms_left.reset();
        self.rms_right.reset();
        self.window.fill(StereoSample::default());
        self.write_pos = 0;
        self.sum_lr.clear();
        self.sum_ll.clear();
        self.sum_rr.clear();
        self.sum_mid.clear();
        self.sum_side.clear();
        self.side_frames = 0;
        self.active_frames = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use std::f64::consts::PI;

    fn sine(n: usize, freq: f64) -> f64 {
        (2.0 * PI * freq * n as f64 / 48_000.0).sin()
    }

    #[test]
    fn test_mono_is_exact() {
        let mut analyzer = StereoFieldAnalyzer::from_duration(48_000, 300.0, 300.0);
        for n in 0..48_000 {
            let x = 0.5 * sine(n, 440.0);
            analyzer.push(x, x);
        }
        let snap = analyzer.snapshot(200.0);
        assert_eq!(snap.correlation, 1.0);
        assert_eq!(snap.width_pct, 0.0);
    }

    #[test]
    fn test_mono_after_stereo_passage() {
        let mut analyzer = StereoFieldAnalyzer::new(480, 480);
        for n in 0..2_000 {
            analyzer.push(sine(n, 440.0), sine(n, 660.0));
        }
        for n in 0..480 {
            let x = sine(n, 1_000.0);
            analyzer.push(x, x);
        }
        assert_eq!(analyzer.snapshot(200.0).correlation, 1.0);
    }

    #[test]
    fn test_anti_phase() {
        let mut analyzer = StereoFieldAnalyzer::new(4_800, 4_800);
        for n in 0..9_600 {
            let x = sine(n, 1_000.0);
            analyzer.push(x, -x);
        }
        let snap = analyzer.snapshot(200.0);
        assert_abs_diff_eq!(snap.correlation, -1.0, epsilon = 1e-9);
        assert_eq!(snap.width_pct, 200.0);
    }

    #[test]
    fn test_uncorrelated_is_near_zero() {
        let mut analyzer = StereoFieldAnalyzer::new(4_800, 14_400);
        let mut seed = 1u32;
        let mut next = || {
            seed = seed.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
            (seed >> 8) as f64 / 8_388_608.0 - 1.0
        };
        for _ in 0..28_800 {
            let l = next();
            let r = next();
            analyzer.push(l, r);
        }
        let snap = analyzer.snapshot(200.0);
        assert!(snap.correlation.abs() < 0.05, "{}", snap.correlation);
        // Independent channels of equal power: side == mid
        assert_abs_diff_eq!(snap.width_pct, 100.0, epsilon = 5.0);
    }

    #[test]
    fn test_width_is_energy_ratio() {
        // L = x, R = x/2: mid = 3x/4, side = x/4, energy ratio 1/9
        let mut analyzer = StereoFieldAnalyzer::new(4_800, 4_800);
        for n in 0..9_600 {
            let x = sine(n, 1_000.0);
            analyzer.push(x, 0.5 * x);
        }
        let snap = analyzer.snapshot(200.0);
        assert_abs_diff_eq!(snap.width_pct, 100.0 / 9.0, epsilon = 1e-6);
        assert_abs_diff_eq!(snap.correlation, 1.0, epsilon = 1e-9);
    }

    #[test]
    fn test_non_finite_input_does_not_poison_window() {
        let mut analyzer = StereoFieldAnalyzer::new(480, 480);
        analyzer.push(f64::NAN, f64::INFINITY);
        for n in 0..960 {
            let x = sine(n, 1_000.0);
            analyzer.push(x, x);
        }
        let snap = analyzer.snapshot(200.0);
        assert_eq!(snap.correlation, 1.0);
        assert_eq!(snap.width_pct, 0.0);
        assert!(analyzer.rms_power().0.is_finite());
    }

    #[test]
    fn test_silence() {
        let mut analyzer = StereoFieldAnalyzer::new(100, 100);
        for _ in 0..500 {
            analyzer.push(0.0, 0.0);
        }
        assert_eq!(analyzer.snapshot(200.0), StereoSnapshot::default());
        assert_eq!(analyzer.rms_db(-120.0), (-120.0, -120.0));
        assert_eq!(analyzer.peaks_db(-120.0), (-120.0, -120.0));
    }

    #[test]
    fn test_rms_and_peaks() {
        let mut analyzer = StereoFieldAnalyzer::from_duration(48_000, 300.0, 300.0);
        for n in 0..48_000 {
            analyzer.push(sine(n, 1_000.0), 0.5 * sine(n, 1_000.0));
        }
        let (left_db, right_db) = analyzer.rms_db(-120.0);
        assert_abs_diff_eq!(left_db, -3.01, epsilon = 0.05);
        assert_abs_diff_eq!(right_db, -9.03, epsilon = 0.05);

        let (peak_l, peak_r) = analyzer.peaks();
        assert_abs_diff_eq!(peak_l, 1.0, epsilon = 1e-3);
        assert_abs_diff_eq!(peak_r, 0.5, epsilon = 1e-3);

        analyzer.reset_peaks();
        assert_eq!(analyzer.peaks(), (0.0, 0.0));
    }

    #[test]
    fn test_reset() {
        let mut analyzer = StereoFieldAnalyzer::new(64, 64);
        for n in 0..1_000 {
            analyzer.push(sine(n, 300.0), sine(n, 500.0));
        }
        analyzer.reset();
        assert_eq!(analyzer.snapshot(200.0), StereoSnapshot::default());
        assert_eq!(analyzer.rms_power(), (0.0, 0.0));
    }
}
