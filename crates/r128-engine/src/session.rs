//! Metering session
//!
//! Aggregate of every per-session measurement stage. Everything is
//! allocated in `new()`; `process()` and `report()` only touch
//! pre-sized state.

use r128_core::units::{amplitude_to_db, mean_square_to_lufs, power_to_db};
use r128_core::{MeterConfig, SampleBlock, MAX_CHANNELS};
use r128_dsp::{
    GateConfig, GatedIntegrator, KWeightingFilter, LoudnessRangeEstimator, LraConfig, Meter,
    NoiseFloorEstimator, SlidingPowerWindow, StereoFieldAnalyzer, TruePeakEstimator,
};

use crate::report::MeterReport;

/// Loudness readouts of one instant (LUFS / LU)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LoudnessSnapshot {
    pub momentary: f64,
    pub short_term: f64,
    pub integrated: f64,
    pub lra: f64,
}

/// Per-channel running peak maxima (linear)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PeakState {
    pub channels: usize,
    pub sample_peak: [f64; MAX_CHANNELS],
    pub true_peak: [f64; MAX_CHANNELS],
}

impl PeakState {
    pub fn max_sample_peak(&self) -> f64 {
        self.sample_peak[..self.channels].iter().fold(0.0, |m, &p| m.max(p))
    }

    pub fn max_true_peak(&self) -> f64 {
        self.true_peak[..self.channels].iter().fold(0.0, |m, &p| m.max(p))
    }
}

/// All measurement state of one session
pub struct MeteringSession {
    config: MeterConfig,
    weights: Vec<f64>,

    // Loudness path
    filters: Vec<KWeightingFilter>,
    momentary: SlidingPowerWindow,
    short_term: SlidingPowerWindow,
    integrator: GatedIntegrator,
    lra: LoudnessRangeEstimator,
    momentary_max: f64,
    short_term_max: f64,

    // Peak path
    peaks: Vec<TruePeakEstimator>,

    // Stereo path (first two channels, mono duplicated)
    stereo: StereoFieldAnalyzer,

    // Noise path
    noise: NoiseFloorEstimator,
}

impl MeteringSession {
    /// Allocate a session for a validated config
    pub fn new(config: &MeterConfig) -> Self {
        let rate = config.sample_rate;
        let floor = config.loudness_floor_lufs;
        let hop_ms = config.block_hop_ms;

        Self {
            config: config.clone(),
            weights: config.resolved_channel_weights(),
            filters: (0..config.channels)
                .map(|_| KWeightingFilter::new(rate))
                .collect(),
            momentary: SlidingPowerWindow::from_duration(rate, config.momentary_window_ms, hop_ms),
            short_term: SlidingPowerWindow::from_duration(
                rate,
                config.short_term_window_ms,
                hop_ms,
            ),
            integrator: GatedIntegrator::new(
                config.history_capacity(),
                GateConfig::integrated(config),
            ),
            lra: LoudnessRangeEstimator::new(
                config.history_capacity(),
                LraConfig::from_config(config),
            ),
            momentary_max: floor,
            short_term_max: floor,
            peaks: (0..config.channels)
                .map(|_| TruePeakEstimator::new(config.true_peak_mode))
                .collect(),
            stereo: StereoFieldAnalyzer::from_duration(
                rate,
                config.rms_window_ms,
                config.correlation_window_ms,
            ),
            noise: NoiseFloorEstimator::from_config(config),
        }
    }

    pub fn config(&self) -> &MeterConfig {
        &self.config
    }

    /// Run one block through every path
    ///
    /// The block must already match the session's rate and channel count.
    pub fn process(&mut self, block: &SampleBlock<'_>) {
        let channels = block.channels();
        let frames = block.frames();
        let floor = self.config.loudness_floor_lufs;

        // Loudness
        for frame in 0..frames {
            let mut power = 0.0;
            for (ch, filter) in self.filters.iter_mut().enumerate().take(channels) {
                let y = filter.process(block.sample(ch, frame));
                power += self.weights[ch] * y * y;
            }
            if let Some(b) = self.momentary.push(power) {
                self.momentary_max = self.momentary_max.max(b.loudness(floor));
                self.integrator.push(b);
            }
            if let Some(b) = self.short_term.push(power) {
                self.short_term_max = self.short_term_max.max(b.loudness(floor));
                self.lra.push(b);
            }
        }

        // Peaks
        for (ch, peak) in self.peaks.iter_mut().enumerate().take(channels) {
            for frame in 0..frames {
                peak.push(block.sample(ch, frame));
            }
        }

        // Stereo field
        let right = if channels > 1 { 1 } else { 0 };
        for frame in 0..frames {
            self.stereo
                .push(block.sample(0, frame), block.sample(right, frame));
        }

        // Noise floor
        for frame in 0..frames {
            let mut quietest = f64::INFINITY;
            for ch in 0..channels {
                quietest = quietest.min(block.sample(ch, frame).abs());
            }
            self.noise.push(quietest);
        }
    }

    /// Current loudness readouts (gating reruns only if new blocks arrived)
    pub fn loudness(&mut self) -> LoudnessSnapshot {
        let floor = self.config.loudness_floor_lufs;
        LoudnessSnapshot {
            momentary: mean_square_to_lufs(self.momentary.mean_square(), floor),
            short_term: mean_square_to_lufs(self.short_term.mean_square(), floor),
            integrated: self.integrator.integrated_lufs(),
            lra: self.lra.lra(),
        }
    }

    pub fn peak_state(&self) -> PeakState {
        let mut state = PeakState {
            channels: self.peaks.len(),
            sample_peak: [0.0; MAX_CHANNELS],
            true_peak: [0.0; MAX_CHANNELS],
        };
        for (ch, peak) in self.peaks.iter().enumerate() {
            state.sample_peak[ch] = peak.sample_peak();
            state.true_peak[ch] = peak.true_peak();
        }
        state
    }

    /// Snapshot every measurement; the engine stamps the generation
    pub fn report(&mut self, epoch: u64) -> MeterReport {
        let loudness_floor = self.config.loudness_floor_lufs;
        let level_floor = self.config.level_floor_db;

        let loudness = self.loudness();
        let integrated_lufs = loudness.integrated;

        let peaks = self.peak_state();
        let sample_peak_db = amplitude_to_db(peaks.max_sample_peak(), level_floor);
        let true_peak_db =
            amplitude_to_db(peaks.max_true_peak(), level_floor).max(sample_peak_db);

        let (rms_left, rms_right) = self.stereo.rms_power();
        let stereo = self.stereo.snapshot(self.config.width_ceiling_pct);

        let plr_db = if integrated_lufs <= loudness_floor {
            0.0
        } else {
            true_peak_db - integrated_lufs
        };

        MeterReport {
            momentary_lufs: loudness.momentary,
            short_term_lufs: loudness.short_term,
            integrated_lufs,
            lra: loudness.lra,
            sample_peak_db,
            true_peak_db,
            rms_db: power_to_db(rms_left.max(rms_right), level_floor),
            correlation: stereo.correlation,
            width_pct: stereo.width_pct,
            noise_floor_db: self.noise.estimate_db(level_floor),
            headroom_db: self.config.headroom_reference_db - true_peak_db,
            momentary_max_lufs: self.momentary_max,
            short_term_max_lufs: self.short_term_max,
            plr_db,
            epoch,
            generation: 0,
        }
    }

    /// Clear sample / true peak maxima (filter and window state is kept)
    pub fn reset_peaks(&mut self) {
        for peak in &mut self.peaks {
            peak.reset_peaks();
        }
        self.stereo.reset_peaks();
    }

    /// Number of gating blocks currently retained
    pub fn gating_blocks(&self) -> usize {
        self.integrator.block_count()
    }
}

impl Meter for MeteringSession {
    fn reset(&mut self) {
        for filter in &mut self.filters {
            filter.reset();
        }
        self.momentary.reset();
        self.short_term.reset();
        self.integrator.reset();
        self.lra.reset();
        self.momentary_max = self.config.loudness_floor_lufs;
        self.short_term_max = self.config.loudness_floor_lufs;
        for peak in &mut self.peaks {
            peak.reset();
        }
        self.stereo.reset();
        self.noise.reset();
    }
}
