//! Noise floor estimate
//!
//! Heuristic, not a standards-defined quantity: the quietest channel's
//! magnitude is averaged (RMS) over short chunks, and the estimate is a low
//! percentile of the recent chunk levels. Quiet passages between events
//! dominate the low end of that distribution.

use r128_core::units::amplitude_to_db;
use r128_core::MeterConfig;

use crate::history::BlockHistory;
use crate::lra::percentile_index;
use crate::Meter;

#[derive(Debug, Clone)]
pub struct NoiseFloorEstimator {
    chunk_len: usize,
    chunk_sum: f64,
    chunk_count: usize,
    history: BlockHistory,
    scratch: Vec<f64>,
    percentile: f64,
}

impl NoiseFloorEstimator {
    /// `chunk_len` frames per RMS chunk, `capacity` chunks retained
    pub fn new(chunk_len: usize, capacity: usize, percentile: f64) -> Self {
        let history = BlockHistory::new(capacity);
        let scratch = Vec::with_capacity(history.capacity());
        Self {
            chunk_len: chunk_len.max(1),
            chunk_sum: 0.0,
            chunk_count: 0,
            history,
            scratch,
            percentile: percentile.clamp(0.0, 1.0),
        }
    }

    pub fn from_config(config: &MeterConfig) -> Self {
        Self::new(
            r128_core::ms_to_samples(config.noise_floor_window_ms, config.sample_rate),
            config.noise_floor_capacity(),
            config.noise_floor_percentile,
        )
    }

    /// Feed the minimum channel magnitude of one frame
    #[inline(always)]
    pub fn push(&mut self, magnitude: f64) {
        self.chunk_sum += magnitude * magnitude;
        self.chunk_count += 1;
        if self.chunk_count == self.chunk_len {
            let rms = (self.chunk_sum / self.chunk_len as f64).sqrt();
            self.history.push(rms);
            self.chunk_sum = 0.0;
            self.chunk_count = 0;
        }
    }

    /// Completed chunks currently retained
    #[inline]
    pub fn chunk_count(&self) -> usize {
        self.history.len()
    }

    /// Percentile chunk level in dBFS (floor until a chunk has completed)
    pub fn estimate_db(&mut self, floor: f64) -> f64 {
        if self.history.is_empty() {
            return floor;
        }

        self.scratch.clear();
        let (front, back) = self.history.as_slices();
        self.scratch.extend_from_slice(front);
        self.scratch.extend_from_slice(back);

        let idx = percentile_index(self.percentile, self.scratch.len());
        let (_, value, _) = self.scratch.select_nth_unstable_by(idx, f64::total_cmp);
        amplitude_to_db(*value, floor)
    }
}

impl Meter for NoiseFloorEstimator {
    fn reset(&mut self) {
        self.chunk_sum = 0.0;
        self.chunk_count = 0;
        self.history.clear();
        self.scratch.clear();
    }
}
