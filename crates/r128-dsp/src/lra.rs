//! Loudness range (EBU Tech 3342)
//!
//! Distribution of short-term loudness values after an absolute gate and a
//! relative gate 20 LU below their power mean. LRA is the spread between
//! the 10th and 95th percentiles.

use r128_core::units::{lufs_to_mean_square, mean_square_to_lufs};
use r128_core::MeterConfig;

use crate::history::BlockHistory;
use crate::power_window::{PowerBlock, RunningSum};
use crate::Meter;

/// LRA gates and percentiles
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LraConfig {
    pub absolute_lufs: f64,
    pub relative_lu: f64,
    pub low_percentile: f64,
    pub high_percentile: f64,
    pub floor_lufs: f64,
}

impl Default for LraConfig {
    fn default() -> Self {
        Self {
            absolute_lufs: -70.0,
            relative_lu: -20.0,
            low_percentile: 0.10,
            high_percentile: 0.95,
            floor_lufs: -70.0,
        }
    }
}

impl LraConfig {
    pub fn from_config(config: &MeterConfig) -> Self {
        Self {
            absolute_lufs: config.absolute_gate_lufs,
            relative_lu: config.lra_relative_gate_lu,
            low_percentile: config.lra_low_percentile,
            high_percentile: config.lra_high_percentile,
            floor_lufs: config.loudness_floor_lufs,
        }
    }
}

/// Nearest-rank index `floor(p * len)`, clamped to the last element
#[inline]
pub fn percentile_index(percentile: f64, len: usize) -> usize {
    if len == 0 {
        return 0;
    }
    let idx = (percentile.clamp(0.0, 1.0) * len as f64).floor() as usize;
    idx.min(len - 1)
}

/// Loudness range over a bounded short-term history
///
/// The absolutely gated power sum is kept incrementally and percentiles are
/// selected on mean-square values, so a recompute is one filter pass plus
/// two selections with no per-block `log10`.
#[derive(Debug, Clone)]
pub struct LoudnessRangeEstimator {
    history: BlockHistory,
    /// Gated mean-square values, sized to the history capacity
    scratch: Vec<f64>,
    config: LraConfig,
    absolute_power: f64,
    gated_sum: RunningSum,
    gated_count: usize,
    cached: f64,
    dirty: bool,
}

impl LoudnessRangeEstimator {
    pub fn new(capacity: usize, config: LraConfig) -> Self {
        let history = BlockHistory::new(capacity);
        let scratch = Vec::with_capacity(history.capacity());
        Self {
            history,
            scratch,
            absolute_power: lufs_to_mean_square(config.absolute_lufs),
            config,
            gated_sum: RunningSum::default(),
            gated_count: 0,
            cached: 0.0,
            dirty: false,
        }
    }

    /// Record one short-term block
    #[inline]
    pub fn push(&mut self, block: PowerBlock) {
        let ms = block.mean_square();
        if let Some(evicted) = self.history.push(ms) {
            if evicted > self.absolute_power {
                self.gated_sum.sub(evicted);
                self.gated_count -= 1;
            }
        }
        if ms > self.absolute_power {
            self.gated_sum.add(ms);
            self.gated_count += 1;
        }
        self.dirty = true;
    }

    /// Current LRA in LU (>= 0, 0 with fewer than two gated blocks)
    pub fn lra(&mut self) -> f64 {
        if self.dirty {
            self.cached = self.compute();
            self.dirty = false;
        }
        self.cached
    }

    fn compute(&mut self) -> f64 {
        let absolute_power = self.absolute_power;
        if self.gated_count < 2 {
            return 0.0;
        }

        let mean = self.gated_sum.value().max(0.0) / self.gated_count as f64;
        let mean_lufs = mean_square_to_lufs(mean, self.config.floor_lufs);
        let relative_power = lufs_to_mean_square(mean_lufs + self.config.relative_lu);

        // Never exceeds the capacity reserved in new()
        self.scratch.clear();
        self.scratch.extend(
            self.history
                .iter()
                .filter(|&ms| ms > absolute_power && ms >= relative_power),
        );

        let n = self.scratch.len();
        if n < 2 {
            return 0.0;
        }

        let low_idx = percentile_index(self.config.low_percentile, n);
        let high_idx = percentile_index(self.config.high_percentile, n).max(low_idx);

        let (_, low, upper) = self.scratch.select_nth_unstable_by(low_idx, f64::total_cmp);
        let low = *low;
        let high = if high_idx == low_idx {
            low
        } else {
            // Everything in `upper` is >= low, so rank shifts by low_idx + 1
            let (_, high, _) = upper.select_nth_unstable_by(high_idx - low_idx - 1, f64::total_cmp);
            *high
        };

        // LUFS is monotonic in mean square, so ranks carry over
        let floor = self.config.floor_lufs;
        (mean_square_to_lufs(high, floor) - mean_square_to_lufs(low, floor)).max(0.0)
    }

    #[inline]
    pub fn block_count(&self) -> usize {
        self.history.len()
    }
}

impl Meter for LoudnessRangeEstimator {
    fn reset(&mut self) {
        self.history.clear();
        self.scratch.clear();
        self.gated_sum.clear();
        self.gated_count = 0;
        self.cached = 0.0;
        self.dirty = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn block(lufs: f64) -> PowerBlock {
        PowerBlock::new(lufs_to_mean_square(lufs))
    }

    #[test]
    fn test_percentile_index() {
        assert_eq!(percentile_index(0.10, 20), 2);
        assert_eq!(percentile_index(0.95, 20), 19);
        assert_eq!(percentile_index(1.0, 20), 19);
        assert_eq!(percentile_index(0.0, 5), 0);
        assert_eq!(percentile_index(0.5, 0), 0);
    }

    #[test]
    fn test_constant_program_has_zero_range() {
        let mut lra = LoudnessRangeEstimator::new(100, LraConfig::default());
        for _ in 0..50 {
            lra.push(block(-23.0));
        }
        assert_abs_diff_eq!(lra.lra(), 0.0, epsilon = 1e-9);
    }

    #[test]
    fn test_uniform_ramp() {
        // -40..=-21 LUFS, 20 values; all survive the -20 LU gate
        let mut lra = LoudnessRangeEstimator::new(100, LraConfig::default());
        for i in 0..20 {
            lra.push(block(-40.0 + i as f64));
        }
        // P10 -> index 2 (-38), P95 -> index 19 (-21)
        assert_abs_diff_eq!(lra.lra(), 17.0, epsilon = 1e-9);
    }

    #[test]
    fn test_relative_gate_excludes_quiet_blocks() {
        let mut lra = LoudnessRangeEstimator::new(100, LraConfig::default());
        for _ in 0..10 {
            lra.push(block(-20.0));
            lra.push(block(-24.0));
        }
        // Far more than 20 LU below the mean
        for _ in 0..10 {
            lra.push(block(-60.0));
        }
        let range = lra.lra();
        assert!(range <= 4.0 + 1e-9, "range {range}");
        assert!(range >= 0.0);
    }

    #[test]
    fn test_too_few_blocks() {
        let mut lra = LoudnessRangeEstimator::new(10, LraConfig::default());
        assert_eq!(lra.lra(), 0.0);
        lra.push(block(-20.0));
        assert_eq!(lra.lra(), 0.0);
        lra.push(PowerBlock::new(0.0));
        assert_eq!(lra.lra(), 0.0);
    }

    #[test]
    fn test_eviction_updates_gated_mean() {
        // Capacity 20: the quiet first half is evicted by the loud ramp
        let mut lra = LoudnessRangeEstimator::new(20, LraConfig::default());
        for _ in 0..20 {
            lra.push(block(-65.0));
        }
        for i in 0..20 {
            lra.push(block(-40.0 + i as f64));
        }
        assert_eq!(lra.block_count(), 20);
        assert_abs_diff_eq!(lra.lra(), 17.0, epsilon = 1e-9);
    }

    #[test]
    fn test_reset() {
        let mut lra = LoudnessRangeEstimator::new(10, LraConfig::default());
        for i in 0..10 {
            lra.push(block(-30.0 + i as f64));
        }
        assert!(lra.lra() > 0.0);
        lra.reset();
        assert_eq!(lra.lra(), 0.0);
        assert_eq!(lra.block_count(), 0);
    }
}
