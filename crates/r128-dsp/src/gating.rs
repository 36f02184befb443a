//! Gated integrated loudness (BS.1770-4 §2.8)
//!
//! Two-pass gating over the history of 400 ms block powers:
//!
//! 1. absolute gate: blocks at or below -70 LUFS are discarded
//! 2. preliminary loudness = power mean of the survivors
//! 3. relative gate: blocks below (preliminary - 10 LU) are discarded
//! 4. integrated loudness = power mean of what remains
//!
//! Averaging happens in the power domain; LUFS is only used to express
//! the thresholds.

use r128_core::units::{lufs_to_mean_square, mean_square_to_lufs};
use r128_core::MeterConfig;

use crate::history::BlockHistory;
use crate::power_window::PowerBlock;
use crate::Meter;

/// Gate thresholds
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GateConfig {
    /// Absolute gate (LUFS)
    pub absolute_lufs: f64,
    /// Relative gate offset from the preliminary loudness (LU, negative)
    pub relative_lu: f64,
    /// Value reported when nothing passes
    pub floor_lufs: f64,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            absolute_lufs: -70.0,
            relative_lu: -10.0,
            floor_lufs: -70.0,
        }
    }
}

impl GateConfig {
    /// Integrated-loudness gates from a session config
    pub fn integrated(config: &MeterConfig) -> Self {
        Self {
            absolute_lufs: config.absolute_gate_lufs,
            relative_lu: config.relative_gate_lu,
            floor_lufs: config.loudness_floor_lufs,
        }
    }
}

/// Outcome of one gating pass
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GatingResult {
    pub integrated_lufs: f64,
    pub preliminary_lufs: f64,
    pub relative_threshold_lufs: f64,
    /// Blocks passing the absolute gate
    pub absolute_count: usize,
    /// Blocks passing both gates
    pub relative_count: usize,
}

impl GatingResult {
    /// Result for an empty or fully gated history
    pub fn floor(gate: &GateConfig) -> Self {
        Self {
            integrated_lufs: gate.floor_lufs,
            preliminary_lufs: gate.floor_lufs,
            relative_threshold_lufs: gate.floor_lufs,
            absolute_count: 0,
            relative_count: 0,
        }
    }
}

/// Apply both gates to a set of block mean-square values
///
/// `blocks` is iterated twice, so it should be a cheap-to-clone iterator
/// (slice iterators, ring views).
pub fn gate_blocks<I>(blocks: I, gate: &GateConfig) -> GatingResult
where
    I: IntoIterator<Item = f64>,
    I::IntoIter: Clone,
{
    let blocks = blocks.into_iter();
    let absolute_power = lufs_to_mean_square(gate.absolute_lufs);

    let (mut sum, mut count) = (0.0, 0usize);
    for ms in blocks.clone() {
        if ms > absolute_power {
            sum += ms;
            count += 1;
        }
    }
    if count == 0 {
        return GatingResult::floor(gate);
    }

    let preliminary_lufs = mean_square_to_lufs(sum / count as f64, gate.floor_lufs);
    let relative_threshold_lufs = preliminary_lufs + gate.relative_lu;
    let relative_power = lufs_to_mean_square(relative_threshold_lufs);

    let (mut gated_sum, mut gated_count) = (0.0, 0usize);
    for ms in blocks {
        if ms > absolute_power && ms >= relative_power {
            gated_sum += ms;
            gated_count += 1;
        }
    }

    let integrated_lufs = if gated_count == 0 {
        preliminary_lufs
    } else {
        mean_square_to_lufs(gated_sum / gated_count as f64, gate.floor_lufs)
    };

    GatingResult {
        integrated_lufs,
        preliminary_lufs,
        relative_threshold_lufs,
        absolute_count: count,
        relative_count: gated_count,
    }
}

/// Integrated loudness over a bounded block history
///
/// The gating pass only reruns when blocks arrived since the last query.
#[derive(Debug, Clone)]
pub struct GatedIntegrator {
    history: BlockHistory,
    gate: GateConfig,
    cached: GatingResult,
    dirty: bool,
}

impl GatedIntegrator {
    pub fn new(capacity: usize, gate: GateConfig) -> Self {
        Self {
            history: BlockHistory::new(capacity),
            gate,
            cached: GatingResult::floor(&gate),
            dirty: false,
        }
    }

    #[inline]
    pub fn push(&mut self, block: PowerBlock) {
        self.history.push(block.mean_square());
        self.dirty = true;
    }

    pub fn result(&mut self) -> GatingResult {
        if self.dirty {
            let (front, back) = self.history.as_slices();
            self.cached = gate_blocks(front.iter().chain(back).copied(), &self.gate);
            self.dirty = false;
        }
        self.cached
    }

    #[inline]
    pub fn integrated_lufs(&mut self) -> f64 {
        self.result().integrated_lufs
    }

    #[inline]
    pub fn block_count(&self) -> usize {
        self.history.len()
    }

    pub fn gate(&self) -> &GateConfig {
        &self.gate
    }
}

impl Meter for GatedIntegrator {
    fn reset(&mut self) {
        self.history.clear();
        self.cached = GatingResult::floor(&self.gate);
        self.dirty = false;
    }
}
