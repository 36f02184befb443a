//! Sliding mean-square windows
//!
//! A fixed ring of squared samples plus a running sum: each push subtracts
//! the evicted slot and adds the new one, so the cost per sample is O(1)
//! regardless of window length. The running sum is compensated
//! (Neumaier) so that add/subtract cycles over hours of audio do not drift.

use r128_core::units::mean_square_to_lufs;

use crate::Meter;

// ═══════════════════════════════════════════════════════════════════════════════
// RUNNING SUM
// ═══════════════════════════════════════════════════════════════════════════════

/// Compensated running sum
#[derive(Debug, Clone, Copy, Default)]
pub struct RunningSum {
    sum: f64,
    compensation: f64,
}

impl RunningSum {
    #[inline(always)]
    pub fn add(&mut self, value: f64) {
        let t = self.sum + value;
        if self.sum.abs() >= value.abs() {
            self.compensation += (self.sum - t) + value;
        } else {
            self.compensation += (value - t) + self.sum;
        }
        self.sum = t;
    }

    #[inline(always)]
    pub fn sub(&mut self, value: f64) {
        self.add(-value);
    }

    #[inline]
    pub fn value(&self) -> f64 {
        self.sum + self.compensation
    }

    #[inline]
    pub fn clear(&mut self) {
        *self = Self::default();
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// POWER BLOCK
// ═══════════════════════════════════════════════════════════════════════════════

/// Mean-square K-weighted power over one completed window
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default)]
pub struct PowerBlock {
    mean_square: f64,
}

impl PowerBlock {
    /// Negative and NaN inputs (rounding residue) become 0
    #[inline]
    pub fn new(mean_square: f64) -> Self {
        Self {
            mean_square: if mean_square > 0.0 { mean_square } else { 0.0 },
        }
    }

    #[inline]
    pub fn mean_square(&self) -> f64 {
        self.mean_square
    }

    /// Block loudness in LUFS, floored
    #[inline]
    pub fn loudness(&self, floor: f64) -> f64 {
        mean_square_to_lufs(self.mean_square, floor)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// SLIDING POWER WINDOW
// ═══════════════════════════════════════════════════════════════════════════════

/// Fixed-length mean-square window emitting a block every `hop` pushes
///
/// The first block is emitted when the window first fills; a trailing
/// partial window is never emitted. `hop == window` gives non-overlapping
/// blocks, `hop == window / 4` the BS.1770 75 % overlap.
#[derive(Debug, Clone)]
pub struct SlidingPowerWindow {
    ring: Vec<f64>,
    pos: usize,
    filled: usize,
    sum: RunningSum,
    hop: usize,
    since_emit: usize,
}

impl SlidingPowerWindow {
    pub fn new(window_len: usize, hop_len: usize) -> Self {
        let window_len = window_len.max(1);
        Self {
            ring: vec![0.0; window_len],
            pos: 0,
            filled: 0,
            sum: RunningSum::default(),
            hop: hop_len.clamp(1, window_len),
            since_emit: 0,
        }
    }

    /// Build from durations in milliseconds
    pub fn from_duration(sample_rate: u32, window_ms: f64, hop_ms: f64) -> Self {
        Self::new(
            r128_core::ms_to_samples(window_ms, sample_rate),
            r128_core::ms_to_samples(hop_ms, sample_rate),
        )
    }

    /// Push one (channel-weighted) squared sample
    ///
    /// Negative, NaN and infinite powers enter the window as 0.
    #[inline(always)]
    pub fn push(&mut self, power: f64) -> Option<PowerBlock> {
        let power = if power.is_finite() && power > 0.0 { power } else { 0.0 };

        let evicted = self.ring[self.pos];
        self.sum.sub(evicted);
        self.sum.add(power);
        self.ring[self.pos] = power;

        self.pos += 1;
        if self.pos == self.ring.len() {
            self.pos = 0;
        }
        if self.filled < self.ring.len() {
            self.filled += 1;
        }

        self.since_emit += 1;
        if self.is_full() && self.since_emit >= self.hop {
            self.since_emit = 0;
            Some(PowerBlock::new(self.mean_square()))
        } else {
            None
        }
    }

    /// Current window mean (samples not yet seen count as zero)
    #[inline]
    pub fn mean_square(&self) -> f64 {
        (self.sum.value() / self.ring.len() as f64).max(0.0)
    }

    #[inline]
    pub fn is_full(&self) -> bool {
        self.filled == self.ring.len()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.ring.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.filled == 0
    }

    #[inline]
    pub fn hop(&self) -> usize {
        self.hop
    }
}

impl Meter for SlidingPowerWindow {
    fn reset(&mut self) {
        self.ring.fill(0.0);
        self.pos = 0;
        self.filled = 0;
        self.sum.clear();
        self.since_emit = 0;
    }
}
