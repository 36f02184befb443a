//! Measurement reports and the producer → consumer report channel
//!
//! The channel is a single-producer / single-consumer triple buffer. The
//! writer and the reader each own one slot; the third ("back") slot is
//! exchanged through a single atomic that also carries a fresh-data bit.
//! Publishing never blocks and overwrites an unread report; reading always
//! yields the most recently published one.

use std::cell::UnsafeCell;
use std::sync::Arc;

use portable_atomic::{AtomicU32, Ordering};
use serde::{Deserialize, Serialize};

use r128_core::MeterConfig;

// ═══════════════════════════════════════════════════════════════════════════════
// METER REPORT
// ═══════════════════════════════════════════════════════════════════════════════

/// One snapshot of every measurement
///
/// All values are floored and finite.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MeterReport {
    /// 400 ms loudness (LUFS)
    pub momentary_lufs: f64,
    /// 3 s loudness (LUFS)
    pub short_term_lufs: f64,
    /// Gated integrated loudness since start / reset (LUFS)
    pub integrated_lufs: f64,
    /// Loudness range (LU)
    pub lra: f64,
    /// Highest sample peak across channels (dBFS)
    pub sample_peak_db: f64,
    /// Highest true peak across channels (dBTP)
    pub true_peak_db: f64,
    /// Louder channel's sliding RMS (dBFS)
    pub rms_db: f64,
    /// Phase correlation (-1..+1)
    pub correlation: f64,
    /// Stereo width (%)
    pub width_pct: f64,
    /// Estimated noise floor (dBFS)
    pub noise_floor_db: f64,
    /// Reference level minus true peak (dB)
    pub headroom_db: f64,
    /// Highest momentary block loudness since start / reset (LUFS)
    pub momentary_max_lufs: f64,
    /// Highest short-term block loudness since start / reset (LUFS)
    pub short_term_max_lufs: f64,
    /// Peak-to-loudness ratio, true peak minus integrated (LU)
    pub plr_db: f64,
    /// Blocks processed since start / reset
    pub epoch: u64,
    /// Start / reset count; a new value means the epoch restarted
    pub generation: u64,
}

impl MeterReport {
    /// Report of a session that has not measured anything yet
    pub fn floor(config: &MeterConfig, epoch: u64) -> Self {
        let loudness = config.loudness_floor_lufs;
        let level = config.level_floor_db;
        Self {
            momentary_lufs: loudness,
            short_term_lufs: loudness,
            integrated_lufs: loudness,
            lra: 0.0,
            sample_peak_db: level,
            true_peak_db: level,
            rms_db: level,
            correlation: 0.0,
            width_pct: 0.0,
            noise_floor_db: level,
            headroom_db: config.headroom_reference_db - level,
            momentary_max_lufs: loudness,
            short_term_max_lufs: loudness,
            plr_db: 0.0,
            epoch,
            generation: 0,
        }
    }

    /// True when every field is finite
    pub fn is_finite(&self) -> bool {
        [
            self.momentary_lufs,
            self.short_term_lufs,
            self.integrated_lufs,
            self.lra,
            self.sample_peak_db,
            self.true_peak_db,
            self.rms_db,
            self.correlation,
            self.width_pct,
            self.noise_floor_db,
            self.headroom_db,
            self.momentary_max_lufs,
            self.short_term_max_lufs,
            self.plr_db,
        ]
        .iter()
        .all(|v| v.is_finite())
    }
}

impl Default for MeterReport {
    fn default() -> Self {
        Self::floor(&MeterConfig::default(), 0)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// TRIPLE BUFFER
// ═══════════════════════════════════════════════════════════════════════════════

const INDEX_MASK: u32 = 0b011;
const FRESH: u32 = 0b100;

struct Slots<T> {
    buffers: [UnsafeCell<T>; 3],
    /// Back slot index plus the FRESH bit
    back: AtomicU32,
}

// Each slot is accessed by exactly one side at a time; ownership of the
// back slot moves only through `back`.
unsafe impl<T: Send> Send for Slots<T> {}
unsafe impl<T: Send> Sync for Slots<T> {}

/// Producer half (processing thread)
pub struct ReportWriter<T> {
    slots: Arc<Slots<T>>,
    write_idx: usize,
}

/// Consumer half (reporting thread)
pub struct ReportReader<T> {
    slots: Arc<Slots<T>>,
    read_idx: usize,
}

/// Create a report channel; the reader initially holds `initial` as stale data
pub fn report_channel<T: Copy + Send>(initial: T) -> (ReportWriter<T>, ReportReader<T>) {
    let slots = Arc::new(Slots {
        buffers: [
            UnsafeCell::new(initial),
            UnsafeCell::new(initial),
            UnsafeCell::new(initial),
        ],
        back: AtomicU32::new(1),
    });

    (
        ReportWriter {
            slots: Arc::clone(&slots),
            write_idx: 0,
        },
        ReportReader { slots, read_idx: 2 },
    )
}

impl<T: Copy + Send> ReportWriter<T> {
    /// Publish a value (wait-free)
    #[inline]
    pub fn publish(&mut self, value: T) {
        // SAFETY: the write slot is owned by this writer until swapped out below
        unsafe {
            *self.slots.buffers[self.write_idx].get() = value;
        }
        let previous = self
            .slots
            .back
            .swap(self.write_idx as u32 | FRESH, Ordering::AcqRel);
        self.write_idx = (previous & INDEX_MASK) as usize;
    }
}

impl<T: Copy + Send> ReportReader<T> {
    /// Latest published value, if anything was published since the last read
    #[inline]
    pub fn read_new(&mut self) -> Option<T> {
        if self.slots.back.load(Ordering::Acquire) & FRESH == 0 {
            return None;
        }
        let previous = self
            .slots
            .back
            .swap(self.read_idx as u32, Ordering::AcqRel);
        self.read_idx = (previous & INDEX_MASK) as usize;
        Some(self.current())
    }

    /// Value held by the reader (last one read, or the initial value)
    #[inline]
    pub fn current(&self) -> T {
        // SAFETY: the read slot is owned by this reader
        unsafe { *self.slots.buffers[self.read_idx].get() }
    }

    /// Whether the producer half still exists
    pub fn is_connected(&self) -> bool {
        Arc::strong_count(&self.slots) > 1
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// METER READER
// ═══════════════════════════════════════════════════════════════════════════════

/// Reports skipped between two deliveries
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DataGap {
    pub from_epoch: u64,
    pub to_epoch: u64,
    /// Reports published but never observed
    pub missed_reports: u64,
}

/// One report as seen by the consumer
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Delivery {
    pub report: MeterReport,
    pub gap: Option<DataGap>,
    /// The engine started or reset since the previous delivery
    pub restarted: bool,
}

/// Consumer-side report reader with epoch tracking
pub struct MeterReader {
    reader: ReportReader<MeterReport>,
    report_interval: u64,
    last_epoch: Option<u64>,
    last_generation: u64,
    gaps: u64,
}

impl MeterReader {
    pub(crate) fn new(reader: ReportReader<MeterReport>, report_interval: u32) -> Self {
        Self {
            reader,
            report_interval: report_interval.max(1) as u64,
            last_epoch: None,
            last_generation: 0,
            gaps: 0,
        }
    }

    /// Next unseen report with gap / restart classification
    ///
    /// Restarts are detected from the report generation, so a reset is
    /// flagged even when its epoch-0 report was overwritten before being read.
    pub fn poll(&mut self) -> Option<Delivery> {
        let report = self.reader.read_new()?;
        let epoch = report.epoch;

        let (gap, restarted) = match self.last_epoch {
            None => (None, false),
            Some(last) if report.generation != self.last_generation => {
                log::info!(
                    "Meter session restarted (generation {} -> {}, epoch {last} -> {epoch})",
                    self.last_generation,
                    report.generation
                );
                (None, true)
            }
            Some(last) if epoch.saturating_sub(last) > self.report_interval => {
                let missed = (epoch - last) / self.report_interval - 1;
                log::warn!(
                    "Meter data gap: {missed} report(s) missed between epoch {last} and {epoch}"
                );
                self.gaps += 1;
                (
                    Some(DataGap {
                        from_epoch: last,
                        to_epoch: epoch,
                        missed_reports: missed,
                    }),
                    false,
                )
            }
            Some(_) => (None, false),
        };

        self.last_epoch = Some(epoch);
        self.last_generation = report.generation;
        Some(Delivery {
            report,
            gap,
            restarted,
        })
    }

    /// Most recently read report (stale or not)
    pub fn current(&self) -> MeterReport {
        self.reader.current()
    }

    pub fn last_epoch(&self) -> Option<u64> {
        self.last_epoch
    }

    /// Number of gaps detected so far
    pub fn gap_count(&self) -> u64 {
        self.gaps
    }

    pub fn is_connected(&self) -> bool {
        self.reader.is_connected()
    }
}
