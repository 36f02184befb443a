//! Block sources
//!
//! A `BlockSource` fills interleaved f32 buffers; `drive()` feeds them to an
//! engine block by block. The generators here provide calibrated test
//! material (tones, noise, silence).

use r128_core::units::db_to_amplitude;
use r128_core::{validate_channels, validate_sample_rate, MeterResult, SampleBlock};

use crate::engine::MeteringEngine;

/// Producer of interleaved sample blocks
pub trait BlockSource {
    fn sample_rate(&self) -> u32;

    fn channels(&self) -> usize;

    /// Fill `buffer` with whole interleaved frames, returning the frame count
    ///
    /// Returns 0 once the source is exhausted.
    fn fill(&mut self, buffer: &mut [f32]) -> usize;
}

impl<S: BlockSource + ?Sized> BlockSource for Box<S> {
    fn sample_rate(&self) -> u32 {
        (**self).sample_rate()
    }

    fn channels(&self) -> usize {
        (**self).channels()
    }

    fn fill(&mut self, buffer: &mut [f32]) -> usize {
        (**self).fill(buffer)
    }
}

/// Totals of one `drive()` run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DriveSummary {
    pub blocks: u64,
    pub frames: u64,
    pub reports: u64,
}

/// Feed `source` into `engine` until it is exhausted
///
/// `buffer` decides the block size (`buffer.len() / channels` frames).
pub fn drive<S: BlockSource + ?Sized>(
    engine: &mut MeteringEngine,
    source: &mut S,
    buffer: &mut [f32],
) -> MeterResult<DriveSummary> {
    let channels = source.channels();
    let sample_rate = source.sample_rate();
    let mut summary = DriveSummary::default();

    loop {
        let frames = source.fill(buffer);
        if frames == 0 {
            break;
        }
        let block = SampleBlock::interleaved(&buffer[..frames * channels], channels, sample_rate)?;
        let outcome = engine.process(&block)?;

        summary.blocks += 1;
        summary.frames += frames as u64;
        if outcome.reported {
            summary.reports += 1;
        }
    }

    Ok(summary)
}

/// Frames remaining in a finite source (`None` = endless)
#[derive(Debug, Clone, Copy)]
struct Remaining(Option<u64>);

impl Remaining {
    fn from_secs(sample_rate: u32, seconds: Option<f64>) -> Self {
        Self(seconds.map(|s| (s.max(0.0) * sample_rate as f64).round() as u64))
    }

    /// Clamp a request to what is left and consume it
    fn take(&mut self, wanted: usize) -> usize {
        match &mut self.0 {
            None => wanted,
            Some(left) => {
                let n = (*left).min(wanted as u64) as usize;
                *left -= n as u64;
                n
            }
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// TONE
// ═══════════════════════════════════════════════════════════════════════════════

/// Sine generator with per-channel gain and phase offset
#[derive(Debug, Clone)]
pub struct ToneSource {
    sample_rate: u32,
    channels: usize,
    frequency: f64,
    amplitude: f64,
    gains: Vec<f64>,
    phase_offsets: Vec<f64>,
    frame_index: u64,
    remaining: Remaining,
}

impl ToneSource {
    /// Endless tone at `level_dbfs` peak on every channel
    pub fn new(
        sample_rate: u32,
        channels: usize,
        frequency: f64,
        level_dbfs: f64,
    ) -> MeterResult<Self> {
        validate_sample_rate(sample_rate)?;
        validate_channels(channels)?;
        Ok(Self {
            sample_rate,
            channels,
            frequency,
            amplitude: db_to_amplitude(level_dbfs),
            gains: vec![1.0; channels],
            phase_offsets: vec![0.0; channels],
            frame_index: 0,
            remaining: Remaining(None),
        })
    }

    /// Stop after `seconds`
    pub fn with_duration(mut self, seconds: f64) -> Self {
        self.remaining = Remaining::from_secs(self.sample_rate, Some(seconds));
        self
    }

    /// Linear gain for one channel (out-of-range channels are ignored)
    pub fn with_channel_gain(mut self, channel: usize, gain: f64) -> Self {
        if let Some(g) = self.gains.get_mut(channel) {
            *g = gain;
        }
        self
    }

    /// Phase offset in radians for one channel
    pub fn with_phase_offset(mut self, channel: usize, radians: f64) -> Self {
        if let Some(p) = self.phase_offsets.get_mut(channel) {
            *p = radians;
        }
        self
    }
}

impl BlockSource for ToneSource {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn channels(&self) -> usize {
        self.channels
    }

    fn fill(&mut self, buffer: &mut [f32]) -> usize {
        let frames = self.remaining.take(buffer.len() / self.channels);
        let step = 2.0 * std::f64::consts::PI * self.frequency / self.sample_rate as f64;

        for frame in buffer.chunks_exact_mut(self.channels).take(frames) {
            // Phase from the absolute index keeps long runs drift-free
            let phase = step * self.frame_index as f64;
            for (ch, out) in frame.iter_mut().enumerate() {
                let x = self.amplitude * self.gains[ch] * (phase + self.phase_offsets[ch]).sin();
                *out = x as f32;
            }
            self.frame_index += 1;
        }
        frames
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// NOISE
// ═══════════════════════════════════════════════════════════════════════════════

/// Uniform white noise from a seeded LCG (reproducible)
#[derive(Debug, Clone)]
pub struct NoiseSource {
    sample_rate: u32,
    channels: usize,
    amplitude: f64,
    state: u64,
    /// Same sample on every channel
    correlated: bool,
    remaining: Remaining,
}

impl NoiseSource {
    pub fn new(sample_rate: u32, channels: usize, level_dbfs: f64, seed: u64) -> MeterResult<Self> {
        validate_sample_rate(sample_rate)?;
        validate_channels(channels)?;
        Ok(Self {
            sample_rate,
            channels,
            amplitude: db_to_amplitude(level_dbfs),
            state: seed,
            correlated: false,
            remaining: Remaining(None),
        })
    }

    pub fn with_duration(mut self, seconds: f64) -> Self {
        self.remaining = Remaining::from_secs(self.sample_rate, Some(seconds));
        self
    }

    /// Duplicate one noise sequence onto all channels
    pub fn correlated(mut self) -> Self {
        self.correlated = true;
        self
    }

    #[inline]
    fn next_sample(&mut self) -> f64 {
        self.state = self
            .state
            .wrapping_mul(6_364_136_223_846_793_005)
            .wrapping_add(1_442_695_040_888_963_407);
        // Top 24 bits -> [-1, 1)
        ((self.state >> 40) as f64 / (1u64 << 23) as f64) - 1.0
    }
}

impl BlockSource for NoiseSource {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn channels(&self) -> usize {
        self.channels
    }

    fn fill(&mut self, buffer: &mut [f32]) -> usize {
        let frames = self.remaining.take(buffer.len() / self.channels);
        let channels = self.channels;

        for frame in buffer.chunks_exact_mut(channels).take(frames) {
            if self.correlated {
                let x = (self.amplitude * self.next_sample()) as f32;
                frame.fill(x);
            } else {
                for out in frame.iter_mut() {
                    *out = (self.amplitude * self.next_sample()) as f32;
                }
            }
        }
        frames
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// SILENCE
// ═══════════════════════════════════════════════════════════════════════════════

/// Digital silence
#[derive(Debug, Clone)]
pub struct SilenceSource {
    sample_rate: u32,
    channels: usize,
    remaining: Remaining,
}

impl SilenceSource {
    pub fn new(sample_rate: u32, channels: usize) -> MeterResult<Self> {
        validate_sample_rate(sample_rate)?;
        validate_channels(channels)?;
        Ok(Self {
            sample_rate,
            channels,
            remaining: Remaining(None),
        })
    }

    pub fn with_duration(mut self, seconds: f64) -> Self {
        self.remaining = Remaining::from_secs(self.sample_rate, Some(seconds));
        self
    }
}

impl BlockSource for SilenceSource {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn channels(&self) -> usize {
        self.channels
    }

    fn fill(&mut self, buffer: &mut [f32]) -> usize {
        let frames = self.remaining.take(buffer.len() / self.channels);
        buffer[..frames * self.channels].fill(0.0);
        frames
    }
}
