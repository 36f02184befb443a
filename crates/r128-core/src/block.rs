//! Borrowed sample block views
//!
//! A `SampleBlock` is produced by the host audio source and consumed once
//! by the metering engine. It never owns sample memory.

use crate::{validate_channels, MeterError, MeterResult};

/// Memory layout of a block
#[derive(Debug, Clone, Copy)]
pub enum BlockLayout<'a> {
    /// One slice per channel, all of equal length
    Planar(&'a [&'a [f32]]),
    /// Frames of `channels` consecutive samples
    Interleaved { samples: &'a [f32], channels: usize },
}

/// Immutable view of N frames of audio plus the stream sample rate
#[derive(Debug, Clone, Copy)]
pub struct SampleBlock<'a> {
    layout: BlockLayout<'a>,
    channels: usize,
    frames: usize,
    sample_rate: u32,
}

impl<'a> SampleBlock<'a> {
    /// Wrap per-channel slices
    pub fn planar(channels: &'a [&'a [f32]], sample_rate: u32) -> MeterResult<Self> {
        let count = validate_channels(channels.len())?;
        let frames = channels[0].len();
        for (channel, data) in channels.iter().enumerate() {
            if data.len() != frames {
                return Err(MeterError::RaggedBlock {
                    channel,
                    expected: frames,
                    got: data.len(),
                });
            }
        }

        Ok(Self {
            layout: BlockLayout::Planar(channels),
            channels: count,
            frames,
            sample_rate,
        })
    }

    /// Wrap an interleaved buffer
    pub fn interleaved(samples: &'a [f32], channels: usize, sample_rate: u32) -> MeterResult<Self> {
        let channels = validate_channels(channels)?;
        if samples.len() % channels != 0 {
            return Err(MeterError::IncompleteFrame {
                len: samples.len(),
                channels,
            });
        }

        Ok(Self {
            layout: BlockLayout::Interleaved { samples, channels },
            channels,
            frames: samples.len() / channels,
            sample_rate,
        })
    }

    #[inline]
    pub fn channels(&self) -> usize {
        self.channels
    }

    #[inline]
    pub fn frames(&self) -> usize {
        self.frames
    }

    #[inline]
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.frames == 0
    }

    #[inline]
    pub fn layout(&self) -> BlockLayout<'a> {
        self.layout
    }

    /// Sample of `channel` at `frame`, widened to f64
    ///
    /// NaN and infinite samples read as 0.0. Out-of-range indices panic like
    /// slice indexing.
    #[inline(always)]
    pub fn sample(&self, channel: usize, frame: usize) -> f64 {
        let raw = match self.layout {
            BlockLayout::Planar(data) => data[channel][frame],
            BlockLayout::Interleaved { samples, channels } => samples[frame * channels + channel],
        };
        if raw.is_finite() { raw as f64 } else { 0.0 }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_planar_access() {
        let left = [0.1f32, 0.2, 0.3];
        let right = [-0.1f32, -0.2, -0.3];
        let channels: [&[f32]; 2] = [&left, &right];
        let block = SampleBlock::planar(&channels, 48_000).unwrap();

        assert_eq!(block.channels(), 2);
        assert_eq!(block.frames(), 3);
        assert_eq!(block.sample(1, 2), -0.3f32 as f64);
    }

    #[test]
    fn test_interleaved_access() {
        let data = [0.1f32, -0.1, 0.2, -0.2];
        let block = SampleBlock::interleaved(&data, 2, 44_100).unwrap();

        assert_eq!(block.frames(), 2);
        assert_eq!(block.sample(0, 1), 0.2f32 as f64);
        assert_eq!(block.sample(1, 1), -0.2f32 as f64);
        assert_eq!(block.sample_rate(), 44_100);
    }

    #[test]
    fn test_non_finite_samples_read_as_zero() {
        let data = [f32::NAN, 0.5, f32::INFINITY, f32::NEG_INFINITY, 2.0, -1.5];
        let block = SampleBlock::interleaved(&data, 2, 48_000).unwrap();

        assert_eq!(block.sample(0, 0), 0.0);
        assert_eq!(block.sample(1, 0), 0.5);
        assert_eq!(block.sample(0, 1), 0.0);
        assert_eq!(block.sample(1, 1), 0.0);
        // Overs are finite and pass through
        assert_eq!(block.sample(0, 2), 2.0);
        assert_eq!(block.sample(1, 2), -1.5);
    }

    #[test]
    fn test_ragged_planar_rejected() {
        let left = [0.0f32; 4];
        let right = [0.0f32; 3];
        let channels: [&[f32]; 2] = [&left, &right];
        let err = SampleBlock::planar(&channels, 48_000).unwrap_err();
        assert!(matches!(
            err,
            MeterError::RaggedBlock {
                channel: 1,
                expected: 4,
                got: 3
            }
        ));
    }

    #[test]
    fn test_incomplete_interleaved_rejected() {
        let data = [0.0f32; 5];
        assert!(matches!(
            SampleBlock::interleaved(&data, 2, 48_000),
            Err(MeterError::IncompleteFrame { len: 5, channels: 2 })
        ));
    }

    #[test]
    fn test_channel_count_rejected() {
        let channels: [&[f32]; 0] = [];
        assert!(matches!(
            SampleBlock::planar(&channels, 48_000),
            Err(MeterError::InvalidChannelCount(0))
        ));
    }
}
