//! Metering engine state machine
//!
//! ```text
//! Idle ──start──▶ Measuring ──stop──▶ Stopped ──start──▶ Measuring
//!                   │   ▲
//!                   └───┘ reset (epoch back to 0, generation + 1)
//! ```
//!
//! `set_sample_rate` is accepted in `Idle` and `Stopped`, where no session
//! exists, and rejected with `SessionActive` while `Measuring`.
//!
//! The engine lives on the processing thread. `process()` never blocks,
//! allocates or logs; control requests from the consumer are applied at
//! block boundaries.

use r128_core::{validate_sample_rate, MeterConfig, MeterError, MeterResult, SampleBlock};
use r128_dsp::Meter;

use crate::control::{control_channel, ControlReceiver, ControlRequest, ControlSender};
use crate::report::{report_channel, MeterReader, MeterReport, ReportWriter};
use crate::session::MeteringSession;

/// Engine lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    /// Constructed, no session allocated
    Idle,
    /// Session allocated, accepting blocks
    Measuring,
    /// Session torn down; `start()` begins a new one
    Stopped,
}

/// Result of processing one block
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockOutcome {
    /// Blocks processed since start / reset, including this one
    pub epoch: u64,
    /// A report was published after this block
    pub reported: bool,
}

/// Consumer-side handle: latest reports and control requests
pub struct MeterHandle {
    reader: MeterReader,
    control: ControlSender,
}

impl MeterHandle {
    /// Newest report not yet seen, if any
    pub fn latest(&mut self) -> Option<MeterReport> {
        self.reader.poll().map(|delivery| delivery.report)
    }

    /// Newest report with gap / restart information
    pub fn poll(&mut self) -> Option<crate::report::Delivery> {
        self.reader.poll()
    }

    /// Ask the engine to reset at the next block boundary
    pub fn request_reset(&mut self) -> MeterResult<()> {
        self.control.send(ControlRequest::Reset)
    }

    /// Ask the engine to clear its peak maxima at the next block boundary
    pub fn request_peak_reset(&mut self) -> MeterResult<()> {
        self.control.send(ControlRequest::ResetPeaks)
    }

    pub fn reader(&self) -> &MeterReader {
        &self.reader
    }

    /// Split for use from separate threads
    pub fn into_parts(self) -> (MeterReader, ControlSender) {
        (self.reader, self.control)
    }
}

/// Real-time metering engine
pub struct MeteringEngine {
    config: MeterConfig,
    state: EngineState,
    session: Option<MeteringSession>,
    epoch: u64,
    /// Bumped on every start / reset
    generation: u64,
    blocks_since_report: u32,
    reports: ReportWriter<MeterReport>,
    control: ControlReceiver,
}

impl MeteringEngine {
    /// Validate `config` and create the engine with its consumer handle
    pub fn new(config: MeterConfig) -> MeterResult<(Self, MeterHandle)> {
        config.validate()?;

        let (writer, reader) = report_channel(MeterReport::floor(&config, 0));
        let (sender, receiver) = control_channel(config.control_queue_capacity);

        let handle = MeterHandle {
            reader: MeterReader::new(reader, config.report_interval_blocks),
            control: sender,
        };
        let engine = Self {
            config,
            state: EngineState::Idle,
            session: None,
            epoch: 0,
            generation: 0,
            blocks_since_report: 0,
            reports: writer,
            control: receiver,
        };

        Ok((engine, handle))
    }

    pub fn state(&self) -> EngineState {
        self.state
    }

    pub fn config(&self) -> &MeterConfig {
        &self.config
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Number of starts and resets so far
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn session(&self) -> Option<&MeteringSession> {
        self.session.as_ref()
    }

    /// Allocate a session and publish a floor report at epoch 0
    pub fn start(&mut self) -> MeterResult<()> {
        if self.state == EngineState::Measuring {
            return Err(MeterError::SessionActive);
        }

        self.session = Some(MeteringSession::new(&self.config));
        self.state = EngineState::Measuring;
        self.publish_floor();

        log::info!(
            "Metering started: {} Hz, {} ch, report every {} blocks",
            self.config.sample_rate,
            self.config.channels,
            self.config.report_interval_blocks
        );
        Ok(())
    }

    /// Measure one block
    ///
    /// Pending control requests are applied first. A block whose format
    /// does not match the session is rejected without being consumed.
    pub fn process(&mut self, block: &SampleBlock<'_>) -> MeterResult<BlockOutcome> {
        if self.state != EngineState::Measuring {
            return Err(MeterError::NotMeasuring);
        }

        self.poll_control();

        if block.sample_rate() != self.config.sample_rate {
            return Err(MeterError::SampleRateMismatch {
                expected: self.config.sample_rate,
                got: block.sample_rate(),
            });
        }
        if block.channels() != self.config.channels {
            return Err(MeterError::ChannelMismatch {
                expected: self.config.channels,
                got: block.channels(),
            });
        }

        let Some(session) = self.session.as_mut() else {
            return Err(MeterError::NotMeasuring);
        };
        session.process(block);

        self.epoch += 1;
        self.blocks_since_report += 1;

        let reported = self.blocks_since_report >= self.config.report_interval_blocks;
        if reported {
            self.blocks_since_report = 0;
            let report = MeterReport {
                generation: self.generation,
                ..session.report(self.epoch)
            };
            self.reports.publish(report);
        }

        Ok(BlockOutcome {
            epoch: self.epoch,
            reported,
        })
    }

    /// Apply queued control requests; returns how many were applied
    pub fn poll_control(&mut self) -> usize {
        let mut applied = 0;
        while let Some(request) = self.control.pop() {
            match request {
                ControlRequest::Reset => self.reset(),
                ControlRequest::ResetPeaks => self.reset_peaks(),
            }
            applied += 1;
        }
        applied
    }

    /// Zero all measurement state and publish a floor report at epoch 0
    pub fn reset(&mut self) {
        if let Some(session) = self.session.as_mut() {
            session.reset();
        }
        self.publish_floor();
    }

    /// Clear peak maxima only
    pub fn reset_peaks(&mut self) {
        if let Some(session) = self.session.as_mut() {
            session.reset_peaks();
        }
    }

    /// Change the stream rate for the next `start()` (`Idle` or `Stopped` only)
    pub fn set_sample_rate(&mut self, sample_rate: u32) -> MeterResult<()> {
        if self.state == EngineState::Measuring {
            return Err(MeterError::SessionActive);
        }
        validate_sample_rate(sample_rate)?;

        if sample_rate != self.config.sample_rate {
            log::info!(
                "Sample rate changed: {} Hz -> {} Hz",
                self.config.sample_rate,
                sample_rate
            );
            self.config.sample_rate = sample_rate;
        }
        Ok(())
    }

    /// Tear the session down
    pub fn stop(&mut self) -> MeterResult<()> {
        if self.state != EngineState::Measuring {
            return Err(MeterError::NotMeasuring);
        }

        self.session = None;
        self.state = EngineState::Stopped;
        log::info!("Metering stopped after {} blocks", self.epoch);
        Ok(())
    }

    fn publish_floor(&mut self) {
        self.epoch = 0;
        self.generation += 1;
        self.blocks_since_report = 0;
        self.reports.publish(MeterReport {
            generation: self.generation,
            ..MeterReport::floor(&self.config, 0)
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn silence(frames: usize, channels: usize) -> Vec<f32> {
        vec![0.0; frames * channels]
    }

    #[test]
    fn test_lifecycle() {
        let (mut engine, mut handle) = MeteringEngine::new(MeterConfig::default()).unwrap();
        assert_eq!(engine.state(), EngineState::Idle);
        assert!(engine.session().is_none());

        engine.start().unwrap();
        assert_eq!(engine.state(), EngineState::Measuring);
        assert_eq!(handle.latest().unwrap().epoch, 0);

        assert!(matches!(engine.start(), Err(MeterError::SessionActive)));

        engine.stop().unwrap();
        assert_eq!(engine.state(), EngineState::Stopped);
        assert!(matches!(engine.stop(), Err(MeterError::NotMeasuring)));

        engine.start().unwrap();
        assert_eq!(engine.state(), EngineState::Measuring);
    }

    #[test]
    fn test_process_requires_measuring() {
        let (mut engine, _handle) = MeteringEngine::new(MeterConfig::default()).unwrap();
        let data = silence(256, 2);
        let block = SampleBlock::interleaved(&data, 2, 48_000).unwrap();
        assert!(matches!(engine.process(&block), Err(MeterError::NotMeasuring)));
    }

    #[test]
    fn test_report_interval() {
        let config = MeterConfig {
            report_interval_blocks: 3,
            ..MeterConfig::default()
        };
        let (mut engine, _handle) = MeteringEngine::new(config).unwrap();
        engine.start().unwrap();

        let data = silence(128, 2);
        let block = SampleBlock::interleaved(&data, 2, 48_000).unwrap();
        let reported: Vec<bool> = (0..7)
            .map(|_| engine.process(&block).unwrap().reported)
            .collect();
        assert_eq!(reported, vec![false, false, true, false, false, true, false]);
        assert_eq!(engine.epoch(), 7);
    }

    #[test]
    fn test_mismatched_blocks_rejected() {
        let (mut engine, _handle) = MeteringEngine::new(MeterConfig::default()).unwrap();
        engine.start().unwrap();

        let data = silence(128, 2);
        let wrong_rate = SampleBlock::interleaved(&data, 2, 44_100).unwrap();
        assert!(matches!(
            engine.process(&wrong_rate),
            Err(MeterError::SampleRateMismatch {
                expected: 48_000,
                got: 44_100
            })
        ));

        let mono = silence(128, 1);
        let wrong_channels = SampleBlock::interleaved(&mono, 1, 48_000).unwrap();
        assert!(matches!(
            engine.process(&wrong_channels),
            Err(MeterError::ChannelMismatch {
                expected: 2,
                got: 1
            })
        ));

        // Nothing was consumed
        assert_eq!(engine.epoch(), 0);
    }

    #[test]
    fn test_set_sample_rate() {
        let (mut engine, _handle) = MeteringEngine::new(MeterConfig::default()).unwrap();
        engine.set_sample_rate(44_100).unwrap();
        assert!(matches!(
            engine.set_sample_rate(1_000),
            Err(MeterError::InvalidSampleRate(1_000))
        ));

        engine.start().unwrap();
        assert_eq!(engine.config().sample_rate, 44_100);
        assert!(matches!(
            engine.set_sample_rate(48_000),
            Err(MeterError::SessionActive)
        ));

        engine.stop().unwrap();
        engine.set_sample_rate(96_000).unwrap();
        assert_eq!(engine.config().sample_rate, 96_000);
    }

    #[test]
    fn test_control_applied_at_block_boundary() {
        let config = MeterConfig {
            report_interval_blocks: 1,
            ..MeterConfig::default()
        };
        let (mut engine, mut handle) = MeteringEngine::new(config).unwrap();
        engine.start().unwrap();

        let data = silence(128, 2);
        let block = SampleBlock::interleaved(&data, 2, 48_000).unwrap();
        for _ in 0..5 {
            engine.process(&block).unwrap();
        }
        assert_eq!(handle.latest().unwrap().epoch, 5);

        handle.request_reset().unwrap();
        // Applied before the block is measured: epoch restarts at 1
        assert_eq!(engine.process(&block).unwrap().epoch, 1);

        handle.request_peak_reset().unwrap();
        assert_eq!(engine.poll_control(), 1);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = MeterConfig::new(48_000, 0);
        assert!(matches!(
            MeteringEngine::new(config),
            Err(MeterError::InvalidChannelCount(0))
        ));
    }
}
