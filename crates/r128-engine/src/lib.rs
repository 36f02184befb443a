//! r128-engine: real-time metering engine
//!
//! Owns the measurement session on the processing thread and exchanges
//! data with a non-real-time consumer through two lock-free channels:
//!
//! - reports: triple buffer, engine → consumer, latest value wins
//! - control: `rtrb` SPSC queue, consumer → engine, applied at block boundaries
//!
//! ## Usage
//!
//! ```rust,ignore
//! use r128_engine::{MeteringEngine, ToneSource, drive};
//!
//! let (mut engine, mut handle) = MeteringEngine::new(MeterConfig::default())?;
//! engine.start()?;
//!
//! let mut source = ToneSource::new(48_000, 2, 1_000.0, -23.0)?.with_duration(10.0);
//! drive(&mut engine, &mut source, &mut vec![0.0; 2 * 1024])?;
//!
//! let report = handle.latest();
//! ```

pub mod control;
pub mod engine;
pub mod report;
pub mod session;
pub mod source;

pub use control::{control_channel, ControlReceiver, ControlRequest, ControlSender};
pub use engine::{BlockOutcome, EngineState, MeterHandle, MeteringEngine};
pub use report::{report_channel, DataGap, Delivery, MeterReader, MeterReport, ReportReader, ReportWriter};
pub use session::{LoudnessSnapshot, MeteringSession, PeakState};
pub use source::{drive, BlockSource, DriveSummary, NoiseSource, SilenceSource, ToneSource};

pub use r128_core::{MeterConfig, MeterError, MeterResult, SampleBlock, TruePeakMode};
