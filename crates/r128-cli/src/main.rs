//! r128-meter: command-line loudness meter
//!
//! Usage:
//!   r128-meter --signal sine --freq 1000 --level-dbfs -23 --seconds 10
//!   r128-meter --signal noise --channels 2 --json
//!   r128-meter --config meter.json --realtime
//!
//! The engine runs on a producer thread fed by a generated block source;
//! the main thread consumes reports and prints them.

use std::path::PathBuf;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context, Result, bail};
use clap::{Parser, ValueEnum};

use r128_core::{MeterConfig, TruePeakMode};
use r128_engine::{
    drive, BlockSource, DriveSummary, MeterReport, MeteringEngine, NoiseSource, SilenceSource,
    ToneSource,
};

#[derive(Parser, Debug)]
#[command(name = "r128-meter", about = "EBU R128 / BS.1770 loudness meter")]
struct Cli {
    /// JSON meter config (flags below override it)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Stream sample rate (Hz)
    #[arg(long)]
    sample_rate: Option<u32>,

    /// Channel count
    #[arg(long)]
    channels: Option<usize>,

    /// Frames per processed block
    #[arg(long, default_value_t = 1024)]
    block_frames: usize,

    /// Signal length in seconds
    #[arg(short, long, default_value_t = 10.0)]
    seconds: f64,

    /// Test signal
    #[arg(long, value_enum, default_value_t = Signal::Sine)]
    signal: Signal,

    /// Tone frequency (Hz)
    #[arg(long, default_value_t = 1000.0)]
    freq: f64,

    /// Signal peak level (dBFS)
    #[arg(long, default_value_t = -23.0, allow_negative_numbers = true)]
    level_dbfs: f64,

    /// Publish a report every N blocks
    #[arg(long)]
    interval: Option<u32>,

    /// True peak estimator
    #[arg(long, value_enum)]
    true_peak: Option<PeakMode>,

    /// Print reports as JSON lines
    #[arg(long)]
    json: bool,

    /// Pace blocks at wall-clock rate
    #[arg(long)]
    realtime: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum Signal {
    Sine,
    Noise,
    Silence,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum PeakMode {
    Polyphase,
    Linear,
}

impl From<PeakMode> for TruePeakMode {
    fn from(mode: PeakMode) -> Self {
        match mode {
            PeakMode::Polyphase => TruePeakMode::Polyphase,
            PeakMode::Linear => TruePeakMode::Linear,
        }
    }
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    let config = build_config(&cli)?;
    log::info!(
        "Metering {:?} for {:.1} s at {} Hz, {} ch",
        cli.signal,
        cli.seconds,
        config.sample_rate,
        config.channels
    );

    let source = make_source(&cli, &config)?;
    let source: Box<dyn BlockSource + Send> = if cli.realtime {
        Box::new(Paced::new(source))
    } else {
        source
    };

    let (engine, handle) = MeteringEngine::new(config.clone()).context("Invalid meter config")?;
    let (mut reader, _control) = handle.into_parts();

    let block_len = cli.block_frames * config.channels;
    let producer = thread::Builder::new()
        .name("r128-engine".into())
        .spawn(move || run_engine(engine, source, block_len))
        .context("Failed to spawn engine thread")?;

    let mut last: Option<MeterReport> = None;
    let mut emit = |report: MeterReport| -> Result<()> {
        print_report(&report, cli.json)?;
        last = Some(report);
        Ok(())
    };

    while !producer.is_finished() {
        match reader.poll() {
            Some(delivery) => emit(delivery.report)?,
            None => thread::sleep(Duration::from_millis(5)),
        }
    }

    let summary = producer
        .join()
        .map_err(|_| anyhow::anyhow!("Engine thread panicked"))??;
    if let Some(delivery) = reader.poll() {
        emit(delivery.report)?;
    }

    log::info!(
        "Processed {} blocks ({} frames), {} reports, {} gaps",
        summary.blocks,
        summary.frames,
        summary.reports,
        reader.gap_count()
    );

    if !cli.json {
        if let Some(report) = last {
            println!();
            print_summary(&report);
        }
    }

    Ok(())
}

/// Config file (if any) with command-line overrides applied
fn build_config(cli: &Cli) -> Result<MeterConfig> {
    let mut config = match &cli.config {
        Some(path) => MeterConfig::from_json_file(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => MeterConfig::default(),
    };

    if let Some(rate) = cli.sample_rate {
        config.sample_rate = rate;
    }
    if let Some(channels) = cli.channels {
        config.channels = channels;
        if config.channel_weights.len() != channels {
            config.channel_weights.clear();
        }
    }
    if let Some(interval) = cli.interval {
        config.report_interval_blocks = interval;
    }
    if let Some(mode) = cli.true_peak {
        config.true_peak_mode = mode.into();
    }

    if cli.block_frames == 0 {
        bail!("--block-frames must be at least 1");
    }
    if !(cli.seconds.is_finite() && cli.seconds > 0.0) {
        bail!("--seconds must be a positive number");
    }

    config.validate().context("Invalid meter config")?;
    Ok(config)
}

fn make_source(cli: &Cli, config: &MeterConfig) -> Result<Box<dyn BlockSource + Send>> {
    let (rate, channels) = (config.sample_rate, config.channels);
    let source: Box<dyn BlockSource + Send> = match cli.signal {
        Signal::Sine => Box::new(
            ToneSource::new(rate, channels, cli.freq, cli.level_dbfs)?.with_duration(cli.seconds),
        ),
        Signal::Noise => Box::new(
            NoiseSource::new(rate, channels, cli.level_dbfs, 0x5EED)?.with_duration(cli.seconds),
        ),
        Signal::Silence => {
            Box::new(SilenceSource::new(rate, channels)?.with_duration(cli.seconds))
        }
    };
    Ok(source)
}

fn run_engine(
    mut engine: MeteringEngine,
    mut source: Box<dyn BlockSource + Send>,
    block_len: usize,
) -> Result<DriveSummary> {
    let mut buffer = vec![0.0f32; block_len];
    engine.start()?;
    let summary = drive(&mut engine, source.as_mut(), &mut buffer)?;
    engine.stop()?;
    Ok(summary)
}

/// Releases blocks no faster than their playback duration
struct Paced<S> {
    inner: S,
    started: Option<Instant>,
    frames: u64,
}

impl<S: BlockSource> Paced<S> {
    fn new(inner: S) -> Self {
        Self {
            inner,
            started: None,
            frames: 0,
        }
    }
}

impl<S: BlockSource> BlockSource for Paced<S> {
    fn sample_rate(&self) -> u32 {
        self.inner.sample_rate()
    }

    fn channels(&self) -> usize {
        self.inner.channels()
    }

    fn fill(&mut self, buffer: &mut [f32]) -> usize {
        let started = *self.started.get_or_insert_with(Instant::now);
        let due = Duration::from_secs_f64(self.frames as f64 / self.inner.sample_rate() as f64);
        if let Some(wait) = due.checked_sub(started.elapsed()) {
            thread::sleep(wait);
        }
        let frames = self.inner.fill(buffer);
        self.frames += frames as u64;
        frames
    }
}

fn print_report(report: &MeterReport, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string(report)?);
    } else {
        println!("{}", format_report(report));
    }
    Ok(())
}

fn format_report(r: &MeterReport) -> String {
    format!(
        "[{:>6}] M {:>6.1}  S {:>6.1}  I {:>6.1} LUFS  LRA {:>4.1} LU  TP {:>6.1} dBTP  corr {:>5.2}  width {:>5.1}%",
        r.epoch,
        r.momentary_lufs,
        r.short_term_lufs,
        r.integrated_lufs,
        r.lra,
        r.true_peak_db,
        r.correlation,
        r.width_pct
    )
}

fn print_summary(r: &MeterReport) {
    println!("Integrated loudness : {:>7.1} LUFS", r.integrated_lufs);
    println!("Loudness range      : {:>7.1} LU", r.lra);
    println!("Momentary max       : {:>7.1} LUFS", r.momentary_max_lufs);
    println!("Short-term max      : {:>7.1} LUFS", r.short_term_max_lufs);
    println!("True peak           : {:>7.1} dBTP", r.true_peak_db);
    println!("Sample peak         : {:>7.1} dBFS", r.sample_peak_db);
    println!("RMS                 : {:>7.1} dBFS", r.rms_db);
    println!("PLR                 : {:>7.1} LU", r.plr_db);
    println!("Headroom            : {:>7.1} dB", r.headroom_db);
    println!("Noise floor         : {:>7.1} dBFS", r.noise_floor_db);
    println!("Correlation         : {:>7.2}", r.correlation);
    println!("Width               : {:>7.1} %", r.width_pct);
}
