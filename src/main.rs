//! kaotrack - face tracking signal pipeline
//!
//! Main entry point for the replay CLI.

use anyhow::Context;
use clap::{Parser, ValueEnum};
use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::PathBuf;
use tracing::{debug, info, warn, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use kaotrack::{
    config::Config,
    replay::{self, CalibrationCommand, FrameFormat, ReplayPacket},
    Tracker,
};

/// kaotrack - replay landmark streams through the tracking pipeline
#[derive(Parser, Debug)]
#[command(name = "kaotrack", version, about, long_about = None)]
struct Args {
    /// JSON-lines landmark file (reads stdin when omitted)
    input: Option<PathBuf>,

    /// Configuration file path
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Calibrate from the first N face frames
    #[arg(long, value_name = "N")]
    calibrate: Option<usize>,

    /// Smoothing history weight (overrides config)
    #[arg(short, long, value_name = "WEIGHT")]
    smoothing: Option<f32>,

    /// Enable precision mode with this multiplier (overrides config)
    #[arg(short, long, value_name = "MULT")]
    precision: Option<f32>,

    /// Output encoding
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Json)]
    format: OutputFormat,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutputFormat {
    Json,
    Binary,
}

impl From<OutputFormat> for FrameFormat {
    fn from(format: OutputFormat) -> Self {
        match format {
            OutputFormat::Json => FrameFormat::Json,
            OutputFormat::Binary => FrameFormat::Binary,
        }
    }
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Logs go to stderr; stdout carries frames
    let log_level = if args.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(
            EnvFilter::builder()
                .with_default_directive(log_level.into())
                .from_env_lossy(),
        )
        .init();

    info!("Starting {} v{}", kaotrack::NAME, kaotrack::VERSION);

    let mut config = match &args.config {
        Some(path) => Config::from_file(path)?,
        None => Config::load()?,
    };

    if let Some(weight) = args.smoothing {
        config.smoothing.history_weight = weight;
    }

    if let Some(multiplier) = args.precision {
        config.precision.enabled = true;
        config.precision.multiplier = multiplier;
    }

    if let Some(samples) = args.calibrate {
        config.calibration.required_samples = samples;
        config.calibration.min_samples = config.calibration.min_samples.min(samples);
        config.calibration.auto_collect = true;
    }

    let tracker = Tracker::new(&config)?;
    tracker.initialize();

    if args.calibrate.is_some() {
        tracker.start_calibration();
    }

    let reader: Box<dyn BufRead> = match &args.input {
        Some(path) => Box::new(BufReader::new(
            File::open(path).with_context(|| format!("opening {}", path.display()))?,
        )),
        None => Box::new(io::stdin().lock()),
    };

    let stdout = io::stdout();
    let mut out = BufWriter::new(stdout.lock());
    let format = FrameFormat::from(args.format);
    let layout = config.extractor.layout;

    for (index, line) in reader.lines().enumerate() {
        let line = line?;
        let packet = match ReplayPacket::parse_line(&line) {
            Ok(Some(packet)) => packet,
            Ok(None) => continue,
            Err(e) => {
                warn!("Line {}: {}", index + 1, e);
                continue;
            }
        };

        match packet {
            ReplayPacket::Landmarks { landmarks, count } => {
                let count = replay::point_count(&landmarks, count, layout);
                let frame = tracker.process_frame(&landmarks, count);
                replay::write_frame(&mut out, &frame, format)?;
            }
            ReplayPacket::Calibrate { calibrate } => {
                handle_calibration(&tracker, calibrate);
            }
        }
    }

    out.flush()?;

    info!(
        "Processed {} frames ({})",
        tracker.frames_processed(),
        tracker.calibration_status()
    );
    Ok(())
}

fn handle_calibration(tracker: &Tracker, command: CalibrationCommand) {
    match command {
        CalibrationCommand::Start => tracker.start_calibration(),
        CalibrationCommand::Finish => {
            if let Err(e) = tracker.finish_calibration() {
                warn!("Cannot finish calibration: {}", e);
            }
        }
        CalibrationCommand::Abort => {
            if !tracker.abort_calibration() {
                debug!("Abort requested with no active calibration");
            }
        }
        CalibrationCommand::Reset => tracker.reset_calibration(),
    }
}
