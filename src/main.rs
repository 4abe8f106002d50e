use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use tracing_subscriber::EnvFilter;

use streamtrace::config::{DEFAULT_ARRAY_SIZE, DEFAULT_NTIMES, DEFAULT_SCALAR};
use streamtrace::instrument::{SDE_START_TAG, SDE_STOP_TAG};
use streamtrace::{
    Benchmark, Config, Instruments, LogMarks, MarkerConfig, Mode, Precision, Report, SdeMarks,
    StreamElement,
};

#[derive(Debug, Copy, Clone, ValueEnum)]
enum ModeArg {
    /// Only the triad kernel
    Triad,
    /// Copy, Scale, Add and Triad
    Stream,
}

#[derive(Debug, Copy, Clone, ValueEnum)]
enum PrecisionArg {
    F32,
    F64,
}

/// STREAM memory bandwidth benchmark with SDE and VTune region markers
#[derive(Debug, Parser)]
#[command(name = "streamtrace", version)]
struct Cli {
    /// Elements per array
    #[arg(long, env = "STREAM_ARRAY_SIZE", default_value_t = DEFAULT_ARRAY_SIZE)]
    array_size: usize,

    /// Outer iterations, the first one is not counted
    #[arg(long, env = "NTIMES", default_value_t = DEFAULT_NTIMES)]
    ntimes: usize,

    /// Scalar used by Scale and Triad
    #[arg(long, default_value_t = DEFAULT_SCALAR)]
    scalar: f64,

    /// Worker threads, 0 uses every core
    #[arg(long, env = "STREAM_THREADS", default_value_t = 0)]
    threads: usize,

    #[arg(long, value_enum, default_value_t = ModeArg::Triad)]
    mode: ModeArg,

    #[arg(long, value_enum, default_value_t = PrecisionArg::F64)]
    precision: PrecisionArg,

    /// Emit SDE SSC marks around the measured loop (the default)
    #[arg(long, overrides_with = "no_sde")]
    sde: bool,

    /// Do not emit SDE SSC marks
    #[arg(long, overrides_with = "sde")]
    no_sde: bool,

    /// Resume and pause VTune around the measured loop
    #[arg(long)]
    vtune: bool,

    /// SSC mark starting the SDE region
    #[arg(long, value_parser = parse_tag, default_value_t = SDE_START_TAG)]
    sde_start_tag: u32,

    /// SSC mark stopping the SDE region
    #[arg(long, value_parser = parse_tag, default_value_t = SDE_STOP_TAG)]
    sde_stop_tag: u32,

    /// Log when the region starts and stops
    #[arg(long)]
    log_markers: bool,

    /// Skip checking the arrays after the run
    #[arg(long)]
    no_validate: bool,
}

/// Accept tags as hex (`0x111`) or decimal
fn parse_tag(tag: &str) -> Result<u32, String> {
    let parsed = match tag.strip_prefix("0x").or_else(|| tag.strip_prefix("0X")) {
        Some(hex) => u32::from_str_radix(hex, 16),
        None => tag.parse::<u32>(),
    };

    parsed.map_err(|err| format!("invalid tag {tag:?}: {err}"))
}

impl Cli {
    fn config(&self) -> Config {
        Config {
            array_size: self.array_size,
            ntimes: self.ntimes,
            scalar: self.scalar,
            threads: self.threads,
            mode: match self.mode {
                ModeArg::Triad => Mode::Triad,
                ModeArg::Stream => Mode::Stream,
            },
            precision: match self.precision {
                PrecisionArg::F32 => Precision::F32,
                PrecisionArg::F64 => Precision::F64,
            },
            markers: MarkerConfig {
                sde: self.sde || !self.no_sde,
                vtune: self.vtune,
                log: self.log_markers,
                sde_start_tag: self.sde_start_tag,
                sde_stop_tag: self.sde_stop_tag,
            },
            validate: !self.no_validate,
        }
    }
}

/// Build the instrument set in start order: SDE, then VTune, then logging
fn instruments(markers: &MarkerConfig) -> Instruments {
    let mut instruments = Instruments::new();

    if markers.sde {
        instruments.push(SdeMarks {
            start_tag: markers.sde_start_tag,
            stop_tag: markers.sde_stop_tag,
        });
    }

    #[cfg(feature = "vtune")]
    if markers.vtune {
        instruments.push(streamtrace::Vtune);
    }

    if markers.log {
        instruments.push(LogMarks);
    }

    instruments
}

fn run<T: StreamElement>(config: Config) -> Result<Report> {
    let instruments = Arc::new(instruments(&config.markers));

    let mut bench =
        Benchmark::<T>::new(config, instruments).context("failed to set up the benchmark")?;

    bench.run().context("benchmark run failed")
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = cli.config();
    config.validate().context("invalid arguments")?;

    let report = match config.precision {
        Precision::F32 => run::<f32>(config)?,
        Precision::F64 => run::<f64>(config)?,
    };

    println!("{report}");

    report.ensure_valid()?;

    Ok(())
}
