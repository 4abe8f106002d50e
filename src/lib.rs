//! STREAM memory bandwidth kernels bracketed by profiler region markers
//!
//! The measured loop of a [`Benchmark`] runs inside a [`Region`] opened on an
//! [`Instruments`] set, so external tools (SDE traces, VTune sampling) only see
//! the kernels:
//!
//! ```no_run
//! use std::sync::Arc;
//! use streamtrace::{Benchmark, Config, Instruments, SdeMarks};
//!
//! let instruments = Arc::new(Instruments::new().with(SdeMarks::default()));
//! let mut bench = Benchmark::<f64>::new(Config::default(), instruments)?;
//! let report = bench.run()?;
//! println!("{report}");
//! # Ok::<(), streamtrace::Error>(())
//! ```
//!
//! Code outside the benchmark can be bracketed with the `region!` macro or the
//! `#[region_fn]` attribute once instruments are installed with
//! [`instrument::install`].
#[cfg(target_os = "linux")]
use std::io::Read;
use std::time::Instant;

mod macros;

pub mod bench;
pub mod config;
pub mod element;
pub mod error;
pub mod instrument;
pub mod kernels;
pub mod region;
pub mod report;
pub mod stats;
pub mod validate;

pub use bench::Benchmark;
pub use config::{Config, MarkerConfig, Mode, Precision};
pub use element::StreamElement;
pub use error::{Error, Result};
pub use instrument::{Instrument, Instruments, LogMarks, Marker, MarkerEvent, Recorder, SdeMarks};
#[cfg(feature = "vtune")]
pub use instrument::Vtune;
pub use kernels::{Kernel, StreamArrays};
pub use region::Region;
pub use report::Report;

pub use streamtrace_proc_macro::*;

// Check to ensure the region macros are explictly enabled or disabled
#[cfg(not(any(feature = "enable", feature = "disable")))]
compile_error!("Turn on the `enable` or `disable` feature");

/// Get the page faults of the current process
///
/// # Errors
///
/// * `/proc/self/stat` cannot be read or parsed
#[cfg(target_os = "linux")]
pub fn get_page_faults() -> Result<u64> {
    let mut proc_stat = [0u8; 0x400];

    let mut file = std::fs::File::open("/proc/self/stat")
        .map_err(|err| Error::PageFaults(err.to_string()))?;

    // Read the file into the stack buffer
    let bytes_read = file
        .read(&mut proc_stat)
        .map_err(|err| Error::PageFaults(err.to_string()))?;

    // The command name may contain spaces, so fields are counted from its closing paren
    let stat = &proc_stat[..bytes_read];
    let after_comm = stat
        .iter()
        .rposition(|byte| *byte == b')')
        .ok_or_else(|| Error::PageFaults("missing command name".into()))?;

    // state, ppid, pgrp, session, tty_nr, tpgid, flags, then minflt
    let mut stats = stat[after_comm + 1..]
        .split(|byte| *byte == b' ')
        .filter(|field| !field.is_empty())
        .skip(7);

    let mut parse_field = |label: &str| -> Result<u64> {
        let field = stats
            .next()
            .ok_or_else(|| Error::PageFaults(format!("missing {label}")))?;

        std::str::from_utf8(field)
            .ok()
            .and_then(|field| field.parse::<u64>().ok())
            .ok_or_else(|| Error::PageFaults(format!("unparsable {label}")))
    };

    let minor_page_faults = parse_field("minflt")?;
    let _cminflt = parse_field("cminflt")?;
    let major_page_faults = parse_field("majflt")?;

    Ok(minor_page_faults + major_page_faults)
}

/// Page faults are read from procfs, which only Linux has
#[cfg(not(target_os = "linux"))]
pub fn get_page_faults() -> Result<u64> {
    Err(Error::PageFaultsUnsupported)
}

#[cfg(target_arch = "x86_64")]
pub(crate) fn rdtsc() -> u64 {
    // SAFETY: rdtsc is available on every x86_64 CPU
    unsafe { core::arch::x86_64::_rdtsc() }
}

/// Nanoseconds since the first call, standing in for the timestamp counter
#[cfg(not(target_arch = "x86_64"))]
pub(crate) fn rdtsc() -> u64 {
    lazy_static::lazy_static! {
        static ref EPOCH: Instant = Instant::now();
    }

    u64::try_from(EPOCH.elapsed().as_nanos()).unwrap_or(u64::MAX)
}

/// Smallest nonzero step of the wall clock in microseconds, over 20 samples
#[must_use]
pub fn clock_granularity() -> f64 {
    const SAMPLES: usize = 20;

    let mut best = f64::MAX;

    for _ in 0..SAMPLES {
        let start = Instant::now();
        let mut elapsed = start.elapsed();
        while elapsed.is_zero() {
            elapsed = start.elapsed();
        }

        best = best.min(elapsed.as_secs_f64() * 1.0e6);
    }

    best
}
