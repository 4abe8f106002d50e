//! Benchmark results and their STREAM style rendering
use std::fmt;

use crate::config::Mode;
use crate::error::{Error, Result};
use crate::kernels::Kernel;
use crate::stats::KernelStats;
use crate::validate::Validation;

const MEBIBYTE: f64 = 1024.0 * 1024.0;

const SEPARATOR: &str =
    "-------------------------------------------------------------";

/// Timings of one kernel
#[derive(Debug, Clone, PartialEq)]
pub struct KernelReport {
    pub kernel: Kernel,

    /// Bytes moved by one pass
    pub bytes: u64,

    pub stats: KernelStats,
}

impl KernelReport {
    /// Best observed rate in MB/s
    #[must_use]
    pub fn best_rate_mbs(&self) -> f64 {
        self.stats.best_rate_mbs(self.bytes)
    }
}

/// Everything a benchmark run measured
#[derive(Debug, Clone, PartialEq)]
pub struct Report {
    /// Element type name
    pub element: &'static str,

    /// Bytes per element
    pub element_size: usize,

    /// Elements per array
    pub array_size: usize,

    pub ntimes: usize,

    pub threads: usize,

    pub mode: Mode,

    pub scalar: f64,

    /// Smallest observable clock step in microseconds
    pub granularity_us: f64,

    /// Duration of the `a = 2 * a` pass in microseconds
    pub doubling_us: f64,

    pub kernels: Vec<KernelReport>,

    /// Instruments bracketing the loop, in start order
    pub instruments: Vec<&'static str>,

    /// Outermost regions entered on the instruments so far
    pub sessions: u64,

    /// Page faults taken inside the region, when the platform reports them
    pub page_faults: Option<u64>,

    /// `None` when validation was skipped
    pub validation: Option<Validation>,
}

impl Report {
    /// The report line for `kernel`, if it ran
    #[must_use]
    pub fn kernel(&self, kernel: Kernel) -> Option<&KernelReport> {
        self.kernels.iter().find(|report| report.kernel == kernel)
    }

    /// Fail when validation ran and did not pass
    ///
    /// # Errors
    ///
    /// * [`Error::Validation`] listing the arrays that were off
    pub fn ensure_valid(&self) -> Result<()> {
        match &self.validation {
            Some(validation) if !validation.passed() => {
                Err(Error::Validation(validation.failures()))
            }
            _ => Ok(()),
        }
    }
}

impl fmt::Display for Report {
    #[allow(clippy::cast_precision_loss)]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let array_bytes = (self.array_size * self.element_size) as f64;

        writeln!(f, "{SEPARATOR}")?;
        writeln!(
            f,
            "This system uses {} bytes per array element ({}).",
            self.element_size, self.element
        )?;
        writeln!(f, "{SEPARATOR}")?;
        writeln!(f, "Array size = {} (elements)", self.array_size)?;
        writeln!(
            f,
            "Memory per array = {:.1} MiB (= {:.1} GiB).",
            array_bytes / MEBIBYTE,
            array_bytes / MEBIBYTE / 1024.0
        )?;
        writeln!(
            f,
            "Total memory required = {:.1} MiB (= {:.1} GiB).",
            3.0 * array_bytes / MEBIBYTE,
            3.0 * array_bytes / MEBIBYTE / 1024.0
        )?;
        writeln!(
            f,
            "Each kernel will be executed {} times ({:?} mode, scalar {}).",
            self.ntimes, self.mode, self.scalar
        )?;
        writeln!(
            f,
            " The *best* time for each kernel (excluding the first iteration)"
        )?;
        writeln!(f, " will be used to compute the reported bandwidth.")?;
        writeln!(f, "Number of threads = {}", self.threads)?;
        writeln!(f, "{SEPARATOR}")?;
        writeln!(
            f,
            "Your clock granularity appears to be {:.3} microseconds.",
            self.granularity_us
        )?;
        writeln!(
            f,
            "Each test below will take on the order of {:.0} microseconds.",
            self.doubling_us
        )?;
        writeln!(
            f,
            "   (= {:.0} clock ticks)",
            self.doubling_us / self.granularity_us
        )?;
        writeln!(f, "{SEPARATOR}")?;

        // Markers
        if self.instruments.is_empty() {
            writeln!(f, "Region markers: none")?;
        } else {
            writeln!(
                f,
                "Region markers: {} ({} session{})",
                self.instruments.join(" -> "),
                self.sessions,
                if self.sessions == 1 { "" } else { "s" }
            )?;
        }

        if let Some(faults) = self.page_faults {
            writeln!(f, "Page faults inside the region: {faults}")?;
        }

        writeln!(f, "{SEPARATOR}")?;

        // Kernel table
        writeln!(
            f,
            "{:<9} {:>14} {:>11} {:>11} {:>11} {:>14}",
            "Function", "Best Rate MB/s", "Avg time", "Min time", "Max time", "Min cycles"
        )?;

        for report in &self.kernels {
            let label = format!("{}:", report.kernel.label());
            let stats = &report.stats;

            writeln!(
                f,
                "{label:<9} {:>14.1} {:>11.6} {:>11.6} {:>11.6} {:>14}",
                report.best_rate_mbs(),
                stats.avg_time(),
                if stats.count == 0 { 0.0 } else { stats.min_time },
                stats.max_time,
                if stats.count == 0 { 0 } else { stats.min_cycles },
            )?;
        }

        writeln!(f, "{SEPARATOR}")?;

        // Validation
        match &self.validation {
            None => writeln!(f, "Solution not validated")?,
            Some(validation) if validation.passed() => writeln!(
                f,
                "Solution Validates: avg error less than {:e} on all three arrays",
                validation.epsilon
            )?,
            Some(validation) => {
                for check in validation.failures() {
                    writeln!(
                        f,
                        "Failed Validation on array {}: expected {:e}, avg abs error {:e}, {} elements off",
                        check.name, check.expected, check.avg_abs_err, check.mismatches
                    )?;
                }
            }
        }

        write!(f, "{SEPARATOR}")
    }
}
