//! Benchmark configuration
use crate::error::{Error, Result};
use crate::instrument::{SDE_START_TAG, SDE_STOP_TAG};
use crate::kernels::Kernel;

/// Array length used when none is given
pub const DEFAULT_ARRAY_SIZE: usize = 10_000_000;

/// Outer iterations used when none are given
pub const DEFAULT_NTIMES: usize = 10;

/// Scalar used by Scale and Triad
pub const DEFAULT_SCALAR: f64 = 3.0;

/// Which kernels each outer iteration runs
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub enum Mode {
    /// Only `a = b + scalar * c`
    #[default]
    Triad,

    /// Copy, Scale, Add and Triad in order
    Stream,
}

impl Mode {
    #[must_use]
    pub fn kernels(self) -> &'static [Kernel] {
        match self {
            Mode::Triad => &[Kernel::Triad],
            Mode::Stream => &Kernel::ALL,
        }
    }
}

/// Element type of the arrays
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub enum Precision {
    F32,
    #[default]
    F64,
}

/// Which instruments bracket the measured loop
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct MarkerConfig {
    /// Emit SSC marks for SDE
    pub sde: bool,

    /// Resume and pause VTune (needs the `vtune` feature)
    pub vtune: bool,

    /// Log region boundaries
    pub log: bool,

    pub sde_start_tag: u32,
    pub sde_stop_tag: u32,
}

impl Default for MarkerConfig {
    fn default() -> Self {
        Self {
            sde: true,
            vtune: false,
            log: false,
            sde_start_tag: SDE_START_TAG,
            sde_stop_tag: SDE_STOP_TAG,
        }
    }
}

/// Everything a benchmark run needs
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Config {
    /// Elements per array
    pub array_size: usize,

    /// Outer iterations; the first one is not counted
    pub ntimes: usize,

    pub scalar: f64,

    /// Worker threads, 0 for the rayon default
    pub threads: usize,

    pub mode: Mode,

    pub precision: Precision,

    pub markers: MarkerConfig,

    /// Check the arrays after the run
    pub validate: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            array_size: DEFAULT_ARRAY_SIZE,
            ntimes: DEFAULT_NTIMES,
            scalar: DEFAULT_SCALAR,
            threads: 0,
            mode: Mode::default(),
            precision: Precision::default(),
            markers: MarkerConfig::default(),
            validate: true,
        }
    }
}

impl Config {
    /// Reject configurations that cannot produce a meaningful run
    pub fn validate(&self) -> Result<()> {
        if self.array_size == 0 {
            return Err(Error::InvalidConfig("array size must be positive".into()));
        }

        if self.ntimes < 2 {
            return Err(Error::InvalidConfig(format!(
                "ntimes must be at least 2 since the first iteration is discarded, got {}",
                self.ntimes
            )));
        }

        if !self.scalar.is_finite() {
            return Err(Error::InvalidConfig(format!(
                "scalar must be finite, got {}",
                self.scalar
            )));
        }

        if self.markers.sde && self.markers.sde_start_tag == self.markers.sde_stop_tag {
            return Err(Error::InvalidConfig(format!(
                "SDE start and stop tags are both {:#x}",
                self.markers.sde_start_tag
            )));
        }

        if self.markers.vtune && !cfg!(feature = "vtune") {
            return Err(Error::InvalidConfig(
                "VTune markers need the `vtune` feature".into(),
            ));
        }

        Ok(())
    }
}
