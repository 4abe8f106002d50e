//! Numeric element types the kernels can run on
use std::fmt::Debug;
use std::ops::{Add, Mul};

use crate::config::Precision;

/// An array element for the STREAM kernels
pub trait StreamElement:
    Copy + Debug + PartialEq + Send + Sync + Add<Output = Self> + Mul<Output = Self> + 'static
{
    /// Short type name shown in the report
    const NAME: &'static str;

    /// The configured precision selecting this type
    const PRECISION: Precision;

    /// Largest tolerated relative average error during validation
    const EPSILON: f64;

    fn from_f64(value: f64) -> Self;

    fn to_f64(self) -> f64;

    /// Size of one element in bytes
    #[must_use]
    fn size() -> usize {
        std::mem::size_of::<Self>()
    }
}

impl StreamElement for f64 {
    const NAME: &'static str = "f64";
    const PRECISION: Precision = Precision::F64;
    const EPSILON: f64 = 1.0e-13;

    fn from_f64(value: f64) -> Self {
        value
    }

    fn to_f64(self) -> f64 {
        self
    }
}

impl StreamElement for f32 {
    const NAME: &'static str = "f32";
    const PRECISION: Precision = Precision::F32;
    const EPSILON: f64 = 1.0e-6;

    #[allow(clippy::cast_possible_truncation)]
    fn from_f64(value: f64) -> Self {
        value as f32
    }

    fn to_f64(self) -> f64 {
        f64::from(self)
    }
}
