//! Errors returned by the benchmark library

use thiserror::Error;

use crate::validate::ArrayCheck;

#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("failed to build a {threads}-thread pool: {source}")]
    ThreadPool {
        threads: usize,
        #[source]
        source: rayon::ThreadPoolBuildError,
    },

    #[error("cannot read page faults from /proc/self/stat: {0}")]
    PageFaults(String),

    #[error("page fault counts are only available on Linux")]
    PageFaultsUnsupported,

    #[error("solution failed validation: {}", describe_failures(.0))]
    Validation(Vec<ArrayCheck>),
}

fn describe_failures(failures: &[ArrayCheck]) -> String {
    failures
        .iter()
        .map(|check| {
            format!(
                "array {} expected {:e}, avg abs error {:e} ({} elements off)",
                check.name, check.expected, check.avg_abs_err, check.mismatches
            )
        })
        .collect::<Vec<_>>()
        .join("; ")
}

pub type Result<T> = std::result::Result<T, Error>;
