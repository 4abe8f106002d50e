//! The benchmark runner
use std::sync::Arc;
use std::time::Instant;

use rayon::{ThreadPool, ThreadPoolBuilder};
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::element::StreamElement;
use crate::error::{Error, Result};
use crate::instrument::Instruments;
use crate::kernels::{chunk_len, StreamArrays};
use crate::report::{KernelReport, Report};
use crate::stats::{KernelStats, Sample};
use crate::validate;
use crate::{clock_granularity, get_page_faults, rdtsc};

/// Name of the region bracketing the measured loop
pub const REGION_NAME: &str = "stream";

/// Passes shorter than this many clock ticks give unreliable timings
const MIN_TICKS: f64 = 20.0;

/// A configured benchmark owning its arrays and worker pool
pub struct Benchmark<T: StreamElement> {
    config: Config,

    scalar: T,

    /// Elements per worker per pass
    chunk: usize,

    pool: ThreadPool,

    arrays: StreamArrays<T>,

    /// Markers bracketing the measured loop
    instruments: Arc<Instruments>,
}

impl<T: StreamElement> Benchmark<T> {
    /// Validate `config`, build the worker pool and allocate the arrays
    ///
    /// # Errors
    ///
    /// * `config` is invalid
    /// * `config.precision` does not select `T`
    /// * the thread pool cannot be created
    pub fn new(config: Config, instruments: Arc<Instruments>) -> Result<Self> {
        config.validate()?;

        if config.precision != T::PRECISION {
            return Err(Error::InvalidConfig(format!(
                "precision {:?} does not match {} arrays",
                config.precision,
                T::NAME
            )));
        }

        let pool = ThreadPoolBuilder::new()
            .num_threads(config.threads)
            .thread_name(|index| format!("stream-{index}"))
            .build()
            .map_err(|source| Error::ThreadPool {
                threads: config.threads,
                source,
            })?;

        let threads = pool.current_num_threads();
        let chunk = chunk_len(config.array_size, threads);

        info!(
            array_size = config.array_size,
            element = T::NAME,
            threads,
            chunk,
            "allocating arrays"
        );

        let arrays = pool.install(|| StreamArrays::new(config.array_size, chunk));

        Ok(Self {
            scalar: T::from_f64(config.scalar),
            config,
            chunk,
            pool,
            arrays,
            instruments,
        })
    }

    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Number of workers running each pass
    #[must_use]
    pub fn threads(&self) -> usize {
        self.pool.current_num_threads()
    }

    #[must_use]
    pub fn arrays(&self) -> &StreamArrays<T> {
        &self.arrays
    }

    #[must_use]
    pub fn instruments(&self) -> &Arc<Instruments> {
        &self.instruments
    }

    /// Reinitialise the arrays, run the bracketed loop and report the results
    ///
    /// # Errors
    ///
    /// Currently never fails; validation failures are carried in the report
    /// and surfaced by [`Report::ensure_valid`].
    pub fn run(&mut self) -> Result<Report> {
        let Self {
            config,
            scalar,
            chunk,
            pool,
            arrays,
            instruments,
        } = self;

        let scalar = *scalar;
        let chunk = *chunk;
        let kernels = config.mode.kernels();

        pool.install(|| arrays.reset(chunk));

        // Estimate how many clock ticks a pass over one array takes
        let granularity_us = clock_granularity();
        let start = Instant::now();
        pool.install(|| arrays.double_a(chunk));
        let doubling_us = start.elapsed().as_secs_f64() * 1.0e6;

        info!(granularity_us, doubling_us, "clock check");

        if doubling_us / granularity_us < MIN_TICKS {
            warn!(
                ticks = doubling_us / granularity_us,
                "each pass takes fewer than {MIN_TICKS} clock ticks, increase the array size"
            );
        }

        let mut stats = vec![KernelStats::default(); kernels.len()];

        let faults_before = get_page_faults();

        {
            let _region = instruments.enter(REGION_NAME);

            pool.install(|| {
                for iteration in 0..config.ntimes {
                    for (kernel, stats) in kernels.iter().zip(stats.iter_mut()) {
                        let start = Instant::now();
                        let start_cycles = rdtsc();

                        kernel.run(arrays, scalar, chunk);

                        let sample = Sample {
                            cycles: rdtsc().wrapping_sub(start_cycles),
                            seconds: start.elapsed().as_secs_f64(),
                        };

                        debug!(iteration, kernel = kernel.label(), ?sample, "pass");

                        // The first iteration warms caches and page tables
                        if iteration > 0 {
                            stats.record(sample);
                        }
                    }
                }
            });
        }

        let page_faults = match (faults_before, get_page_faults()) {
            (Ok(before), Ok(after)) => Some(after.saturating_sub(before)),
            (Err(err), _) | (_, Err(err)) => {
                debug!(%err, "page faults unavailable");
                None
            }
        };

        let validation = config.validate.then(|| {
            let validation = validate::check(arrays, kernels, config.ntimes, scalar);

            if validation.passed() {
                info!(epsilon = validation.epsilon, "solution validates");
            } else {
                warn!(failures = ?validation.failures(), "solution failed validation");
            }

            validation
        });

        let kernels = kernels
            .iter()
            .zip(stats)
            .map(|(&kernel, stats)| KernelReport {
                kernel,
                bytes: kernel.bytes_moved::<T>(arrays.len()),
                stats,
            })
            .collect();

        Ok(Report {
            element: T::NAME,
            element_size: T::size(),
            array_size: arrays.len(),
            ntimes: config.ntimes,
            threads: pool.current_num_threads(),
            mode: config.mode,
            scalar: scalar.to_f64(),
            granularity_us,
            doubling_us,
            kernels,
            instruments: instruments.names(),
            sessions: instruments.sessions(),
            page_faults,
            validation,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Mode, Precision};
    use crate::instrument::{Marker, Recorder};
    use crate::kernels::Kernel;

    fn small_config(mode: Mode) -> Config {
        Config {
            array_size: 10_000,
            ntimes: 4,
            threads: 3,
            mode,
            ..Config::default()
        }
    }

    #[test]
    fn test_run_triad() {
        let recorder = Recorder::new("rec");
        let log = recorder.log();
        let instruments = Arc::new(Instruments::new().with(recorder));

        let mut bench = Benchmark::<f64>::new(small_config(Mode::Triad), instruments).unwrap();
        assert_eq!(bench.threads(), 3);

        let report = bench.run().unwrap();

        assert_eq!(report.kernels.len(), 1);
        assert_eq!(report.kernels[0].kernel, Kernel::Triad);
        assert_eq!(report.kernels[0].stats.count, 3);
        assert_eq!(report.kernels[0].bytes, 3 * 8 * 10_000);
        assert_eq!(report.sessions, 1);
        assert!(report.ensure_valid().is_ok());

        let events = log.lock().unwrap().clone();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].marker, Marker::Start);
        assert_eq!(events[1].marker, Marker::Stop);
        assert!(events.iter().all(|event| event.region == REGION_NAME));
    }

    #[test]
    fn test_run_twice_revalidates() {
        let config = Config {
            precision: Precision::F32,
            ..small_config(Mode::Stream)
        };
        let mut bench = Benchmark::<f32>::new(config, Arc::new(Instruments::new())).unwrap();

        for _ in 0..2 {
            let report = bench.run().unwrap();
            assert_eq!(report.kernels.len(), 4);
            assert!(report.ensure_valid().is_ok());
        }

        assert_eq!(bench.instruments().sessions(), 2);
    }

    #[test]
    fn test_no_validation() {
        let config = Config {
            validate: false,
            ..small_config(Mode::Triad)
        };

        let report = Benchmark::<f64>::new(config, Arc::new(Instruments::new()))
            .unwrap()
            .run()
            .unwrap();

        assert!(report.validation.is_none());
        assert!(report.ensure_valid().is_ok());
    }

    #[test]
    fn test_invalid_config() {
        let config = Config {
            ntimes: 1,
            ..Config::default()
        };

        assert!(matches!(
            Benchmark::<f64>::new(config, Arc::new(Instruments::new())),
            Err(Error::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_precision_must_match_element() {
        let config = Config {
            precision: Precision::F32,
            ..small_config(Mode::Triad)
        };

        assert!(matches!(
            Benchmark::<f64>::new(config, Arc::new(Instruments::new())),
            Err(Error::InvalidConfig(_))
        ));
        assert!(Benchmark::<f32>::new(config, Arc::new(Instruments::new())).is_ok());
    }
}
