//! RAII guard for a bracketed region of interest
use std::sync::{Arc, PoisonError};

use crate::instrument::{self, Instruments};

/// An open region on a set of instruments. Closing happens on drop.
///
/// Regions nest: the first region opened on a set starts every instrument, the
/// last one closed stops them. Inner regions only adjust the nesting depth.
#[derive(Debug)]
pub struct Region {
    /// The set this region was opened on, `None` when nothing was installed
    instruments: Option<Arc<Instruments>>,

    /// Name handed to the instruments
    name: &'static str,

    /// Whether this region emitted the start markers
    outermost: bool,
}

impl Region {
    pub(crate) fn new(instruments: Arc<Instruments>, name: &'static str) -> Self {
        let mut depth = instruments
            .depth
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        *depth += 1;
        let outermost = *depth == 1;

        // Regions opened on other threads wait here until every instrument runs
        if outermost {
            instruments.start_all(name);
        }

        drop(depth);

        Self {
            instruments: Some(instruments),
            name,
            outermost,
        }
    }

    /// Open a region on the globally installed instruments.
    ///
    /// Without installed instruments the region does nothing.
    #[must_use = "the region closes as soon as the guard is dropped"]
    pub fn global(name: &'static str) -> Self {
        match instrument::installed() {
            Some(instruments) => Self::new(instruments, name),
            None => Self {
                instruments: None,
                name,
                outermost: false,
            },
        }
    }

    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Whether this region started the instruments
    #[must_use]
    pub fn is_outermost(&self) -> bool {
        self.outermost
    }
}

impl Drop for Region {
    fn drop(&mut self) {
        let Some(instruments) = &self.instruments else {
            return;
        };

        let mut depth = instruments
            .depth
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        *depth = depth.saturating_sub(1);

        if *depth == 0 {
            if !self.outermost {
                tracing::warn!(
                    region = self.name,
                    "region closed after the region that opened it"
                );
            }

            instruments.stop_all(self.name);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instrument::{Instrument, Marker, Recorder};
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;

    /// A tool that takes a while to come up, like a profiler attaching
    #[derive(Default)]
    struct SlowStart {
        active: Arc<AtomicBool>,
    }

    impl Instrument for SlowStart {
        fn name(&self) -> &'static str {
            "slow"
        }

        fn start(&self, _region: &str) {
            std::thread::sleep(Duration::from_millis(100));
            self.active.store(true, Ordering::SeqCst);
        }

        fn stop(&self, _region: &str) {
            self.active.store(false, Ordering::SeqCst);
        }
    }

    #[test]
    fn test_outermost_flag() {
        let instruments = Arc::new(Instruments::new());

        let outer = instruments.enter("outer");
        let inner = instruments.enter("inner");

        assert!(outer.is_outermost());
        assert!(!inner.is_outermost());
        assert_eq!(inner.name(), "inner");
    }

    #[test]
    fn test_out_of_order_close_still_stops_once() {
        let recorder = Recorder::new("rec");
        let log = recorder.log();
        let instruments = Arc::new(Instruments::new().with(recorder));

        let outer = instruments.enter("outer");
        let inner = instruments.enter("inner");

        drop(outer);
        assert_eq!(log.lock().unwrap().len(), 1);

        drop(inner);
        let events = log.lock().unwrap().clone();
        assert_eq!(events.len(), 2);
        assert_eq!(events[1].marker, Marker::Stop);
        assert_eq!(events[1].region, "inner");
    }

    #[test]
    fn test_regions_across_threads() {
        let recorder = Recorder::new("rec");
        let log = recorder.log();
        let instruments = Arc::new(Instruments::new().with(recorder));

        let outer = instruments.enter("outer");

        std::thread::scope(|scope| {
            for _ in 0..4 {
                scope.spawn(|| {
                    let _inner = instruments.enter("worker");
                });
            }
        });

        drop(outer);

        let markers: Vec<Marker> = log.lock().unwrap().iter().map(|e| e.marker).collect();
        assert_eq!(markers, vec![Marker::Start, Marker::Stop]);
    }

    #[test]
    fn test_concurrent_region_waits_for_start() {
        let tool = SlowStart::default();
        let active = tool.active.clone();
        let instruments = Arc::new(Instruments::new().with(tool));

        std::thread::scope(|scope| {
            let outer = scope.spawn(|| {
                let _region = instruments.enter("A");
                std::thread::sleep(Duration::from_millis(200));
            });

            // Enter while the other thread is still starting the tool
            std::thread::sleep(Duration::from_millis(20));
            {
                let _inner = instruments.enter("B");
                assert!(active.load(Ordering::SeqCst), "body ran before the tool started");
            }

            outer.join().unwrap();
        });

        assert!(!active.load(Ordering::SeqCst));
        assert_eq!(instruments.sessions(), 1);
    }

    #[test]
    fn test_new_session_waits_for_stop() {
        let tool = SlowStart::default();
        let active = tool.active.clone();
        let instruments = Arc::new(Instruments::new().with(tool));

        for _ in 0..3 {
            std::thread::scope(|scope| {
                for _ in 0..4 {
                    scope.spawn(|| {
                        let _region = instruments.enter("worker");
                        assert!(active.load(Ordering::SeqCst));
                    });
                }
            });
        }

        assert!(!active.load(Ordering::SeqCst));
    }
}
