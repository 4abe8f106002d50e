//! Profiler collaborators that bracket a region of interest
//!
//! An [`Instrument`] is an opaque start/stop pair. Calls return nothing and are
//! assumed to succeed. Several instruments are combined into an ordered
//! [`Instruments`] set: starts run in insertion order, stops in reverse order,
//! so `[sde, vtune]` produces SDE start, VTune resume, ..., VTune pause, SDE
//! stop.
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use lazy_static::lazy_static;

use crate::region::Region;

/// A start/stop profiler marker pair
pub trait Instrument: Send + Sync {
    /// Name shown in the report and in logs
    fn name(&self) -> &'static str;

    /// Begin collection for `region`
    fn start(&self, region: &str);

    /// End collection for `region`
    fn stop(&self, region: &str);
}

/// SDE start tag used by the Intel tools
pub const SDE_START_TAG: u32 = 0x111;

/// SDE stop tag used by the Intel tools
pub const SDE_STOP_TAG: u32 = 0x222;

/// Emits SSC marks that an SDE trace uses to bound its region of interest
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct SdeMarks {
    pub start_tag: u32,
    pub stop_tag: u32,
}

impl Default for SdeMarks {
    fn default() -> Self {
        Self {
            start_tag: SDE_START_TAG,
            stop_tag: SDE_STOP_TAG,
        }
    }
}

impl Instrument for SdeMarks {
    fn name(&self) -> &'static str {
        "sde"
    }

    fn start(&self, _region: &str) {
        ssc_mark(self.start_tag);
    }

    fn stop(&self, _region: &str) {
        ssc_mark(self.stop_tag);
    }
}

/// Place an SSC mark carrying `tag` in the instruction stream.
///
/// The mark is `mov ebx, tag` followed by the `fs addr32 nop` byte sequence.
/// `rbx` is reserved by LLVM, so it is saved and restored around the mark.
#[cfg(target_arch = "x86_64")]
#[inline(always)]
pub fn ssc_mark(tag: u32) {
    // SAFETY: rbx is restored before the block ends and the nop has no effect
    // on memory, the stack or flags.
    unsafe {
        core::arch::asm!(
            "mov {saved}, rbx",
            "mov ebx, {tag:e}",
            ".byte 0x64, 0x67, 0x90",
            "mov rbx, {saved}",
            tag = in(reg) tag,
            saved = out(reg) _,
            options(nostack, preserves_flags),
        );
    }
}

/// SSC marks only exist on x86_64
#[cfg(not(target_arch = "x86_64"))]
#[inline(always)]
pub fn ssc_mark(_tag: u32) {}

/// Toggles VTune sampling through the ITT API
#[cfg(feature = "vtune")]
#[derive(Debug, Default, Copy, Clone)]
pub struct Vtune;

#[cfg(feature = "vtune")]
impl Instrument for Vtune {
    fn name(&self) -> &'static str {
        "vtune"
    }

    fn start(&self, _region: &str) {
        ittapi::resume();
    }

    fn stop(&self, _region: &str) {
        ittapi::pause();
    }
}

/// Logs region boundaries
#[derive(Debug, Default, Copy, Clone)]
pub struct LogMarks;

impl Instrument for LogMarks {
    fn name(&self) -> &'static str {
        "log"
    }

    fn start(&self, region: &str) {
        tracing::info!(region, "region start");
    }

    fn stop(&self, region: &str) {
        tracing::info!(region, "region stop");
    }
}

/// Which side of a region a marker belongs to
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Marker {
    Start,
    Stop,
}

/// A marker observed by a [`Recorder`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarkerEvent {
    pub instrument: &'static str,
    pub marker: Marker,
    pub region: String,
}

/// Remembers every marker it receives
#[derive(Debug)]
pub struct Recorder {
    name: &'static str,
    events: Arc<Mutex<Vec<MarkerEvent>>>,
}

impl Recorder {
    #[must_use]
    pub fn new(name: &'static str) -> Self {
        Self::with_log(name, Arc::default())
    }

    /// Create a recorder appending to a log shared with other recorders
    #[must_use]
    pub fn with_log(name: &'static str, events: Arc<Mutex<Vec<MarkerEvent>>>) -> Self {
        Self { name, events }
    }

    /// Shared handle to the recorded events
    #[must_use]
    pub fn log(&self) -> Arc<Mutex<Vec<MarkerEvent>>> {
        self.events.clone()
    }

    /// Copy of the events recorded so far
    #[must_use]
    pub fn events(&self) -> Vec<MarkerEvent> {
        self.events
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }

    fn push(&self, marker: Marker, region: &str) {
        self.events
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .push(MarkerEvent {
                instrument: self.name,
                marker,
                region: region.to_string(),
            });
    }
}

impl Instrument for Recorder {
    fn name(&self) -> &'static str {
        self.name
    }

    fn start(&self, region: &str) {
        self.push(Marker::Start, region);
    }

    fn stop(&self, region: &str) {
        self.push(Marker::Stop, region);
    }
}

/// An ordered set of instruments driven together
#[derive(Default)]
pub struct Instruments {
    members: Vec<Box<dyn Instrument>>,

    /// Number of currently open regions on this set. Held while the
    /// instruments start or stop so no region body runs in between.
    pub(crate) depth: Mutex<usize>,

    /// Number of outermost regions entered so far
    sessions: AtomicU64,
}

impl std::fmt::Debug for Instruments {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Instruments")
            .field("members", &self.names())
            .field("depth", &self.depth.try_lock().map(|depth| *depth).ok())
            .field("sessions", &self.sessions())
            .finish()
    }
}

impl Instruments {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an instrument; it starts after and stops before the existing ones
    #[must_use]
    pub fn with(mut self, instrument: impl Instrument + 'static) -> Self {
        self.push(instrument);
        self
    }

    pub fn push(&mut self, instrument: impl Instrument + 'static) {
        self.members.push(Box::new(instrument));
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Names of the members in start order
    #[must_use]
    pub fn names(&self) -> Vec<&'static str> {
        self.members.iter().map(|member| member.name()).collect()
    }

    /// Number of outermost regions entered so far
    #[must_use]
    pub fn sessions(&self) -> u64 {
        self.sessions.load(Ordering::Acquire)
    }

    /// Open a region on this set. Only the outermost open region emits markers.
    #[must_use = "the region closes as soon as the guard is dropped"]
    pub fn enter(self: &Arc<Self>, name: &'static str) -> Region {
        Region::new(self.clone(), name)
    }

    pub(crate) fn start_all(&self, region: &str) {
        self.sessions.fetch_add(1, Ordering::AcqRel);

        for member in &self.members {
            tracing::debug!(instrument = member.name(), region, "start");
            member.start(region);
        }
    }

    pub(crate) fn stop_all(&self, region: &str) {
        for member in self.members.iter().rev() {
            member.stop(region);
            tracing::debug!(instrument = member.name(), region, "stop");
        }
    }
}

lazy_static! {
    /// The instruments used by the `region!` macros
    static ref INSTALLED: RwLock<Option<Arc<Instruments>>> = RwLock::new(None);
}

/// Install `instruments` for the `region!` macros, returning the previous set
pub fn install(instruments: Instruments) -> Option<Arc<Instruments>> {
    let mut installed = INSTALLED
        .write()
        .unwrap_or_else(std::sync::PoisonError::into_inner);

    installed.replace(Arc::new(instruments))
}

/// Remove the globally installed instruments
pub fn uninstall() -> Option<Arc<Instruments>> {
    INSTALLED
        .write()
        .unwrap_or_else(std::sync::PoisonError::into_inner)
        .take()
}

/// The currently installed instruments, if any
#[must_use]
pub fn installed() -> Option<Arc<Instruments>> {
    INSTALLED
        .read()
        .unwrap_or_else(std::sync::PoisonError::into_inner)
        .clone()
}
