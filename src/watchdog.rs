//! Single boundary that runs a unit of work and guarantees no interceptable
//! failure escapes it.
//!
//! [`Watchdog::run`] executes the work exactly once on the calling thread.
//! Returned [`Failure`]s and panics are handed to the [`Reporter`] and then
//! returned as data in [`Outcome::Failed`]. Panics carrying a [`Fatal`]
//! payload are resumed untouched.

use std::cell::RefCell;
use std::io::{self, Write};
use std::panic::{self, AssertUnwindSafe, PanicHookInfo};
use std::sync::Arc;
use std::thread::{self, ThreadId};

use tracing::{debug, info};

use crate::config::WatchdogConfig;
use crate::failure::{capture_frames, location_frame, Failure, Fatal, UnexpectedError};
use crate::report::Reporter;

/// Exit status for a run that completed without failure.
pub const EXIT_SUCCESS: u8 = 0;
/// Exit status for a run that ended in a domain error.
pub const EXIT_EXPECTED: u8 = 1;
/// Exit status for a run that ended in an unexpected error.
pub const EXIT_UNEXPECTED: u8 = 2;

/// Normalized result of a watchdog invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// The unit of work completed.
    Success,
    /// A failure was intercepted and reported.
    Failed(Failure),
}

impl Outcome {
    /// `true` when the work completed without failure.
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }

    /// The captured failure, if any.
    #[must_use]
    pub fn failure(&self) -> Option<&Failure> {
        match self {
            Self::Success => None,
            Self::Failed(failure) => Some(failure),
        }
    }

    /// Process exit status: `0` success, `1` expected, `2` unexpected.
    #[must_use]
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::Success => EXIT_SUCCESS,
            Self::Failed(failure) if failure.is_expected() => EXIT_EXPECTED,
            Self::Failed(_) => EXIT_UNEXPECTED,
        }
    }
}

/// Runs units of work and routes any failure through a [`Reporter`].
pub struct Watchdog<W: Write = io::Stderr> {
    reporter: Reporter<W>,
}

impl<W: Write> Watchdog<W> {
    /// Wrap a reporter.
    #[must_use]
    pub fn new(reporter: Reporter<W>) -> Self {
        Self { reporter }
    }

    /// Borrow the reporter.
    #[must_use]
    pub fn reporter(&self) -> &Reporter<W> {
        &self.reporter
    }

    /// Recover the reporter.
    #[must_use]
    pub fn into_reporter(self) -> Reporter<W> {
        self.reporter
    }

    /// Execute `work` once and return its normalized outcome.
    ///
    /// Never panics for an interceptable failure. A panic whose payload is
    /// [`Fatal`] unwinds out of this call unchanged.
    pub fn run<T, F>(&mut self, work: F) -> Outcome
    where
        F: FnOnce() -> Result<T, Failure>,
    {
        debug!("watchdog running unit of work");

        let result = {
            let _hook = PanicHookGuard::install();
            panic::catch_unwind(AssertUnwindSafe(work))
        };

        let failure = match result {
            Ok(Ok(_)) => {
                debug!("unit of work completed");
                return Outcome::Success;
            }
            Ok(Err(failure)) => failure,
            Err(payload) => {
                if payload.is::<Fatal>() {
                    panic::resume_unwind(payload);
                }
                let (location, frames) =
                    take_panic_site().map_or((None, Vec::new()), |s| (s.location, s.frames));
                Failure::Unexpected(UnexpectedError::from_panic(
                    payload.as_ref(),
                    location,
                    frames,
                ))
            }
        };

        info!(
            expected = failure.is_expected(),
            class = failure.diagnostic().class(),
            "unit of work failed"
        );
        self.reporter.handle(&failure);
        Outcome::Failed(failure)
    }
}

/// Run `work` under a watchdog that reports to stderr with default settings.
pub fn error_watchdog<T, F>(work: F) -> Outcome
where
    F: FnOnce() -> Result<T, Failure>,
{
    Watchdog::new(Reporter::stderr(&WatchdogConfig::default())).run(work)
}

/// Where the last panic recorded by a [`PanicHookGuard`] was raised.
pub(crate) struct PanicSite {
    pub(crate) location: Option<String>,
    pub(crate) frames: Vec<String>,
}

thread_local! {
    static LAST_PANIC: RefCell<Option<PanicSite>> = const { RefCell::new(None) };
}

/// Take the panic site recorded on this thread, if any.
pub(crate) fn take_panic_site() -> Option<PanicSite> {
    LAST_PANIC.with(|slot| slot.borrow_mut().take())
}

type PanicHook = Box<dyn Fn(&PanicHookInfo<'_>) + Sync + Send + 'static>;

/// Replaces the process panic hook while a panic is expected to be caught
/// on the current thread.
///
/// Panics on the owning thread are recorded silently; panics elsewhere and
/// fatal payloads go to the hook that was installed before. Drop the guard
/// before resuming an unwind, or the previous hook is never restored.
pub(crate) struct PanicHookGuard {
    previous: Option<Arc<PanicHook>>,
}

impl PanicHookGuard {
    pub(crate) fn install() -> Self {
        LAST_PANIC.with(|slot| *slot.borrow_mut() = None);
        let previous: Arc<PanicHook> = Arc::new(panic::take_hook());
        let delegate = Arc::clone(&previous);
        let owner: ThreadId = thread::current().id();

        panic::set_hook(Box::new(move |info| {
            if thread::current().id() != owner || info.payload().is::<Fatal>() {
                delegate(info);
                return;
            }
            let site = PanicSite {
                location: info.location().map(location_frame),
                frames: capture_frames(),
            };
            LAST_PANIC.with(|slot| *slot.borrow_mut() = Some(site));
        }));

        Self {
            previous: Some(previous),
        }
    }
}

impl Drop for PanicHookGuard {
    fn drop(&mut self) {
        if thread::panicking() {
            return;
        }
        if let Some(previous) = self.previous.take() {
            drop(panic::take_hook());
            match Arc::try_unwrap(previous) {
                Ok(hook) => panic::set_hook(hook),
                Err(shared) => panic::set_hook(Box::new(move |info| shared(info))),
            }
        }
    }
}
