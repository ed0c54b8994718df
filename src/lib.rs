#![forbid(unsafe_code)]

//! `toolbox-watchdog` — command execution watchdog and failure reporter.
//!
//! Runs a unit of work, classifies anything that escapes it as an expected
//! domain error or an unexpected failure, writes a structured diagnostic
//! record for either, and a forensic `crash.log` for the unexpected case.

pub mod config;
pub mod errors;
pub mod failure;
pub mod inspect;
pub mod report;
pub mod watchdog;

pub use config::WatchdogConfig;
pub use errors::{AppError, ErrorKind, Result};
pub use failure::{Diagnostic, Failure, Fatal, ResultExt, UnexpectedError};
pub use report::{DiagnosticRecord, Reporter};
pub use watchdog::{error_watchdog, Outcome, Watchdog};

/// Version of this tool, reported in crash dumps by default.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
