//! Failure reporting: structured diagnostics and crash dumps.
//!
//! [`Reporter::handle`] writes one [`DiagnosticRecord`] per failure to the
//! diagnostic channel. Unexpected failures additionally get a crash dump
//! written to the configured crash log before the record is emitted.

pub mod crash;
pub mod record;

use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::config::WatchdogConfig;
use crate::failure::{Diagnostic, Failure, UnexpectedError};
use crate::inspect::{EnvironmentInspector, HostInspector};

pub use crash::{write_crash_log, CrashDump, CrashLogFile, CRASH_LOG_FILE};
pub use record::DiagnosticRecord;

/// Classifies failures and produces their diagnostic output.
///
/// Never returns an error and never panics on I/O trouble: every problem
/// writing output is logged with `tracing` and otherwise swallowed.
pub struct Reporter<W: Write = io::Stderr> {
    diagnostics: W,
    crash_log: PathBuf,
    version: String,
    highlight_message: bool,
    inspector: Box<dyn EnvironmentInspector>,
}

impl Reporter<io::Stderr> {
    /// Reporter writing diagnostics to standard error.
    #[must_use]
    pub fn stderr(config: &WatchdogConfig) -> Self {
        Self::new(io::stderr(), config)
    }
}

impl<W: Write> Reporter<W> {
    /// Reporter writing diagnostics to `diagnostics`, inspecting the real host.
    pub fn new(diagnostics: W, config: &WatchdogConfig) -> Self {
        Self {
            diagnostics,
            crash_log: config.crash_log.clone(),
            version: config.version.clone(),
            highlight_message: config.highlight_message,
            inspector: Box::new(HostInspector::default()),
        }
    }

    /// Replace the environment inspector used for crash dumps.
    #[must_use]
    pub fn with_inspector(mut self, inspector: impl EnvironmentInspector + 'static) -> Self {
        self.inspector = Box::new(inspector);
        self
    }

    /// Crash log location.
    #[must_use]
    pub fn crash_log(&self) -> &Path {
        &self.crash_log
    }

    /// Borrow the diagnostic channel.
    #[must_use]
    pub fn diagnostics(&self) -> &W {
        &self.diagnostics
    }

    /// Recover the diagnostic channel.
    #[must_use]
    pub fn into_diagnostics(self) -> W {
        self.diagnostics
    }

    /// Report one failure.
    pub fn handle(&mut self, failure: &Failure) {
        match failure {
            Failure::Expected(err) => {
                info!(code = err.code(), class = err.kind().label(), "reporting expected failure");
            }
            Failure::Unexpected(err) => {
                info!(class = err.type_name(), "reporting unexpected failure");
                self.write_crash_dump(err);
            }
        }
        self.write_diagnostic(failure.diagnostic());
    }

    fn write_crash_dump(&self, err: &UnexpectedError) {
        let dump = CrashDump::new(err, &self.version).highlight_message(self.highlight_message);
        let inspector = self.inspector.as_ref();
        if let Err(io_err) = write_crash_log(&self.crash_log, |out| dump.write_to(out, inspector)) {
            warn!(
                path = %self.crash_log.display(),
                %io_err,
                "failed to write crash log"
            );
        }
    }

    fn write_diagnostic(&mut self, diagnostic: &dyn Diagnostic) {
        let record = DiagnosticRecord::from_diagnostic(diagnostic);
        let text = match record.to_pretty_json() {
            Ok(text) => text,
            Err(err) => {
                warn!(%err, "failed to serialize diagnostic record");
                return;
            }
        };
        if let Err(err) = writeln!(self.diagnostics, "{text}") {
            warn!(%err, "failed to write diagnostic record");
            return;
        }
        if let Err(err) = self.diagnostics.flush() {
            warn!(%err, "failed to flush diagnostic channel");
        }
    }
}
