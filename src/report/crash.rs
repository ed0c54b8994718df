//! Crash dump composition and the scoped crash log file.
//!
//! A dump is plain UTF-8 text: a timestamp line followed by the `MESSAGE`,
//! `BACKTRACE`, `VERSION INFORMATION`, `SYSTEM INFORMATION`,
//! `INSTALLED GEMS` and `LOAD PATHS` sections, in that order. Environment
//! sections are best-effort: a failing source yields a placeholder line and
//! the remaining sections are still written.

use std::fs::{File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use tracing::warn;

use crate::failure::{Diagnostic, Fatal, UnexpectedError};
use crate::inspect::EnvironmentInspector;
use crate::watchdog::{take_panic_site, PanicHookGuard};

/// Well-known crash log file name in the working directory.
pub const CRASH_LOG_FILE: &str = "crash.log";

/// Format of the first line's timestamp.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S %z";

const HIGHLIGHT_START: &str = "\x1b[1m\x1b[31m";
const HIGHLIGHT_END: &str = "\x1b[0m";

/// Forensic report for one unexpected failure.
pub struct CrashDump<'a> {
    error: &'a UnexpectedError,
    version: &'a str,
    highlight_message: bool,
    created_at: DateTime<Local>,
}

impl<'a> CrashDump<'a> {
    /// Dump for `error`, stamped with the current local time.
    #[must_use]
    pub fn new(error: &'a UnexpectedError, version: &'a str) -> Self {
        Self {
            error,
            version,
            highlight_message: false,
            created_at: Local::now(),
        }
    }

    /// Wrap the `MESSAGE` line in ANSI bold red.
    #[must_use]
    pub fn highlight_message(mut self, enabled: bool) -> Self {
        self.highlight_message = enabled;
        self
    }

    /// Override the creation timestamp.
    #[must_use]
    pub fn created_at(mut self, at: DateTime<Local>) -> Self {
        self.created_at = at;
        self
    }

    /// Write every section to `out`.
    ///
    /// Inspector failures are absorbed into placeholders; only I/O errors on
    /// `out` are returned.
    ///
    /// # Errors
    ///
    /// Returns the first write error; sections before it remain written.
    pub fn write_to(
        &self,
        out: &mut dyn Write,
        inspector: &dyn EnvironmentInspector,
    ) -> io::Result<()> {
        writeln!(
            out,
            "Crashlog created at {}",
            self.created_at.format(TIMESTAMP_FORMAT)
        )?;
        self.write_message(out)?;
        self.write_backtrace(out)?;
        self.write_version_information(out)?;
        write_system_information(out, inspector)?;
        write_installed_packages(out, inspector)?;
        write_load_paths(out, inspector)
    }

    fn write_message(&self, out: &mut dyn Write) -> io::Result<()> {
        write_section_header(out, "Message")?;
        let line = format!("{}: {}", self.error.type_name(), self.error.message());
        if self.highlight_message {
            writeln!(out, "{HIGHLIGHT_START}{line}{HIGHLIGHT_END}")
        } else {
            writeln!(out, "{line}")
        }
    }

    fn write_backtrace(&self, out: &mut dyn Write) -> io::Result<()> {
        write_section_header(out, "Backtrace")?;
        let frames = self.error.frames();
        if frames.is_empty() {
            return writeln!(out, "(no backtrace captured)");
        }
        for frame in frames {
            writeln!(out, "{frame}")?;
        }
        Ok(())
    }

    fn write_version_information(&self, out: &mut dyn Write) -> io::Result<()> {
        write_section_header(out, "Version Information")?;
        writeln!(out, "{}", self.version)
    }
}

fn write_system_information(
    out: &mut dyn Write,
    inspector: &dyn EnvironmentInspector,
) -> io::Result<()> {
    write_section_header(out, "System Information")?;
    let json = gather("system information", || inspector.system_info()).and_then(|info| {
        serde_json::to_string(&info).map_err(|err| {
            warn!(%err, "failed to serialize system information");
            err.to_string()
        })
    });
    match json {
        Ok(line) => writeln!(out, "{line}"),
        Err(reason) => write_unavailable(out, &reason),
    }
}

fn write_installed_packages(
    out: &mut dyn Write,
    inspector: &dyn EnvironmentInspector,
) -> io::Result<()> {
    write_section_header(out, "Installed gems")?;
    match gather("installed packages", || inspector.installed_packages()) {
        Ok(packages) => {
            for package in packages {
                writeln!(out, "  {} {}", package.name, package.versions.join(", "))?;
            }
            Ok(())
        }
        Err(reason) => write_unavailable(out, &reason),
    }
}

fn write_load_paths(out: &mut dyn Write, inspector: &dyn EnvironmentInspector) -> io::Result<()> {
    write_section_header(out, "Load paths")?;
    match gather("load paths", || inspector.search_paths()) {
        Ok(paths) => {
            for (index, path) in paths.iter().enumerate() {
                writeln!(out, "  {index}. {}", path.display())?;
            }
            Ok(())
        }
        Err(reason) => write_unavailable(out, &reason),
    }
}

fn write_section_header(out: &mut dyn Write, title: &str) -> io::Result<()> {
    writeln!(out)?;
    writeln!(out, "===== {}:", title.to_uppercase())?;
    writeln!(out)
}

fn write_unavailable(out: &mut dyn Write, reason: &str) -> io::Result<()> {
    writeln!(out, "  (unavailable: {reason})")
}

/// Run one inspector query, converting errors and panics into a reason.
///
/// A panicking source is recorded silently instead of reaching the default
/// hook, which would print to the diagnostic channel. A [`Fatal`] payload
/// resumes unwinding.
fn gather<T>(
    section: &str,
    source: impl FnOnce() -> crate::Result<T>,
) -> std::result::Result<T, String> {
    let result = {
        let _hook = PanicHookGuard::install();
        panic::catch_unwind(AssertUnwindSafe(source))
    };
    match result {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(err)) => {
            warn!(section, %err, "crash dump section unavailable");
            Err(err.to_string())
        }
        Err(payload) => {
            if payload.is::<Fatal>() {
                panic::resume_unwind(payload);
            }
            let location = take_panic_site().and_then(|site| site.location);
            warn!(
                section,
                location = location.as_deref(),
                "crash dump section source panicked"
            );
            Err("source panicked".to_owned())
        }
    }
}

/// Crash log opened in overwrite mode.
///
/// Acquire with [`CrashLogFile::create`], write through
/// [`CrashLogFile::writer`], and release with [`CrashLogFile::close`].
pub struct CrashLogFile {
    path: PathBuf,
    writer: BufWriter<File>,
}

impl CrashLogFile {
    /// Create or truncate the file at `path`.
    ///
    /// # Errors
    ///
    /// Returns the I/O error if the file cannot be opened for writing.
    pub fn create(path: impl Into<PathBuf>) -> io::Result<Self> {
        let path = path.into();
        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&path)?;
        Ok(Self {
            path,
            writer: BufWriter::new(file),
        })
    }

    /// Location of the file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Buffered handle for composing the dump.
    pub fn writer(&mut self) -> &mut BufWriter<File> {
        &mut self.writer
    }

    /// Flush buffered content and sync it to disk.
    ///
    /// # Errors
    ///
    /// Returns the flush or sync error.
    pub fn close(self) -> io::Result<()> {
        let file = self.writer.into_inner().map_err(io::IntoInnerError::into_error)?;
        file.sync_all()
    }
}

/// Open `path`, let `compose` write into it, and close it on every exit
/// path, including a failed `compose`.
///
/// # Errors
///
/// Returns the open error, otherwise the compose error, otherwise the close
/// error.
pub fn write_crash_log<F>(path: &Path, compose: F) -> io::Result<()>
where
    F: FnOnce(&mut dyn Write) -> io::Result<()>,
{
    let mut file = CrashLogFile::create(path)?;
    let writer: &mut dyn Write = file.writer();
    let composed = compose(writer);
    let closed = file.close();
    composed.and(closed)
}
