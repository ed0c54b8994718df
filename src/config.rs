//! Watchdog configuration parsing and validation.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::report::crash::CRASH_LOG_FILE;
use crate::{AppError, Result};

fn default_crash_log() -> PathBuf {
    PathBuf::from(CRASH_LOG_FILE)
}

fn default_version() -> String {
    crate::VERSION.into()
}

fn default_log_level() -> String {
    "warn".into()
}

/// Watchdog configuration parsed from a TOML file. Every key is optional.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case", deny_unknown_fields)]
pub struct WatchdogConfig {
    /// Crash dump location, relative to the working directory unless absolute.
    #[serde(default = "default_crash_log")]
    pub crash_log: PathBuf,
    /// Tool version written to the `VERSION INFORMATION` section.
    #[serde(default = "default_version")]
    pub version: String,
    /// Wrap the crash dump `MESSAGE` line in ANSI bold red.
    #[serde(default)]
    pub highlight_message: bool,
    /// Tracing filter used when `RUST_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Append tracing output to this file instead of standard output.
    /// Standard error is reserved for diagnostic records.
    #[serde(default)]
    pub log_file: Option<PathBuf>,
}

impl Default for WatchdogConfig {
    fn default() -> Self {
        Self {
            crash_log: default_crash_log(),
            version: default_version(),
            highlight_message: false,
            log_level: default_log_level(),
            log_file: None,
        }
    }
}

impl WatchdogConfig {
    /// Load and validate configuration from a TOML file path.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if the file cannot be read, contains
    /// invalid TOML, or fails validation.
    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path).map_err(|err| {
            AppError::config(format!("failed to read config {}: {err}", path.display()))
        })?;
        Self::from_toml_str(&raw)
    }

    /// Parse configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if parsing or validation fails.
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let config: Self = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.crash_log.as_os_str().is_empty() {
            return Err(AppError::config("crash_log must not be empty"));
        }
        if self.version.trim().is_empty() {
            return Err(AppError::config("version must not be empty"));
        }
        if self.log_level.trim().is_empty() {
            return Err(AppError::config("log_level must not be empty"));
        }
        if let Some(log_file) = &self.log_file {
            if log_file.file_name().is_none() {
                return Err(AppError::config("log_file must name a file"));
            }
        }
        Ok(())
    }
}
