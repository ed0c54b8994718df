//! Domain error family raised deliberately by command logic.
//!
//! Every [`AppError`] is an *expected* failure: the watchdog reports it with
//! a structured diagnostic record only and never writes a crash dump for it.

use std::fmt::{Display, Formatter};

/// Shared application result type.
pub type Result<T> = std::result::Result<T, AppError>;

/// Classification label for a domain error.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum ErrorKind {
    /// Configuration parsing or validation failure.
    Config,
    /// Invalid combination of arguments or options.
    Usage,
    /// Requested entity does not exist.
    NotFound,
    /// A remote service or external program reported failure.
    Remote,
    /// File-system operation failed in a way the command anticipated.
    Io,
    /// Generic domain failure without a stable code.
    Generic,
}

impl ErrorKind {
    /// Label emitted as the `class` of a diagnostic record.
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Config => "ConfigError",
            Self::Usage => "UsageError",
            Self::NotFound => "NotFoundError",
            Self::Remote => "RemoteError",
            Self::Io => "IoError",
            Self::Generic => "GenericError",
        }
    }

    /// Stable machine code used when the raiser does not supply one.
    #[must_use]
    pub fn default_code(self) -> Option<&'static str> {
        match self {
            Self::Config => Some("E_CONFIG"),
            Self::Usage => Some("E_USAGE"),
            Self::NotFound => Some("E_NOT_FOUND"),
            Self::Remote => Some("E_REMOTE"),
            Self::Io => Some("E_IO"),
            Self::Generic => None,
        }
    }

    fn prefix(self) -> &'static str {
        match self {
            Self::Config => "config",
            Self::Usage => "usage",
            Self::NotFound => "not found",
            Self::Remote => "remote",
            Self::Io => "io",
            Self::Generic => "error",
        }
    }
}

/// Expected failure carrying an optional code, a message, and an optional
/// stacktrace supplied by the raiser.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppError {
    kind: ErrorKind,
    code: Option<String>,
    message: String,
    stacktrace: Option<Vec<String>>,
}

impl AppError {
    /// Construct an error of `kind` with the kind's default code.
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            code: kind.default_code().map(str::to_owned),
            message: message.into(),
            stacktrace: None,
        }
    }

    /// Configuration parsing or validation failure.
    pub fn config(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Config, message)
    }

    /// Invalid argument combination.
    pub fn usage(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Usage, message)
    }

    /// Requested entity does not exist.
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound, message)
    }

    /// Remote service or external program failure.
    pub fn remote(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Remote, message)
    }

    /// Anticipated file-system failure.
    pub fn io(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Io, message)
    }

    /// Domain failure with no stable code.
    pub fn generic(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Generic, message)
    }

    /// Replace the machine code.
    #[must_use]
    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    /// Drop the machine code entirely.
    #[must_use]
    pub fn without_code(mut self) -> Self {
        self.code = None;
        self
    }

    /// Attach raiser-supplied stack frame descriptions.
    #[must_use]
    pub fn with_stacktrace(mut self, frames: Vec<String>) -> Self {
        self.stacktrace = Some(frames);
        self
    }

    /// Error classification.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Machine code, if any.
    #[must_use]
    pub fn code(&self) -> Option<&str> {
        self.code.as_deref()
    }

    /// Human-readable message.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Frames supplied by the raiser, if any.
    #[must_use]
    pub fn stacktrace(&self) -> Option<&[String]> {
        self.stacktrace.as_deref()
    }
}

impl Display for AppError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.kind.prefix(), self.message)
    }
}

impl std::error::Error for AppError {}

impl From<toml::de::Error> for AppError {
    fn from(err: toml::de::Error) -> Self {
        Self::config(format!("invalid config: {err}"))
    }
}
