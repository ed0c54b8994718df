//! Boundary classification of failures escaping a unit of work.
//!
//! A failure is classified once, at the point it is first raised: `?` on an
//! [`AppError`] produces [`Failure::Expected`], while `?` on a library error
//! (I/O, parsing, serialization) produces [`Failure::Unexpected`] with the
//! concrete Rust type name and the frames captured at that moment. Panics are
//! converted by the [`crate::watchdog::Watchdog`] itself.

use std::any::Any;
use std::fmt::{Display, Formatter};
use std::panic::Location;

use crate::errors::AppError;

/// Uniform view over any failure that reaches the reporter.
pub trait Diagnostic {
    /// Stable machine identifier, absent for generic and unexpected failures.
    fn code(&self) -> Option<&str>;
    /// Human-readable text.
    fn message(&self) -> &str;
    /// Classification label (domain kind label or runtime type name).
    fn class(&self) -> &str;
    /// Ordered frame descriptions, innermost first.
    fn stacktrace(&self) -> Option<&[String]>;
}

impl Diagnostic for AppError {
    fn code(&self) -> Option<&str> {
        AppError::code(self)
    }

    fn message(&self) -> &str {
        AppError::message(self)
    }

    fn class(&self) -> &str {
        self.kind().label()
    }

    fn stacktrace(&self) -> Option<&[String]> {
        AppError::stacktrace(self)
    }
}

/// Any non-domain failure re-exposed through the [`Diagnostic`] shape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnexpectedError {
    type_name: String,
    message: String,
    frames: Vec<String>,
}

impl UnexpectedError {
    /// Wrap a library error, recording its static type name and capturing
    /// the current stack.
    pub fn from_error<E>(err: &E) -> Self
    where
        E: std::error::Error + ?Sized,
    {
        Self {
            type_name: std::any::type_name::<E>().to_owned(),
            message: err.to_string(),
            frames: capture_frames(),
        }
    }

    /// Build from an intercepted panic payload.
    ///
    /// `frames` are the frames captured at the panic site; the panic
    /// location, when known, is recorded as the first frame.
    #[must_use]
    pub fn from_panic(
        payload: &(dyn Any + Send),
        location: Option<String>,
        frames: Vec<String>,
    ) -> Self {
        let mut all = Vec::with_capacity(frames.len() + 1);
        all.extend(location);
        all.extend(frames);
        Self {
            type_name: "panic".to_owned(),
            message: panic_message(payload),
            frames: all,
        }
    }

    /// Construct directly from parts.
    pub fn from_parts(
        type_name: impl Into<String>,
        message: impl Into<String>,
        frames: Vec<String>,
    ) -> Self {
        Self {
            type_name: type_name.into(),
            message: message.into(),
            frames,
        }
    }

    /// Runtime type name of the wrapped failure.
    #[must_use]
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /// Captured frames, innermost first.
    #[must_use]
    pub fn frames(&self) -> &[String] {
        &self.frames
    }
}

impl Diagnostic for UnexpectedError {
    fn code(&self) -> Option<&str> {
        None
    }

    fn message(&self) -> &str {
        &self.message
    }

    fn class(&self) -> &str {
        &self.type_name
    }

    fn stacktrace(&self) -> Option<&[String]> {
        if self.frames.is_empty() {
            None
        } else {
            Some(&self.frames)
        }
    }
}

impl Display for UnexpectedError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.type_name, self.message)
    }
}

impl std::error::Error for UnexpectedError {}

/// Outcome of classifying a failure at the watchdog boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Failure {
    /// Raised deliberately by command logic.
    Expected(AppError),
    /// Anything else: library errors, panics, programming bugs.
    Unexpected(UnexpectedError),
}

impl Failure {
    /// Classify an arbitrary error as unexpected.
    #[allow(clippy::needless_pass_by_value)]
    pub fn unexpected<E>(err: E) -> Self
    where
        E: std::error::Error,
    {
        Self::Unexpected(UnexpectedError::from_error(&err))
    }

    /// `true` for domain errors.
    #[must_use]
    pub fn is_expected(&self) -> bool {
        matches!(self, Self::Expected(_))
    }

    /// The failure viewed through the uniform diagnostic shape.
    #[must_use]
    pub fn diagnostic(&self) -> &dyn Diagnostic {
        match self {
            Self::Expected(err) => err,
            Self::Unexpected(err) => err,
        }
    }
}

impl Display for Failure {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Expected(err) => Display::fmt(err, f),
            Self::Unexpected(err) => Display::fmt(err, f),
        }
    }
}

impl std::error::Error for Failure {}

impl From<AppError> for Failure {
    fn from(err: AppError) -> Self {
        Self::Expected(err)
    }
}

impl From<UnexpectedError> for Failure {
    fn from(err: UnexpectedError) -> Self {
        Self::Unexpected(err)
    }
}

macro_rules! unexpected_from {
    ($($ty:ty),+ $(,)?) => {
        $(
            impl From<$ty> for Failure {
                fn from(err: $ty) -> Self {
                    Self::unexpected(err)
                }
            }
        )+
    };
}

unexpected_from!(
    std::io::Error,
    std::fmt::Error,
    std::num::ParseIntError,
    std::num::ParseFloatError,
    std::str::ParseBoolError,
    std::str::Utf8Error,
    std::string::FromUtf8Error,
    serde_json::Error,
    toml::de::Error,
);

/// Convert any `Result` into one carrying an unexpected [`Failure`].
pub trait ResultExt<T> {
    /// Classify the error as unexpected regardless of its type.
    ///
    /// # Errors
    ///
    /// Returns [`Failure::Unexpected`] wrapping the original error.
    fn or_unexpected(self) -> Result<T, Failure>;
}

impl<T, E> ResultExt<T> for Result<T, E>
where
    E: std::error::Error,
{
    fn or_unexpected(self) -> Result<T, Failure> {
        self.map_err(Failure::unexpected)
    }
}

/// Process-terminating conditions the watchdog never intercepts.
///
/// Raise one with [`Fatal::raise`] inside a unit of work to unwind straight
/// through [`crate::watchdog::Watchdog::run`].
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Fatal {
    /// Operator requested termination.
    Interrupted,
    /// Allocation failure.
    OutOfMemory,
}

impl Fatal {
    /// Unwind with `self` as the panic payload.
    #[track_caller]
    pub fn raise(self) -> ! {
        std::panic::panic_any(self)
    }
}

impl Display for Fatal {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Interrupted => write!(f, "interrupted"),
            Self::OutOfMemory => write!(f, "out of memory"),
        }
    }
}

/// Format a panic location the way frames are rendered.
pub(crate) fn location_frame(location: &Location<'_>) -> String {
    format!("{}:{}:{}", location.file(), location.line(), location.column())
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        (*s).to_owned()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else if let Some(fatal) = payload.downcast_ref::<Fatal>() {
        fatal.to_string()
    } else {
        "Box<dyn Any>".to_owned()
    }
}

const INTERNAL_FRAME_PREFIXES: &[&str] = &[
    "backtrace::",
    "std::backtrace",
    "std::panicking",
    "std::panic::",
    "core::panicking",
    "std::sys",
    "std::rt::",
    "rust_begin_unwind",
    "__rust",
    "toolbox_watchdog::watchdog::",
    "core::result::",
    "<core::result::Result",
    "core::convert::",
    "<T as core::convert::",
    "core::ops::function::",
    "<F as core::ops::function::",
    "<&dyn core::ops::function::",
    "<alloc::boxed::Box<F,A> as core::ops::function::",
    "<core::panic::unwind_safe::AssertUnwindSafe<F> as core::ops::function::",
];

/// Frames at and below the C entry point belong to the runtime.
const ENTRY_FRAMES: &[&str] = &["main", "__libc_start_main", "__libc_start_call_main", "_start"];

fn is_internal_frame(name: &str) -> bool {
    name.contains("toolbox_watchdog::failure::")
        || INTERNAL_FRAME_PREFIXES.iter().any(|p| name.starts_with(p))
}

/// Capture the current stack as one description per frame, innermost first,
/// with unwinding, conversion and capture machinery filtered out.
pub(crate) fn capture_frames() -> Vec<String> {
    let trace = backtrace::Backtrace::new();
    let mut frames = Vec::new();
    for frame in trace.frames() {
        for symbol in frame.symbols() {
            let name = symbol
                .name()
                .map_or_else(|| "<unknown>".to_owned(), |n| format!("{n:#}"));
            if ENTRY_FRAMES.contains(&name.as_str()) {
                return frames;
            }
            if is_internal_frame(&name) {
                continue;
            }
            let rendered = match (symbol.filename(), symbol.lineno()) {
                (Some(file), Some(line)) => format!("{name} at {}:{line}", file.display()),
                _ => name,
            };
            frames.push(rendered);
        }
    }
    frames
}
