//! Structured diagnostic record written to the diagnostic channel.

use serde::{Deserialize, Serialize};

use crate::failure::Diagnostic;

/// Script-consumable summary of a single failure.
///
/// Serialized with keys in the order `code`, `message`, `class`,
/// `stacktrace`; absent values are omitted rather than emitted as `null`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DiagnosticRecord {
    /// Stable machine identifier.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    /// Human-readable text.
    pub message: String,
    /// Classification label.
    pub class: String,
    /// Frame descriptions, innermost first.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stacktrace: Option<Vec<String>>,
}

impl DiagnosticRecord {
    /// Snapshot a failure. Empty codes and empty stacktraces are treated as
    /// absent.
    #[must_use]
    pub fn from_diagnostic(diagnostic: &dyn Diagnostic) -> Self {
        Self {
            code: diagnostic
                .code()
                .filter(|code| !code.is_empty())
                .map(str::to_owned),
            message: diagnostic.message().to_owned(),
            class: diagnostic.class().to_owned(),
            stacktrace: diagnostic
                .stacktrace()
                .filter(|frames| !frames.is_empty())
                .map(<[String]>::to_vec),
        }
    }

    /// Render as one human-indented JSON object.
    ///
    /// # Errors
    ///
    /// Returns the serializer error; not expected for this shape.
    pub fn to_pretty_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}
