//! CLI command implementations for evoscope.

pub(crate) mod evolve;
pub(crate) mod inspect;
pub(crate) mod resume;

mod scenario;

use std::error::Error;
use std::fmt;

/// CLI error type.
#[derive(Debug)]
pub(crate) struct CliError {
    message: String,
}

impl CliError {
    /// Create a new CLI error.
    pub(crate) fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl Error for CliError {}

impl From<std::io::Error> for CliError {
    fn from(e: std::io::Error) -> Self {
        Self::new(e.to_string())
    }
}

impl From<evoscope::Error> for CliError {
    fn from(e: evoscope::Error) -> Self {
        Self::new(e.to_string())
    }
}

impl From<evoscope::ConfigError> for CliError {
    fn from(e: evoscope::ConfigError) -> Self {
        Self::new(e.to_string())
    }
}

impl From<evoscope::SnapshotError> for CliError {
    fn from(e: evoscope::SnapshotError) -> Self {
        Self::new(e.to_string())
    }
}

impl From<serde_json::Error> for CliError {
    fn from(e: serde_json::Error) -> Self {
        Self::new(format!("scenario payload: {e}"))
    }
}
