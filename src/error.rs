//! Crate-level error type.

use crate::config::ConfigError;
use crate::gp::{ParseError, RewriteError};
use crate::guidance::GuidanceError;
use crate::snapshot::SnapshotError;
use thiserror::Error;

/// Any error raised by this crate.
#[derive(Debug, Error)]
pub enum Error {
    /// Expression text could not be parsed.
    #[error(transparent)]
    Parse(#[from] ParseError),
    /// An external rewriter failed.
    #[error(transparent)]
    Rewrite(#[from] RewriteError),
    /// Guidance network construction, prediction or decoding failed.
    #[error(transparent)]
    Guidance(#[from] GuidanceError),
    /// A snapshot was rejected or could not be encoded.
    #[error(transparent)]
    Snapshot(#[from] SnapshotError),
    /// A configuration could not be loaded.
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// Payload encoding failed.
    #[error("payload encoding: {0}")]
    Payload(#[from] serde_json::Error),
    /// File system failure.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Result alias using [`Error`].
pub type Result<T> = std::result::Result<T, Error>;
