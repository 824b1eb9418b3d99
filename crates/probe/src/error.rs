//! Probe Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction.
//!
//! A failed *compile* is not an error at this level: it's a
//! [`ProbeStatus`](crate::ProbeStatus). These are the failures that stop a
//! probe from producing any status at all.

use derive_more::{Display, Error};
use std::path::PathBuf;

/// A probe error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for probe operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// These describe what the caller should *do*, not what went wrong internally.
#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// The synthetic compilation unit could not be written.
    #[display("could not prepare compilation unit")]
    Unit,
    /// A file or directory could not be read.
    #[display("I/O error: {}", _0.display())]
    Io(#[error(not(source))] PathBuf),
    /// The configured pipeline program isn't installed.
    #[display("build pipeline program not found: {_0}")]
    ProgramNotFound(#[error(not(source))] String),
    /// The pipeline could not be started, or died without reporting.
    #[display("build pipeline failed to run")]
    Pipeline,
    /// The pipeline ran but its report didn't decode.
    #[display("build pipeline produced an invalid report")]
    InvalidReport,
    /// A canonical name that can't be used as an alias.
    #[display("invalid alias name: {_0:?}")]
    InvalidAlias(#[error(not(source))] String),
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Io(_) | Self::Pipeline)
    }
}
