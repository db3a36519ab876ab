//! Session error types.
//!
//! Only refused actions and delivery problems are errors. Failures while
//! reading or transforming a file are data: they end up on the record (or
//! the batch) as a [`Notice`](crate::Notice) or a message.

use crate::record::FileId;
use derive_more::{Display, Error};
use std::path::PathBuf;

/// A session error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for session actions.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// None of the selected inputs is acceptable for the current tool.
    #[display("no valid files in selection")]
    NoValidFiles,
    /// A batch was requested with nothing to process.
    #[display("nothing to process")]
    EmptyBatch,
    /// At least one file is still being read.
    #[display("files are still being read")]
    Ingesting,
    /// The action is not allowed while a batch run is active.
    #[display("a batch run is in progress")]
    BatchActive,
    /// A reorder did not name exactly the current files.
    #[display("new order is not a permutation of the current files")]
    NotAPermutation,
    #[display("no file with id {_0}")]
    NotFound(#[error(not(source))] FileId),
    /// Download requested for a file without a result.
    #[display("file {_0} has no result to deliver")]
    NoResult(#[error(not(source))] FileId),
    /// No merge or conversion output exists yet.
    #[display("no output to deliver")]
    NoOutput,
    #[display("cannot read input: {}", _0.display())]
    Input(#[error(not(source))] PathBuf),
    #[display("invalid output filename: {_0}")]
    InvalidFilename(#[error(not(source))] String),
    #[display("failed to deliver {_0}")]
    Deliver(#[error(not(source))] String),
    #[display("failed to start the document worker")]
    Worker,
    /// The session has been disposed.
    #[display("session has been disposed")]
    Disposed,
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Ingesting | Self::BatchActive | Self::Deliver(_) | Self::Worker)
    }
}
