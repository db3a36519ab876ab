//! Engine Error Types
//!
//! Every variant that concerns a single input carries that input's display
//! name, so callers can surface "which file" without threading it through
//! separately.

use derive_more::{Display, Error};

/// An engine error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for engine operations.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// The document requires a password before it can be read.
    #[display("\"{_0}\" is encrypted")]
    Encrypted(#[error(not(source))] String),
    /// The document could not be parsed, or has no pages.
    #[display("\"{_0}\" is not a readable PDF")]
    Corrupt(#[error(not(source))] String),
    /// The image could not be decoded (or is not one of the supported formats).
    #[display("\"{_0}\" is not a supported image")]
    UnsupportedImage(#[error(not(source))] String),
    /// A batch operation was given nothing to work with.
    #[display("no input files")]
    EmptyBatch,
    /// Writing the output document or preview failed.
    #[display("failed to encode output")]
    Encode,
    /// An option string did not name a known value.
    #[display("invalid option value: {_0}")]
    InvalidOption(#[error(not(source))] String),
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    ///
    /// Engine operations are deterministic over their input bytes, so only
    /// an encoding failure (allocation, writer) is worth another attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Encode)
    }
}
