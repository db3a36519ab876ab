use derive_more::{Display, Error};

/// A worker error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for worker lifecycle operations.
///
/// Individual requests never fail with this type; they resolve to a
/// [`Failure`](crate::Failure) instead.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// The operating system refused to start the worker thread.
    #[display("failed to start worker thread")]
    Spawn,
    /// Replies are routed by a task, which needs a Tokio runtime.
    #[display("the worker must be started from within a Tokio runtime")]
    NoRuntime,
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Spawn)
    }
}
