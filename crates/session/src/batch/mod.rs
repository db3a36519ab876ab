//! Batch runs: one invocation of the session's tool over its file list.
//!
//! Merge and convert are whole-batch runs: a single worker call receives
//! every usable file in list order and returns one artifact, so one bad
//! file fails the whole run. Compress is a per-item run: files are sent one
//! at a time, failures stay on the file, and the run carries on.
//!
//! A run moves `Preparing → Running → Complete | Error | Cancelled`.
//! `Complete` and `Cancelled` fall back to `Idle` after a short delay;
//! `Error` stays until it is reset or another run starts.

pub(crate) mod each;
pub(crate) mod whole;

use derive_more::Display;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

#[derive(Clone, Copy, Debug, Default, Display, PartialEq, Eq, Hash)]
pub enum BatchStatus {
    #[default]
    #[display("idle")]
    Idle,
    #[display("preparing")]
    Preparing,
    #[display("running")]
    Running,
    #[display("complete")]
    Complete,
    #[display("error")]
    Error,
    #[display("cancelled")]
    Cancelled,
}
impl BatchStatus {
    pub fn is_active(&self) -> bool {
        matches!(self, BatchStatus::Preparing | BatchStatus::Running)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, BatchStatus::Complete | BatchStatus::Error | BatchStatus::Cancelled)
    }
}

/// Observable state of the current (or last) run.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BatchRun {
    /// Increases with every run; `0` before the first.
    pub run_id: u64,
    pub status: BatchStatus,
    /// Percentage, never above 100 and never decreasing within a run.
    pub progress: u8,
    /// One-based position of the file being processed (per-item runs).
    pub current_index: usize,
    pub total: usize,
    pub message: String,
}

impl BatchRun {
    pub fn idle(run_id: u64) -> Self {
        Self {
            run_id,
            ..Default::default()
        }
    }

    pub(crate) fn preparing(run_id: u64, total: usize, progress: u8, message: impl Into<String>) -> Self {
        Self {
            run_id,
            status: BatchStatus::Preparing,
            progress: progress.min(100),
            current_index: 0,
            total,
            message: message.into(),
        }
    }

    /// Move to `status`. Progress only ever goes up.
    pub(crate) fn advance(&mut self, status: BatchStatus, progress: u8, message: impl Into<String>) {
        self.status = status;
        self.progress = self.progress.max(progress.min(100));
        self.message = message.into();
    }

    pub fn is_active(&self) -> bool {
        self.status.is_active()
    }
}

/// `done / total` as a rounded percentage, clamped to 0..=100.
pub(crate) fn percent(done: f64, total: usize) -> u8 {
    if total == 0 {
        return 100;
    }
    let value = (done / total as f64 * 100.0).round();
    value.clamp(0.0, 100.0) as u8
}

/// The run a task belongs to.
#[derive(Clone, Debug)]
pub(crate) struct RunTicket {
    pub(crate) id: u64,
    pub(crate) token: CancellationToken,
}

/// Why changing the compression options did not start a new run.
#[derive(Clone, Copy, Debug, Display, PartialEq, Eq)]
pub enum SkipReason {
    #[display("the session does not compress")]
    NotCompressing,
    #[display("no file has been compressed yet")]
    NothingTransformed,
    #[display("files are still being read")]
    Ingesting,
    #[display("a file is being transformed")]
    Transforming,
    #[display("a batch run is in progress")]
    RunActive,
}

/// Outcome of [`Session::set_compression_options`](crate::Session::set_compression_options).
#[derive(Debug)]
pub enum Rerun {
    /// A forced run replacing every result; await the handle to wait for it.
    Started(JoinHandle<()>),
    /// The options did not change.
    Unchanged,
    /// The options were stored, but nothing was re-run.
    Skipped(SkipReason),
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(0.5, 4, 13)]
    #[case(1.0, 4, 25)]
    #[case(2.5, 3, 83)]
    #[case(3.0, 3, 100)]
    #[case(7.0, 3, 100)]
    #[case(-1.0, 3, 0)]
    #[case(0.0, 0, 100)]
    fn test_percent(#[case] done: f64, #[case] total: usize, #[case] expected: u8) {
        assert_eq!(percent(done, total), expected);
    }

    #[test]
    fn progress_never_decreases() {
        let mut run = BatchRun::preparing(1, 3, 10, "Preparing files...");
        run.advance(BatchStatus::Running, 30, "Merging PDFs...");
        run.advance(BatchStatus::Running, 20, "Still merging");
        assert_eq!(run.progress, 30);
        run.advance(BatchStatus::Complete, 250, "Done");
        assert_eq!(run.progress, 100);
        assert_eq!(run.message, "Done");
    }

    #[test]
    fn idle_keeps_the_run_id() {
        let run = BatchRun::idle(7);
        assert_eq!(run.run_id, 7);
        assert_eq!(run.status, BatchStatus::Idle);
        assert!(!run.is_active());
    }
}
