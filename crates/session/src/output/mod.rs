//! Turning results into files the user can retrieve.

mod directory;
mod memory;

pub use self::directory::DirectorySink;
pub use self::memory::{Delivery, MemorySink};
use crate::error::{ErrorKind, Result};
use crate::record::{FileRecord, Status};
use crate::util::compressed_filename;
use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::instrument;

pub type SinkHandle = Arc<dyn DownloadSink + Send + Sync>;

/// Somewhere finished outputs go.
///
/// # Examples
///
/// ```
/// use sheaf_session::error::Result;
/// use sheaf_session::output::DownloadSink;
///
/// async fn save_twice(sink: &dyn DownloadSink, bytes: &[u8]) -> Result<()> {
///     let first = sink.deliver("out.pdf", bytes).await?;
///     let second = sink.deliver("out.pdf", bytes).await?;
///     assert_ne!(first, second);
///     Ok(())
/// }
/// ```
#[async_trait]
pub trait DownloadSink: Send + Sync {
    /// Name of the sink (for logging only).
    fn name(&self) -> &str;

    /// Store one output under `filename` (or a variant of it, never
    /// replacing an earlier delivery) and return where it went.
    async fn deliver(&self, filename: &str, bytes: &[u8]) -> Result<PathBuf>;
}

/// Sequences deliveries to a sink.
pub struct OutputDispatcher {
    sink: SinkHandle,
    interval: Duration,
}

impl OutputDispatcher {
    /// `interval` is the pause between consecutive deliveries of
    /// [`deliver_all`](Self::deliver_all).
    pub fn new(sink: SinkHandle, interval: Duration) -> Self {
        Self { sink, interval }
    }

    /// Deliver one record's result as `<stem>_compressed.pdf`.
    #[instrument(skip_all, fields(sink = self.sink.name(), file = %record.id))]
    pub async fn deliver_single(&self, record: &FileRecord) -> Result<PathBuf> {
        let Some(result) = record.result.as_ref().filter(|_| record.status == Status::Transformed) else {
            exn::bail!(ErrorKind::NoResult(record.id));
        };
        let filename = compressed_filename(&record.name);
        let path = self.sink.deliver(&filename, &result.bytes).await?;
        tracing::info!(path = %path.display(), "Delivered result");
        Ok(path)
    }

    /// Deliver every transformed record, in list order, one interval apart.
    /// Records without a result are skipped.
    pub async fn deliver_all(&self, records: &[FileRecord]) -> Result<Vec<PathBuf>> {
        let transformed: Vec<_> = records
            .iter()
            .filter(|record| record.status == Status::Transformed && record.result.is_some())
            .collect();
        let mut delivered = Vec::with_capacity(transformed.len());
        for (index, record) in transformed.into_iter().enumerate() {
            if index > 0 && !self.interval.is_zero() {
                tokio::time::sleep(self.interval).await;
            }
            delivered.push(self.deliver_single(record).await?);
        }
        Ok(delivered)
    }

    /// Deliver a synthesized output (merge, conversion) under its own name.
    #[instrument(skip_all, fields(sink = self.sink.name(), filename = %filename))]
    pub async fn deliver_artifact(&self, filename: &str, bytes: &[u8]) -> Result<PathBuf> {
        let path = self.sink.deliver(filename, bytes).await?;
        tracing::info!(path = %path.display(), size = bytes.len(), "Delivered output");
        Ok(path)
    }
}

/// Reject anything that is not a bare file name.
pub(crate) fn validate_filename(filename: &str) -> Result<&str> {
    let path = std::path::Path::new(filename);
    match path.file_name().and_then(|name| name.to_str()) {
        Some(name) if name == filename && !name.is_empty() => Ok(name),
        _ => exn::bail!(ErrorKind::InvalidFilename(filename.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::TransformResult;
    use rstest::rstest;
    use sheaf_engine::FileKind;

    fn transformed(name: &str, bytes: &[u8]) -> FileRecord {
        let mut record = FileRecord::new(name, 100, FileKind::Pdf);
        record.complete(TransformResult::new(100, bytes.to_vec()));
        record
    }

    #[tokio::test]
    async fn single_requires_a_result() {
        let sink = Arc::new(MemorySink::default());
        let dispatcher = OutputDispatcher::new(sink.clone(), Duration::ZERO);
        let record = FileRecord::new("a.pdf", 1, FileKind::Pdf);
        let err = dispatcher.deliver_single(&record).await.unwrap_err();
        assert_eq!(*err, ErrorKind::NoResult(record.id));
        assert!(sink.deliveries().await.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn all_are_delivered_in_order_with_a_pause_between() {
        let sink = Arc::new(MemorySink::default());
        let dispatcher = OutputDispatcher::new(sink.clone(), Duration::from_millis(500));
        let mut skipped = FileRecord::new("b.pdf", 1, FileKind::Pdf);
        skipped.status = Status::Failed;
        let records = [transformed("c.pdf", b"c"), skipped, transformed("a.pdf", b"a")];

        let started = tokio::time::Instant::now();
        let paths = dispatcher.deliver_all(&records).await.unwrap();
        assert_eq!(paths, [PathBuf::from("c_compressed.pdf"), PathBuf::from("a_compressed.pdf")]);

        let deliveries = sink.deliveries().await;
        assert_eq!(deliveries[0].bytes, b"c");
        assert_eq!(deliveries[1].bytes, b"a");
        assert_eq!(started.elapsed(), Duration::from_millis(500));
    }

    #[tokio::test]
    async fn nothing_to_deliver() {
        let dispatcher = OutputDispatcher::new(Arc::new(MemorySink::default()), Duration::from_secs(60));
        let records = [FileRecord::new("a.pdf", 1, FileKind::Pdf)];
        assert!(dispatcher.deliver_all(&records).await.unwrap().is_empty());
    }

    #[rstest]
    #[case("merged.pdf", true)]
    #[case("report (1).pdf", true)]
    #[case("../escape.pdf", false)]
    #[case("dir/file.pdf", false)]
    #[case("", false)]
    #[case("..", false)]
    fn test_validate_filename(#[case] filename: &str, #[case] valid: bool) {
        assert_eq!(validate_filename(filename).is_ok(), valid);
    }
}
