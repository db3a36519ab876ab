use crate::preview::PreviewHandle;
use derive_more::Display;
use sheaf_engine::{Dimensions, FileKind, Source};
use sheaf_worker::{Failure, FailureKind};
use std::sync::Arc;
use uuid::Uuid;

/// Identity of a record, generated when the file is added.
///
/// Never derived from the name or content: two identical files added twice
/// are two records.
#[derive(Clone, Copy, Debug, Display, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FileId(Uuid);
impl FileId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}
impl Default for FileId {
    fn default() -> Self {
        Self::new()
    }
}

/// Lifecycle of a record: `Ingesting → Ready → (Transforming → Transformed)`,
/// or `Failed` from either phase.
#[derive(Clone, Copy, Debug, Display, PartialEq, Eq, Hash)]
pub enum Status {
    #[display("ingesting")]
    Ingesting,
    #[display("ready")]
    Ready,
    #[display("transforming")]
    Transforming,
    #[display("transformed")]
    Transformed,
    #[display("failed")]
    Failed,
}
impl Status {
    /// Can be picked up by a batch run.
    pub fn is_usable(&self) -> bool {
        matches!(self, Status::Ready | Status::Transformed)
    }
}

#[derive(Clone, Copy, Debug, Display, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Wrong file type.
    #[display("validation")]
    Validation,
    /// Unreadable or corrupt source; also used for size advisories.
    #[display("ingestion")]
    Ingestion,
    /// Password-protected source. The user can fix this themselves.
    #[display("encrypted")]
    Encrypted,
    #[display("transform")]
    Transform,
    #[display("timeout")]
    Timeout,
    /// Not a real error: the user asked for it.
    #[display("cancelled")]
    Cancelled,
}

/// A message attached to a record.
#[derive(Clone, Debug, Display, PartialEq, Eq)]
#[display("{message}")]
pub struct Notice {
    pub category: ErrorCategory,
    pub message: String,
    /// Informational only; does not stop the record from being processed.
    pub advisory: bool,
}
impl Notice {
    pub fn error(category: ErrorCategory, message: impl Into<String>) -> Self {
        Self {
            category,
            message: message.into(),
            advisory: false,
        }
    }

    pub fn advisory(message: impl Into<String>) -> Self {
        Self {
            category: ErrorCategory::Ingestion,
            message: message.into(),
            advisory: true,
        }
    }

    /// Keep the encrypted and timeout distinctions; everything else falls
    /// into `otherwise`.
    pub fn from_failure(failure: &Failure, otherwise: ErrorCategory) -> Self {
        let category = match failure.kind {
            FailureKind::Encrypted => ErrorCategory::Encrypted,
            FailureKind::Timeout => ErrorCategory::Timeout,
            FailureKind::Corrupt | FailureKind::Unknown => otherwise,
        };
        Self::error(category, failure.message.clone())
    }
}

/// Values filled in by ingest.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Derived {
    pub page_count: Option<u32>,
    pub dimensions: Option<Dimensions>,
    pub preview: Option<PreviewHandle>,
}

/// Output of a per-item transform.
#[derive(Clone, Debug, PartialEq)]
pub struct TransformResult {
    pub bytes: Arc<[u8]>,
    pub size: u64,
    /// Percentage saved relative to the original (negative if it grew).
    pub ratio: f64,
}
impl TransformResult {
    pub fn new(original_size: u64, bytes: Vec<u8>) -> Self {
        let size = bytes.len() as u64;
        let ratio = if original_size == 0 {
            0.0
        } else {
            (original_size as f64 - size as f64) / original_size as f64 * 100.0
        };
        Self {
            bytes: bytes.into(),
            size,
            ratio,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct FileRecord {
    pub id: FileId,
    pub name: String,
    pub original_size: u64,
    pub kind: FileKind,
    pub status: Status,
    /// Input bytes; present once ingest has read them.
    pub source: Option<Arc<[u8]>>,
    pub derived: Derived,
    pub last_error: Option<Notice>,
    /// Present only while `status` is `Transformed`.
    pub result: Option<TransformResult>,
}

impl FileRecord {
    pub(crate) fn new(name: impl Into<String>, original_size: u64, kind: FileKind) -> Self {
        Self {
            id: FileId::new(),
            name: name.into(),
            original_size,
            kind,
            status: Status::Ingesting,
            source: None,
            derived: Derived::default(),
            last_error: None,
            result: None,
        }
    }

    /// Payload for the worker; `None` until ingest has read the bytes.
    pub fn to_source(&self) -> Option<Source> {
        self.source.as_ref().map(|bytes| Source::new(self.name.clone(), Arc::clone(bytes)))
    }

    /// The size advisory, if that is all that is attached.
    pub fn advisory(&self) -> Option<&Notice> {
        self.last_error.as_ref().filter(|notice| notice.advisory)
    }

    pub(crate) fn keep_only_advisory(&mut self) {
        if self.last_error.as_ref().is_some_and(|notice| !notice.advisory) {
            self.last_error = None;
        }
    }

    pub(crate) fn fail(&mut self, notice: Notice) {
        self.status = Status::Failed;
        self.result = None;
        self.last_error = Some(notice);
    }

    pub(crate) fn complete(&mut self, result: TransformResult) {
        self.status = Status::Transformed;
        self.result = Some(result);
        self.keep_only_advisory();
    }

    /// Drop the result so a new run can replace it.
    pub(crate) fn invalidate(&mut self) {
        if self.status == Status::Transformed {
            self.status = Status::Ready;
        }
        self.result = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(1000, 250, 75.0)]
    #[case(1000, 1000, 0.0)]
    #[case(1000, 1500, -50.0)]
    #[case(0, 10, 0.0)]
    fn test_ratio(#[case] original: u64, #[case] compressed: usize, #[case] expected: f64) {
        let result = TransformResult::new(original, vec![0; compressed]);
        assert_eq!(result.size, compressed as u64);
        assert!((result.ratio - expected).abs() < f64::EPSILON);
    }

    #[rstest]
    #[case(FailureKind::Encrypted, ErrorCategory::Encrypted)]
    #[case(FailureKind::Timeout, ErrorCategory::Timeout)]
    #[case(FailureKind::Corrupt, ErrorCategory::Transform)]
    #[case(FailureKind::Unknown, ErrorCategory::Transform)]
    fn test_notice_from_failure(#[case] kind: FailureKind, #[case] expected: ErrorCategory) {
        let notice = Notice::from_failure(&Failure::new(kind, "nope"), ErrorCategory::Transform);
        assert_eq!(notice.category, expected);
        assert_eq!(notice.message, "nope");
        assert!(!notice.advisory);
    }

    #[test]
    fn ids_are_unique() {
        assert_ne!(FileId::new(), FileId::new());
    }

    #[test]
    fn completing_keeps_the_advisory() {
        let mut record = FileRecord::new("a.pdf", 10, FileKind::Pdf);
        record.last_error = Some(Notice::advisory("Large file"));
        record.complete(TransformResult::new(10, vec![1]));
        assert_eq!(record.status, Status::Transformed);
        assert!(record.advisory().is_some());

        record.invalidate();
        assert_eq!(record.status, Status::Ready);
        assert!(record.result.is_none());
    }

    #[test]
    fn failing_replaces_the_advisory() {
        let mut record = FileRecord::new("a.pdf", 10, FileKind::Pdf);
        record.last_error = Some(Notice::advisory("Large file"));
        record.fail(Notice::error(ErrorCategory::Ingestion, "Failed to read PDF"));
        assert_eq!(record.status, Status::Failed);
        assert!(record.advisory().is_none());
        assert_eq!(record.last_error.unwrap().message, "Failed to read PDF");
    }
}
