use crate::batch::BatchRun;
use crate::record::FileId;
use std::path::PathBuf;

/// Something observable changed.
///
/// Events are sent while the session state is locked, so a subscriber sees
/// them in exactly the order the mutations happened. Subscribers that fall
/// behind lose the oldest events and should re-read the state.
#[derive(Clone, Debug, PartialEq)]
pub enum SessionEvent {
    FilesAdded(Vec<FileId>),
    /// Status, derived values, error or result of one record changed.
    FileUpdated(FileId),
    FileRemoved(FileId),
    /// A reorder or move was applied; `changed` is `false` for a no-op.
    Reordered { changed: bool },
    Cleared,
    Batch(BatchRun),
    /// The batch-level message was set or cleared.
    Banner(Option<String>),
    OptionsChanged,
    Delivered(PathBuf),
    Disposed,
}
