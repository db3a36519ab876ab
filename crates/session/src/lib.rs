//! The ordered file list and the batch runs over it.
//!
//! A [`Session`] backs one tool (merge, compress or convert). Files are
//! added as [`RawInput`]s, read and inspected in the background by the
//! document worker, reordered by the user, and then processed by a batch
//! run whose progress, per-file outcomes and final output are published as
//! [`SessionEvent`]s. Results leave through an [`output::DownloadSink`].
//!
//! ```
//! use sheaf_config::Config;
//! use sheaf_engine::MockEngine;
//! use sheaf_session::output::MemorySink;
//! use sheaf_session::{RawInput, Session, Status, Tool};
//! use std::sync::Arc;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
//! let sink = Arc::new(MemorySink::default());
//! let session = Session::init(Tool::Merge, &Config::default(), Arc::new(MockEngine::default()), sink.clone())?;
//!
//! let a = MockEngine::pdf("a.pdf", 2);
//! let b = MockEngine::pdf("b.pdf", 3);
//! session.add_files([
//!     RawInput::memory(&a.name, Some("application/pdf"), a.bytes),
//!     RawInput::memory(&b.name, Some("application/pdf"), b.bytes),
//! ])?;
//! session.settled().await;
//! assert!(session.files().iter().all(|file| file.status == Status::Ready));
//!
//! session.run()?.await?;
//! assert_eq!(session.last_output().map(|output| output.page_count), Some(5));
//! assert_eq!(sink.deliveries().await.len(), 1);
//! session.dispose();
//! # Ok(())
//! # }
//! ```

pub mod batch;
pub mod error;
mod event;
mod ingest;
mod input;
pub mod output;
mod preview;
mod record;
mod registry;
mod session;
mod tool;
mod util;

pub use crate::batch::{BatchRun, BatchStatus, Rerun, SkipReason};
pub use crate::event::SessionEvent;
pub use crate::input::{InputSource, RawInput};
pub use crate::preview::{PreviewHandle, PreviewStore};
pub use crate::record::{Derived, ErrorCategory, FileId, FileRecord, Notice, Status, TransformResult};
pub use crate::registry::FileRegistry;
pub use crate::session::{Output, Session};
pub use crate::tool::Tool;
pub use crate::util::format_file_size;
