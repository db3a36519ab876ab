//! The boundary between the async session and the synchronous engine.
//!
//! Heavy document work runs on one dedicated OS thread so the runtime that
//! drives ingest and batch state never blocks on it. Each request carries a
//! correlation id; replies may complete in any order relative to the callers
//! waiting on them, and every call resolves to `Result<Response, Failure>`.
//!
//! ```
//! use sheaf_engine::{NativeEngine, Source};
//! use sheaf_worker::{FailureKind, TransformWorker, WorkerSettings};
//! use std::sync::Arc;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let worker = TransformWorker::spawn(Arc::new(NativeEngine::new()), WorkerSettings::default()).unwrap();
//! let failure = worker.page_count(Source::new("notes.txt", b"hello".to_vec())).await.unwrap_err();
//! assert_eq!(failure.kind, FailureKind::Corrupt);
//! # }
//! ```

mod broker;
pub mod error;
mod failure;
mod message;
mod worker;

pub use crate::broker::{Broker, Outcome};
pub use crate::failure::{Failure, FailureKind};
pub use crate::message::{Request, RequestId, Response};
pub use crate::worker::{TransformWorker, WorkerSettings};
