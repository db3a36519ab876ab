//! In-memory sink, for embedding and tests.

use super::directory::numbered;
use super::{DownloadSink, validate_filename};
use crate::error::Result;
use async_trait::async_trait;
use std::collections::HashSet;
use std::path::PathBuf;
use time::UtcDateTime;
use tokio::sync::RwLock;

/// One recorded delivery.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Delivery {
    /// The name actually used, after de-duplication.
    pub filename: String,
    pub bytes: Vec<u8>,
    pub at: UtcDateTime,
}

/// Records deliveries instead of writing them anywhere.
///
/// Names are de-duplicated the same way [`DirectorySink`](super::DirectorySink)
/// does it, and the returned path is just the final name.
///
/// # Examples
///
/// ```
/// use sheaf_session::output::{DownloadSink, MemorySink};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
/// let sink = MemorySink::default();
/// sink.deliver("a.pdf", b"1").await?;
/// sink.deliver("a.pdf", b"2").await?;
/// assert_eq!(sink.filenames().await, ["a.pdf", "a (1).pdf"]);
/// # Ok(())
/// # }
/// ```
pub struct MemorySink {
    name: String,
    deliveries: RwLock<Vec<Delivery>>,
}

impl MemorySink {
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub async fn deliveries(&self) -> Vec<Delivery> {
        self.deliveries.read().await.clone()
    }

    pub async fn filenames(&self) -> Vec<String> {
        self.deliveries.read().await.iter().map(|delivery| delivery.filename.clone()).collect()
    }
}
impl Default for MemorySink {
    fn default() -> Self {
        Self {
            name: "memory".to_string(),
            deliveries: RwLock::new(Vec::new()),
        }
    }
}

#[async_trait]
impl DownloadSink for MemorySink {
    fn name(&self) -> &str {
        &self.name
    }

    async fn deliver(&self, filename: &str, bytes: &[u8]) -> Result<PathBuf> {
        let filename = validate_filename(filename)?;
        let mut deliveries = self.deliveries.write().await;
        let taken: HashSet<&str> = deliveries.iter().map(|delivery| delivery.filename.as_str()).collect();
        let unique = (0..)
            .map(|attempt| numbered(filename, attempt))
            .find(|candidate| !taken.contains(candidate.as_str()))
            .unwrap_or_else(|| filename.to_string());
        drop(taken);
        deliveries.push(Delivery {
            filename: unique.clone(),
            bytes: bytes.to_vec(),
            at: UtcDateTime::now(),
        });
        Ok(PathBuf::from(unique))
    }
}
