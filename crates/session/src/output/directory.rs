use super::{DownloadSink, validate_filename};
use crate::error::{ErrorKind, Result};
use async_trait::async_trait;
use exn::ResultExt;
use std::io::ErrorKind as IoErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs::{self, OpenOptions};
use tokio::io::{AsyncWrite, AsyncWriteExt};

/// Give up finding a free name after this many attempts.
const MAX_ATTEMPTS: u32 = 10_000;

/// Writes outputs into a directory, like a browser's downloads folder.
///
/// An existing file is never replaced: `report.pdf` is followed by
/// `report (1).pdf`, `report (2).pdf` and so on.
///
/// # Examples
///
/// ```no_run
/// use sheaf_session::output::{DirectorySink, DownloadSink};
///
/// # async fn example() -> sheaf_session::error::Result<()> {
/// let sink = DirectorySink::new("downloads", "/home/me/Downloads");
/// let path = sink.deliver("merged.pdf", b"%PDF-1.7").await?;
/// println!("saved to {}", path.display());
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Debug)]
pub struct DirectorySink {
    name: String,
    root: PathBuf,
}

impl DirectorySink {
    /// The directory is created on first delivery if needed.
    pub fn new(name: impl Into<String>, root: impl AsRef<Path>) -> Self {
        Self {
            name: name.into(),
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

#[async_trait]
impl DownloadSink for DirectorySink {
    fn name(&self) -> &str {
        &self.name
    }

    async fn deliver(&self, filename: &str, bytes: &[u8]) -> Result<PathBuf> {
        let filename = validate_filename(filename)?;
        fs::create_dir_all(&self.root)
            .await
            .or_raise(|| ErrorKind::Deliver(filename.to_string()))?;

        for attempt in 0..MAX_ATTEMPTS {
            let path = self.root.join(numbered(filename, attempt));
            // `create_new` makes the existence check and the creation atomic.
            let file = match OpenOptions::new().write(true).create_new(true).open(&path).await {
                Ok(file) => file,
                Err(err) if err.kind() == IoErrorKind::AlreadyExists => continue,
                Err(err) => return Err(err).or_raise(|| ErrorKind::Deliver(filename.to_string())),
            };
            write_new(&path, file, bytes)
                .await
                .or_raise(|| ErrorKind::Deliver(filename.to_string()))?;
            tracing::debug!(path = %path.display(), size = bytes.len(), "Wrote output");
            return Ok(path);
        }
        exn::bail!(ErrorKind::Deliver(filename.to_string()))
    }
}

/// Write `bytes` into the file just created at `path`. A write that does not
/// complete removes the file again, so no truncated output is left behind.
async fn write_new<W>(path: &Path, mut file: W, bytes: &[u8]) -> std::io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    let written = async {
        file.write_all(bytes).await?;
        file.flush().await
    }
    .await;
    let Err(err) = written else {
        return Ok(());
    };
    drop(file);
    if let Err(cleanup) = fs::remove_file(path).await {
        tracing::warn!(path = %path.display(), error = %cleanup, "Failed to remove partial output");
    }
    Err(err)
}

/// `name.pdf`, then `name (1).pdf`, `name (2).pdf`, ...
pub(crate) fn numbered(filename: &str, attempt: u32) -> String {
    if attempt == 0 {
        return filename.to_string();
    }
    match filename.rsplit_once('.') {
        Some((stem, extension)) if !stem.is_empty() => format!("{stem} ({attempt}).{extension}"),
        _ => format!("{filename} ({attempt})"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::io;
    use std::pin::Pin;
    use std::task::{Context, Poll};
    use tempfile::TempDir;

    struct FullDisk;

    impl AsyncWrite for FullDisk {
        fn poll_write(self: Pin<&mut Self>, _: &mut Context<'_>, _: &[u8]) -> Poll<io::Result<usize>> {
            Poll::Ready(Err(io::Error::other("no space left")))
        }

        fn poll_flush(self: Pin<&mut Self>, _: &mut Context<'_>) -> Poll<io::Result<()>> {
            Poll::Ready(Ok(()))
        }

        fn poll_shutdown(self: Pin<&mut Self>, _: &mut Context<'_>) -> Poll<io::Result<()>> {
            Poll::Ready(Ok(()))
        }
    }

    #[rstest]
    #[case("report.pdf", 0, "report.pdf")]
    #[case("report.pdf", 1, "report (1).pdf")]
    #[case("a.b.pdf", 2, "a.b (2).pdf")]
    #[case("README", 1, "README (1)")]
    #[case(".hidden", 1, ".hidden (1)")]
    fn test_numbered(#[case] filename: &str, #[case] attempt: u32, #[case] expected: &str) {
        assert_eq!(numbered(filename, attempt), expected);
    }

    #[tokio::test]
    async fn never_overwrites() {
        let dir = TempDir::new().unwrap();
        let sink = DirectorySink::new("test", dir.path().join("out"));

        let first = sink.deliver("merged.pdf", b"one").await.unwrap();
        let second = sink.deliver("merged.pdf", b"two").await.unwrap();
        let third = sink.deliver("merged.pdf", b"three").await.unwrap();

        assert_eq!(first, dir.path().join("out/merged.pdf"));
        assert_eq!(second, dir.path().join("out/merged (1).pdf"));
        assert_eq!(third, dir.path().join("out/merged (2).pdf"));
        assert_eq!(fs::read(&first).await.unwrap(), b"one");
        assert_eq!(fs::read(&third).await.unwrap(), b"three");
    }

    #[tokio::test]
    async fn failed_write_leaves_no_partial_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("merged.pdf");
        fs::write(&path, b"%PDF-1.7 trunc").await.unwrap();

        let err = write_new(&path, FullDisk, b"%PDF-1.7 full document").await.unwrap_err();
        assert_eq!(err.to_string(), "no space left");
        assert!(!fs::try_exists(&path).await.unwrap());
    }

    #[tokio::test]
    async fn rejects_paths() {
        let dir = TempDir::new().unwrap();
        let sink = DirectorySink::new("test", dir.path());
        let err = sink.deliver("../escape.pdf", b"x").await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::InvalidFilename(_)));
    }
}
