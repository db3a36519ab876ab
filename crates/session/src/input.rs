use crate::error::{ErrorKind, Result};
use exn::{OptionExt, ResultExt};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Where an input's bytes come from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum InputSource {
    Memory(Arc<[u8]>),
    /// Read during ingest, not when the input is added.
    Path(PathBuf),
}

/// A file as offered by the user, before it becomes a record.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RawInput {
    pub name: String,
    /// As reported by whoever offered the file; may be missing or generic.
    pub media_type: Option<String>,
    pub size: u64,
    pub source: InputSource,
}

impl RawInput {
    pub fn memory(name: impl Into<String>, media_type: Option<&str>, bytes: impl Into<Arc<[u8]>>) -> Self {
        let bytes = bytes.into();
        Self {
            name: name.into(),
            media_type: media_type.map(str::to_string),
            size: bytes.len() as u64,
            source: InputSource::Memory(bytes),
        }
    }

    /// Describe a file on disk. Only metadata is read here; the media type
    /// is guessed from the extension.
    pub async fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let metadata = tokio::fs::metadata(path)
            .await
            .or_raise(|| ErrorKind::Input(path.to_path_buf()))?;
        if !metadata.is_file() {
            exn::bail!(ErrorKind::Input(path.to_path_buf()));
        }
        let name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .ok_or_raise(|| ErrorKind::Input(path.to_path_buf()))?;
        let media_type = mime_guess::from_path(path).first().map(|mime| mime.essence_str().to_string());
        Ok(Self {
            name,
            media_type,
            size: metadata.len(),
            source: InputSource::Path(path.to_path_buf()),
        })
    }

    pub(crate) async fn read(&self) -> std::io::Result<Arc<[u8]>> {
        match &self.source {
            InputSource::Memory(bytes) => Ok(Arc::clone(bytes)),
            InputSource::Path(path) => tokio::fs::read(path).await.map(Arc::from),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use tempfile::TempDir;

    #[rstest]
    #[case("scan.pdf", Some("application/pdf"))]
    #[case("photo.JPG", Some("image/jpeg"))]
    #[case("diagram.png", Some("image/png"))]
    #[case("notes", None)]
    #[tokio::test]
    async fn test_from_path(#[case] name: &str, #[case] expected: Option<&str>) {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(name);
        tokio::fs::write(&path, b"12345").await.unwrap();

        let input = RawInput::from_path(&path).await.unwrap();
        assert_eq!(input.name, name);
        assert_eq!(input.size, 5);
        assert_eq!(input.media_type.as_deref(), expected);
        assert_eq!(&*input.read().await.unwrap(), b"12345");
    }

    #[tokio::test]
    async fn missing_path_is_an_error() {
        let dir = TempDir::new().unwrap();
        let err = RawInput::from_path(dir.path().join("absent.pdf")).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::Input(_)));
    }

    #[tokio::test]
    async fn directories_are_rejected() {
        let dir = TempDir::new().unwrap();
        let err = RawInput::from_path(dir.path()).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::Input(_)));
    }

    #[test]
    fn memory_input_size() {
        let input = RawInput::memory("a.pdf", None, b"abc".to_vec());
        assert_eq!(input.size, 3);
        assert_eq!(input.media_type, None);
    }
}
