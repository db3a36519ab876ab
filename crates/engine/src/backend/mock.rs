//! Scripted engine for testing.

use crate::backend::Engine;
use crate::error::{ErrorKind, Result};
use crate::{Artifact, CompressionLevel, CompressionOptions, ConvertOptions, Dimensions, FileKind, Source, Thumbnail};
use exn::OptionExt;
use std::sync::Mutex;
use std::time::Duration;

const PDF_PREFIX: &str = "mock:";
const IMAGE_PREFIX: &str = "mock-image:";
const ENCRYPTED_MARKER: &str = "encrypted";
const CORRUPT_MARKER: &str = "corrupt";
const HANG_MARKER: &str = "hang";

/// Engine that interprets tiny text payloads instead of real documents.
///
/// The first line of a payload describes it:
///
/// - `mock:<pages>` is a PDF with that many pages.
/// - `mock-image:<width>x<height>` is an image.
///
/// Anything after the first line is padding (so tests can control sizes).
/// A payload containing `encrypted` or `corrupt` fails with that error;
/// one containing `hang` blocks for [`with_hang`](Self::with_hang) before
/// answering. Every call takes at least [`with_delay`](Self::with_delay).
///
/// # Examples
///
/// ```
/// use sheaf_engine::{Engine, MockEngine};
///
/// let engine = MockEngine::default();
/// let merged = engine
///     .merge(&[MockEngine::pdf("a.pdf", 2), MockEngine::pdf("b.pdf", 3)])
///     .unwrap();
/// assert_eq!(merged.page_count, 5);
/// assert_eq!(engine.calls(), ["merge"]);
/// ```
pub struct MockEngine {
    name: String,
    delay: Duration,
    hang: Duration,
    calls: Mutex<Vec<&'static str>>,
}

impl MockEngine {
    /// A PDF payload with `pages` pages.
    pub fn pdf(name: &str, pages: u32) -> Source {
        Source::new(name, format!("{PDF_PREFIX}{pages}").into_bytes())
    }

    /// A PDF payload padded to exactly `size` bytes (or its minimum size).
    pub fn padded_pdf(name: &str, pages: u32, size: usize) -> Source {
        Source::new(name, pad(format!("{PDF_PREFIX}{pages}"), size))
    }

    /// An image payload.
    pub fn image(name: &str, width: u32, height: u32) -> Source {
        Source::new(name, format!("{IMAGE_PREFIX}{width}x{height}").into_bytes())
    }

    /// A payload that fails as encrypted.
    pub fn encrypted(name: &str) -> Source {
        Source::new(name, format!("{PDF_PREFIX}1\n{ENCRYPTED_MARKER}").into_bytes())
    }

    /// A payload that fails as corrupt.
    pub fn corrupt(name: &str) -> Source {
        Source::new(name, format!("{PDF_PREFIX}1\n{CORRUPT_MARKER}").into_bytes())
    }

    /// A payload that blocks the engine before answering.
    pub fn hanging(name: &str) -> Source {
        Source::new(name, format!("{PDF_PREFIX}1\n{HANG_MARKER}").into_bytes())
    }

    /// Minimum time every call takes.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// How long a `hang` payload blocks.
    pub fn with_hang(mut self, hang: Duration) -> Self {
        self.hang = hang;
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Operations invoked so far, in order.
    pub fn calls(&self) -> Vec<&'static str> {
        self.calls.lock().map(|calls| calls.clone()).unwrap_or_default()
    }

    fn enter(&self, operation: &'static str, sources: &[&Source]) -> Result<()> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(operation);
        }
        if !self.delay.is_zero() {
            std::thread::sleep(self.delay);
        }
        for source in sources {
            let text = String::from_utf8_lossy(&source.bytes);
            if text.contains(HANG_MARKER) {
                std::thread::sleep(self.hang);
            }
            if text.contains(ENCRYPTED_MARKER) {
                exn::bail!(ErrorKind::Encrypted(source.name.clone()));
            }
            if text.contains(CORRUPT_MARKER) {
                exn::bail!(ErrorKind::Corrupt(source.name.clone()));
            }
        }
        Ok(())
    }

    fn pages_of(source: &Source) -> Result<u32> {
        header(source)
            .strip_prefix(PDF_PREFIX)
            .and_then(|pages| pages.trim().parse::<u32>().ok())
            .filter(|pages| *pages > 0)
            .ok_or_raise(|| ErrorKind::Corrupt(source.name.clone()))
    }

    fn dimensions_of(source: &Source) -> Result<Dimensions> {
        header(source)
            .strip_prefix(IMAGE_PREFIX)
            .and_then(|size| size.trim().split_once('x'))
            .and_then(|(w, h)| Some(Dimensions::new(w.parse().ok()?, h.parse().ok()?)))
            .filter(|d| d.width > 0 && d.height > 0)
            .ok_or_raise(|| ErrorKind::UnsupportedImage(source.name.clone()))
    }
}
impl Default for MockEngine {
    fn default() -> Self {
        Self {
            name: "mock".to_string(),
            delay: Duration::ZERO,
            hang: Duration::from_secs(30),
            calls: Mutex::new(Vec::new()),
        }
    }
}

fn header(source: &Source) -> String {
    let text = String::from_utf8_lossy(&source.bytes);
    text.lines().next().unwrap_or_default().to_string()
}

fn pad(header: String, size: usize) -> Vec<u8> {
    let mut bytes = header.into_bytes();
    if bytes.len() + 1 < size {
        bytes.push(b'\n');
        bytes.resize(size, b'.');
    }
    bytes
}

impl Engine for MockEngine {
    fn name(&self) -> &str {
        &self.name
    }

    fn page_count(&self, source: &Source) -> Result<u32> {
        self.enter("page_count", &[source])?;
        Self::pages_of(source)
    }

    fn image_info(&self, source: &Source) -> Result<Dimensions> {
        self.enter("image_info", &[source])?;
        Self::dimensions_of(source)
    }

    fn thumbnail(&self, source: &Source, kind: FileKind, height: u32, _quality: u8) -> Result<Option<Thumbnail>> {
        self.enter("thumbnail", &[source])?;
        let dimensions = match kind {
            FileKind::Pdf => {
                Self::pages_of(source)?;
                // A4 portrait.
                Dimensions::new(height * 210 / 297, height)
            },
            FileKind::Image(_) => {
                let original = Self::dimensions_of(source)?;
                let width = u64::from(original.width) * u64::from(height) / u64::from(original.height);
                Dimensions::new(u32::try_from(width).unwrap_or(u32::MAX).max(1), height)
            },
        };
        Ok(Some(Thumbnail {
            dimensions,
            bytes: format!("mock-thumbnail:{}x{}", dimensions.width, dimensions.height).into_bytes(),
        }))
    }

    fn merge(&self, sources: &[Source]) -> Result<Artifact> {
        self.enter("merge", &sources.iter().collect::<Vec<_>>())?;
        if sources.is_empty() {
            exn::bail!(ErrorKind::EmptyBatch);
        }
        let page_count = sources.iter().map(Self::pages_of).sum::<Result<u32>>()?;
        Ok(Artifact {
            bytes: format!("{PDF_PREFIX}{page_count}").into_bytes(),
            page_count,
        })
    }

    /// Output keeps the page count and shrinks to a half (basic) or a
    /// quarter (strong) of the input size.
    fn compress(&self, source: &Source, options: &CompressionOptions) -> Result<Vec<u8>> {
        self.enter("compress", &[source])?;
        let pages = Self::pages_of(source)?;
        let target = match options.level {
            CompressionLevel::Basic => source.len() / 2,
            CompressionLevel::Strong => source.len() / 4,
        };
        Ok(pad(format!("{PDF_PREFIX}{pages}"), target))
    }

    fn convert(
        &self,
        sources: &[Source],
        _options: &ConvertOptions,
        progress: &mut dyn FnMut(usize),
    ) -> Result<Artifact> {
        self.enter("convert", &sources.iter().collect::<Vec<_>>())?;
        if sources.is_empty() {
            exn::bail!(ErrorKind::EmptyBatch);
        }
        for (index, source) in sources.iter().enumerate() {
            Self::dimensions_of(source)?;
            progress(index + 1);
        }
        let page_count = u32::try_from(sources.len()).unwrap_or(u32::MAX);
        Ok(Artifact {
            bytes: format!("{PDF_PREFIX}{page_count}").into_bytes(),
            page_count,
        })
    }
}
