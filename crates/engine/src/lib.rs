//! Document transforms for sheaf.
//!
//! This crate is the only place that understands PDF and raster bytes. It
//! exposes the heavy operations (merge, compress, image-to-PDF conversion)
//! and the light ones used while ingesting (page count, pixel dimensions,
//! previews) behind the [`Engine`] trait, so that the rest of the workspace
//! only ever handles opaque [`Source`] payloads.
//!
//! - [`NativeEngine`] is the real implementation built on `lopdf` and `image`,
//!   with PDF previews from PDFium when the `pdfium` feature is enabled.
//! - [`MockEngine`] (feature `mock`) interprets tiny text payloads instead of
//!   real documents, for tests that care about orchestration rather than
//!   codecs.
//!
//! All engine methods are synchronous and CPU-bound; callers are expected to
//! run them off any async executor thread.

pub mod backend;
mod construct;
pub mod convert;
pub mod error;
#[cfg(any(test, feature = "mock"))]
pub mod fixtures;
mod options;
pub mod pdf;
pub mod raster;
pub mod render;
mod util;

#[cfg(feature = "mock")]
pub use crate::backend::MockEngine;
pub use crate::backend::{Engine, NativeEngine};
pub use crate::options::{CompressionLevel, CompressionOptions, ConvertOptions, Orientation, PageSize};
use std::sync::Arc;

pub type EngineHandle = Arc<dyn Engine + Send + Sync>;

/// A named, read-only input payload.
///
/// Cloning is cheap (the bytes are reference counted), which is how payloads
/// are handed to the worker thread: the worker holds its clone for exactly
/// as long as one request takes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Source {
    /// Display name, used in error messages (usually the original file name).
    pub name: String,
    pub bytes: Arc<[u8]>,
}
impl Source {
    pub fn new(name: impl Into<String>, bytes: impl Into<Arc<[u8]>>) -> Self {
        Self {
            name: name.into(),
            bytes: bytes.into(),
        }
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// The kind of file an input was accepted as.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum FileKind {
    Pdf,
    Image(ImageFormat),
}

/// Raster formats accepted for conversion.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum ImageFormat {
    Jpeg,
    Png,
    Gif,
    Webp,
    Bmp,
}

/// Pixel dimensions of a raster image.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}
impl Dimensions {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Wider than tall.
    pub fn is_landscape(&self) -> bool {
        self.width > self.height
    }
}

/// A small JPEG preview of an input.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Thumbnail {
    pub dimensions: Dimensions,
    /// JPEG-encoded bytes.
    pub bytes: Vec<u8>,
}

/// The single output of a whole-batch operation (merge, convert).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Artifact {
    pub bytes: Vec<u8>,
    pub page_count: u32,
}
