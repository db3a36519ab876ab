//! The [`Engine`] trait and its implementations.

#[cfg(feature = "mock")]
mod mock;
mod native;

#[cfg(feature = "mock")]
pub use self::mock::MockEngine;
pub use self::native::NativeEngine;
use crate::error::Result;
use crate::{Artifact, CompressionOptions, ConvertOptions, Dimensions, FileKind, Source, Thumbnail};

/// Everything the rest of sheaf needs done to document bytes.
///
/// Implementations are synchronous and may take a long time (seconds for a
/// large merge); they are only ever invoked from the transform worker's own
/// thread. Errors about a single input carry that input's name.
///
/// # Examples
///
/// ```
/// use sheaf_engine::{Engine, Source, error::Result};
///
/// fn total_pages(engine: &dyn Engine, sources: &[Source]) -> Result<u32> {
///     sources.iter().map(|source| engine.page_count(source)).sum()
/// }
/// ```
pub trait Engine: Send + Sync {
    /// Name of the engine (for logging only).
    fn name(&self) -> &str;

    /// Number of pages in a PDF.
    fn page_count(&self, source: &Source) -> Result<u32>;

    /// Pixel dimensions of a raster image.
    fn image_info(&self, source: &Source) -> Result<Dimensions>;

    /// A JPEG preview `height` pixels tall, or `None` when this engine cannot
    /// rasterise inputs of this kind.
    fn thumbnail(&self, source: &Source, kind: FileKind, height: u32, quality: u8) -> Result<Option<Thumbnail>>;

    /// Concatenate all pages of all sources, in order.
    fn merge(&self, sources: &[Source]) -> Result<Artifact>;

    /// Rewrite one PDF to be smaller.
    fn compress(&self, source: &Source, options: &CompressionOptions) -> Result<Vec<u8>>;

    /// One PDF page per image, in order. `progress` is told how many images
    /// have been placed so far, after each one.
    fn convert(
        &self,
        sources: &[Source],
        options: &ConvertOptions,
        progress: &mut dyn FnMut(usize),
    ) -> Result<Artifact>;
}
