use crate::backend::Engine;
use crate::error::Result;
use crate::{Artifact, CompressionOptions, ConvertOptions, Dimensions, FileKind, Source, Thumbnail};
use crate::{convert, pdf, raster, render};

/// The real engine: `lopdf` for documents, `image` for rasters.
///
/// PDF previews need the PDFium library (see [`render`]); without it they
/// are simply absent.
#[derive(Clone, Debug)]
pub struct NativeEngine {
    name: String,
}

impl NativeEngine {
    pub fn new() -> Self {
        Self {
            name: "native".to_string(),
        }
    }
}
impl Default for NativeEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl Engine for NativeEngine {
    fn name(&self) -> &str {
        &self.name
    }

    fn page_count(&self, source: &Source) -> Result<u32> {
        pdf::page_count(source)
    }

    fn image_info(&self, source: &Source) -> Result<Dimensions> {
        raster::dimensions(source)
    }

    fn thumbnail(&self, source: &Source, kind: FileKind, height: u32, quality: u8) -> Result<Option<Thumbnail>> {
        match kind {
            FileKind::Pdf => render::thumbnail(source, height, quality),
            FileKind::Image(_) => raster::thumbnail(source, height, quality).map(Some),
        }
    }

    fn merge(&self, sources: &[Source]) -> Result<Artifact> {
        pdf::merge(sources)
    }

    fn compress(&self, source: &Source, options: &CompressionOptions) -> Result<Vec<u8>> {
        pdf::compress(source, options)
    }

    fn convert(
        &self,
        sources: &[Source],
        options: &ConvertOptions,
        progress: &mut dyn FnMut(usize),
    ) -> Result<Artifact> {
        convert::convert(sources, options, progress)
    }
}
