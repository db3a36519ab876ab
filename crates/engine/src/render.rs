//! First-page previews for PDF inputs.
//!
//! Rasterising is delegated to the PDFium shared library through
//! `pdfium-render` (feature `pdfium`). The library is bound lazily, once per
//! thread, and only ever used from the thread that bound it; in practice
//! that is the transform worker's dedicated thread. When the feature is off,
//! or the library cannot be found at runtime, PDF inputs simply have no
//! preview.

use crate::error::Result;
use crate::{Source, Thumbnail};

#[cfg(feature = "pdfium")]
pub use self::pdfium::first_page;

/// Render a preview of the first page, `height` pixels tall.
///
/// Returns `Ok(None)` when no renderer is available.
pub fn thumbnail(source: &Source, height: u32, quality: u8) -> Result<Option<Thumbnail>> {
    #[cfg(feature = "pdfium")]
    {
        self::pdfium::with_bound(|pdfium| first_page(pdfium, source, height, quality))
    }
    #[cfg(not(feature = "pdfium"))]
    {
        let _ = (source, height, quality);
        Ok(None)
    }
}

#[cfg(feature = "pdfium")]
mod pdfium {
    use super::*;
    use crate::error::ErrorKind;
    use crate::raster;
    use crate::Dimensions;
    use exn::ResultExt;
    use pdfium_render::prelude::{PdfRenderConfig, Pdfium, PdfiumError, PdfiumInternalError};
    use std::cell::OnceCell;

    thread_local! {
        static BOUND: OnceCell<Option<Pdfium>> = const { OnceCell::new() };
    }

    fn bind() -> Option<Pdfium> {
        match Pdfium::bind_to_system_library() {
            Ok(bindings) => {
                tracing::debug!("bound to the system pdfium library");
                Some(Pdfium::new(bindings))
            },
            Err(err) => {
                tracing::warn!(error = %err, "pdfium is unavailable; PDF previews are disabled");
                None
            },
        }
    }

    pub(super) fn with_bound<T>(f: impl FnOnce(Option<&Pdfium>) -> Result<Option<T>>) -> Result<Option<T>> {
        BOUND.with(|cell| f(cell.get_or_init(bind).as_ref()))
    }

    /// Render the first page with an already bound library, or `Ok(None)`
    /// without one.
    pub fn first_page(pdfium: Option<&Pdfium>, source: &Source, height: u32, quality: u8) -> Result<Option<Thumbnail>> {
        let Some(pdfium) = pdfium else {
            return Ok(None);
        };
        let corrupt = || ErrorKind::Corrupt(source.name.clone());
        let document = match pdfium.load_pdf_from_byte_slice(&source.bytes, None) {
            Err(PdfiumError::PdfiumLibraryInternalError(PdfiumInternalError::PasswordError)) => {
                exn::bail!(ErrorKind::Encrypted(source.name.clone()))
            },
            loaded => loaded.or_raise(corrupt)?,
        };
        let page = document.pages().first().or_raise(corrupt)?;
        let target = i32::try_from(height.max(1)).unwrap_or(i32::MAX);
        let bitmap = page
            .render_with_config(&PdfRenderConfig::new().set_target_height(target))
            .or_raise(corrupt)?;
        let rgb = raster::flatten(&bitmap.as_image());
        Ok(Some(Thumbnail {
            dimensions: Dimensions::new(rgb.width(), rgb.height()),
            bytes: raster::encode_jpeg(&rgb, quality)?,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures;

    #[cfg(not(feature = "pdfium"))]
    #[test]
    fn no_renderer_means_no_preview() {
        let source = fixtures::pdf("doc.pdf", 1);
        assert_eq!(thumbnail(&source, 96, 70).unwrap(), None);
    }

    #[cfg(feature = "pdfium")]
    #[test]
    fn unbound_library_means_no_preview() {
        let source = fixtures::pdf("doc.pdf", 1);
        assert_eq!(first_page(None, &source, 96, 70).unwrap(), None);
    }

    #[cfg(feature = "pdfium")]
    #[test]
    fn bound_library_renders_to_height() {
        let source = fixtures::pdf("doc.pdf", 1);
        // Hosts without a PDFium library take the fallback path.
        if let Some(thumb) = thumbnail(&source, 96, 70).unwrap() {
            assert_eq!(thumb.dimensions.height, 96);
            assert_eq!(&thumb.bytes[..2], &[0xFF, 0xD8]);
        }
    }
}
