use crate::error::{Error, ErrorKind};
use crate::{CompressionLevel, FileKind, ImageFormat, Orientation, PageSize};
use std::{path::Path, str::FromStr};

const PDF_MAGIC: &[u8] = b"%PDF-";

impl FromStr for CompressionLevel {
    type Err = Error;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "basic" => Ok(CompressionLevel::Basic),
            "strong" => Ok(CompressionLevel::Strong),
            _ => exn::bail!(ErrorKind::InvalidOption(s.to_string())),
        }
    }
}

impl FromStr for PageSize {
    type Err = Error;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "a4" => Ok(PageSize::A4),
            "letter" => Ok(PageSize::Letter),
            "original" | "fit" => Ok(PageSize::Original),
            _ => exn::bail!(ErrorKind::InvalidOption(s.to_string())),
        }
    }
}

impl FromStr for Orientation {
    type Err = Error;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "auto" => Ok(Orientation::Auto),
            "portrait" => Ok(Orientation::Portrait),
            "landscape" => Ok(Orientation::Landscape),
            _ => exn::bail!(ErrorKind::InvalidOption(s.to_string())),
        }
    }
}

impl ImageFormat {
    /// Map a media type (`image/png`, ...) to a supported format.
    ///
    /// `image/jpg` is not a registered type, but browsers and some tools
    /// report it anyway.
    #[must_use]
    pub fn from_media_type(media_type: &str) -> Option<Self> {
        match media_type.trim().to_lowercase().as_str() {
            "image/jpeg" | "image/jpg" => Some(ImageFormat::Jpeg),
            "image/png" => Some(ImageFormat::Png),
            "image/gif" => Some(ImageFormat::Gif),
            "image/webp" => Some(ImageFormat::Webp),
            "image/bmp" => Some(ImageFormat::Bmp),
            _ => None,
        }
    }

    /// Detect a supported format from the leading bytes of a file.
    #[must_use]
    pub fn from_magic_bytes(bytes: &[u8]) -> Option<Self> {
        match image::guess_format(bytes).ok()? {
            image::ImageFormat::Jpeg => Some(ImageFormat::Jpeg),
            image::ImageFormat::Png => Some(ImageFormat::Png),
            image::ImageFormat::Gif => Some(ImageFormat::Gif),
            image::ImageFormat::WebP => Some(ImageFormat::Webp),
            image::ImageFormat::Bmp => Some(ImageFormat::Bmp),
            _ => None,
        }
    }

    pub(crate) fn as_image_format(self) -> image::ImageFormat {
        match self {
            ImageFormat::Jpeg => image::ImageFormat::Jpeg,
            ImageFormat::Png => image::ImageFormat::Png,
            ImageFormat::Gif => image::ImageFormat::Gif,
            ImageFormat::Webp => image::ImageFormat::WebP,
            ImageFormat::Bmp => image::ImageFormat::Bmp,
        }
    }
}

impl FileKind {
    /// Classify an input by its reported media type, falling back to the
    /// file name for PDFs (which are frequently reported with an empty or
    /// generic type).
    #[must_use]
    pub fn detect(media_type: Option<&str>, name: impl AsRef<Path>) -> Option<Self> {
        let media_type = media_type.map(str::trim).filter(|mt| !mt.is_empty());
        if media_type.is_some_and(|mt| mt.eq_ignore_ascii_case("application/pdf")) || Self::has_pdf_extension(&name) {
            return Some(FileKind::Pdf);
        }
        media_type.and_then(ImageFormat::from_media_type).map(FileKind::Image)
    }

    /// Detect the kind from content alone.
    #[must_use]
    pub fn from_magic_bytes(bytes: &[u8]) -> Option<Self> {
        if bytes.starts_with(PDF_MAGIC) {
            return Some(FileKind::Pdf);
        }
        ImageFormat::from_magic_bytes(bytes).map(FileKind::Image)
    }

    fn has_pdf_extension(name: impl AsRef<Path>) -> bool {
        name.as_ref()
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"))
    }

    pub fn is_pdf(&self) -> bool {
        matches!(self, FileKind::Pdf)
    }

    pub fn is_image(&self) -> bool {
        matches!(self, FileKind::Image(_))
    }
}
