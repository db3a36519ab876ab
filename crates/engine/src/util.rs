use crate::{CompressionLevel, FileKind, ImageFormat, Orientation, PageSize};
use std::fmt::{Display, Formatter, Result as FmtResult};

/// PDF user-space units per millimetre.
pub(crate) const POINTS_PER_MM: f32 = 72.0 / 25.4;
/// Millimetres per CSS pixel (96 DPI).
pub(crate) const MM_PER_PIXEL: f32 = 25.4 / 96.0;

#[inline]
pub(crate) fn mm_to_pt(mm: f32) -> f32 {
    mm * POINTS_PER_MM
}

macro_rules! display_as_str {
    ($($ty:ty),+ $(,)?) => {$(
        impl Display for $ty {
            fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
                write!(f, "{}", self.as_str())
            }
        }
        impl AsRef<str> for $ty {
            fn as_ref(&self) -> &'static str {
                self.as_str()
            }
        }
    )+};
}
display_as_str!(CompressionLevel, PageSize, Orientation, ImageFormat);

impl CompressionLevel {
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            CompressionLevel::Basic => "basic",
            CompressionLevel::Strong => "strong",
        }
    }
}

impl PageSize {
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            PageSize::A4 => "a4",
            PageSize::Letter => "letter",
            PageSize::Original => "original",
        }
    }
}

impl Orientation {
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Orientation::Auto => "auto",
            Orientation::Portrait => "portrait",
            Orientation::Landscape => "landscape",
        }
    }
}

impl ImageFormat {
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            ImageFormat::Jpeg => "jpeg",
            ImageFormat::Png => "png",
            ImageFormat::Gif => "gif",
            ImageFormat::Webp => "webp",
            ImageFormat::Bmp => "bmp",
        }
    }

    /// The canonical media type.
    #[must_use]
    pub fn media_type(&self) -> &'static str {
        match self {
            ImageFormat::Jpeg => "image/jpeg",
            ImageFormat::Png => "image/png",
            ImageFormat::Gif => "image/gif",
            ImageFormat::Webp => "image/webp",
            ImageFormat::Bmp => "image/bmp",
        }
    }
}

impl Display for FileKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            FileKind::Pdf => write!(f, "pdf"),
            FileKind::Image(format) => write!(f, "{format}"),
        }
    }
}
