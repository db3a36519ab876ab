//! Page geometry for image conversion.
//!
//! Everything here is in millimetres with the origin at the bottom-left of
//! the page; conversion to PDF points happens when the page is written.

use crate::util::MM_PER_PIXEL;
use crate::{ConvertOptions, Dimensions, Orientation, PageSize};

const A4_MM: (f32, f32) = (210.0, 297.0);
const LETTER_MM: (f32, f32) = (215.9, 279.4);
/// Share of the shorter page side that a margin may take at most, so that
/// oversized margins on small pages still leave room for the image.
const MAX_MARGIN_SHARE: f32 = 0.45;

/// Where one image lands on its page.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Placement {
    pub page_width: f32,
    pub page_height: f32,
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl PageSize {
    /// Portrait page size in millimetres, or `None` for [`PageSize::Original`].
    pub fn dimensions_mm(&self) -> Option<(f32, f32)> {
        match self {
            PageSize::A4 => Some(A4_MM),
            PageSize::Letter => Some(LETTER_MM),
            PageSize::Original => None,
        }
    }
}

impl Orientation {
    /// Resolve [`Orientation::Auto`] against an image: `true` for landscape.
    pub fn is_landscape_for(&self, image: Dimensions) -> bool {
        match self {
            Orientation::Auto => image.is_landscape(),
            Orientation::Portrait => false,
            Orientation::Landscape => true,
        }
    }
}

/// Compute the page size and image rectangle for one image.
///
/// The image keeps its aspect ratio, is scaled to fill the area inside the
/// margins along its constraining axis, and is centred in that area.
pub fn place(image: Dimensions, options: &ConvertOptions) -> Placement {
    let (page_width, page_height) = match options.page_size.dimensions_mm() {
        // Orientation has no meaning when the page is the image.
        None => (image.width as f32 * MM_PER_PIXEL, image.height as f32 * MM_PER_PIXEL),
        Some((short, long)) if options.orientation.is_landscape_for(image) => (long, short),
        Some((short, long)) => (short, long),
    };

    let margin = options.margin_mm.clamp(0.0, page_width.min(page_height) * MAX_MARGIN_SHARE);
    let available_width = page_width - 2.0 * margin;
    let available_height = page_height - 2.0 * margin;

    let image_aspect = image.width.max(1) as f32 / image.height.max(1) as f32;
    let area_aspect = available_width / available_height;
    let (width, height) = if image_aspect > area_aspect {
        (available_width, available_width / image_aspect)
    } else {
        (available_height * image_aspect, available_height)
    };

    Placement {
        page_width,
        page_height,
        x: margin + (available_width - width) / 2.0,
        y: margin + (available_height - height) / 2.0,
        width,
        height,
    }
}
