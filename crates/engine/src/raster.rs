//! Raster decoding, previews and JPEG encoding.

use crate::error::{ErrorKind, Result};
use crate::{Dimensions, ImageFormat, Source, Thumbnail};
use exn::{OptionExt, ResultExt};
use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, ImageReader, RgbImage};
use std::io::Cursor;

/// Read pixel dimensions from the image header without decoding pixels.
#[tracing::instrument(level = "debug", skip_all, fields(name = %source.name))]
pub fn dimensions(source: &Source) -> Result<Dimensions> {
    let (width, height) = reader(source)?
        .into_dimensions()
        .or_raise(|| ErrorKind::UnsupportedImage(source.name.clone()))?;
    if width == 0 || height == 0 {
        exn::bail!(ErrorKind::UnsupportedImage(source.name.clone()));
    }
    Ok(Dimensions::new(width, height))
}

/// Fully decode an image.
pub fn decode(source: &Source) -> Result<DynamicImage> {
    reader(source)?.decode().or_raise(|| ErrorKind::UnsupportedImage(source.name.clone()))
}

fn reader(source: &Source) -> Result<ImageReader<Cursor<&[u8]>>> {
    // Content wins over the name: a mislabelled file still decodes, and
    // anything outside the supported set is rejected before decoding.
    let format = ImageFormat::from_magic_bytes(&source.bytes)
        .ok_or_raise(|| ErrorKind::UnsupportedImage(source.name.clone()))?;
    Ok(ImageReader::with_format(Cursor::new(&source.bytes[..]), format.as_image_format()))
}

/// Composite onto white and drop the alpha channel.
///
/// PDF image XObjects are embedded as opaque `DeviceRGB`; simply discarding
/// alpha would turn transparent regions black.
pub fn flatten(image: &DynamicImage) -> RgbImage {
    if !image.color().has_alpha() {
        return image.to_rgb8();
    }
    let rgba = image.to_rgba8();
    RgbImage::from_fn(rgba.width(), rgba.height(), |x, y| {
        let [r, g, b, a] = rgba.get_pixel(x, y).0;
        let alpha = u16::from(a);
        let blend = |channel: u8| ((u16::from(channel) * alpha + 255 * (255 - alpha)) / 255) as u8;
        image::Rgb([blend(r), blend(g), blend(b)])
    })
}

/// Encode RGB pixels as a baseline JPEG.
pub fn encode_jpeg(image: &RgbImage, quality: u8) -> Result<Vec<u8>> {
    let mut bytes = Vec::new();
    JpegEncoder::new_with_quality(&mut bytes, quality.clamp(1, 100))
        .encode_image(image)
        .or_raise(|| ErrorKind::Encode)?;
    Ok(bytes)
}

/// Scale an image to `height` pixels tall (keeping its aspect ratio) and
/// encode it as a JPEG preview.
#[tracing::instrument(level = "debug", skip_all, fields(name = %source.name, height))]
pub fn thumbnail(source: &Source, height: u32, quality: u8) -> Result<Thumbnail> {
    let image = decode(source)?;
    let height = height.max(1);
    let width = ((u64::from(image.width()) * u64::from(height)) / u64::from(image.height().max(1))).max(1);
    let width = u32::try_from(width).unwrap_or(u32::MAX);
    let scaled = image.thumbnail(width, height);
    let rgb = flatten(&scaled);
    let dimensions = Dimensions::new(rgb.width(), rgb.height());
    Ok(Thumbnail {
        dimensions,
        bytes: encode_jpeg(&rgb, quality)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::fixtures;

    #[test]
    fn reads_dimensions_without_decoding() {
        let source = fixtures::png("photo.png", 64, 32);
        assert_eq!(dimensions(&source).unwrap(), Dimensions::new(64, 32));
    }

    #[test]
    fn rejects_non_images() {
        let source = Source::new("notes.txt", b"just some text".to_vec());
        let err = dimensions(&source).unwrap_err();
        assert_eq!(*err, ErrorKind::UnsupportedImage("notes.txt".to_string()));
    }

    #[test]
    fn rejects_truncated_images() {
        let mut bytes = fixtures::png("photo.png", 64, 32).bytes.to_vec();
        bytes.truncate(40);
        let source = Source::new("photo.png", bytes);
        assert!(decode(&source).is_err());
    }

    #[test]
    fn thumbnail_scales_to_height() {
        let source = fixtures::png("photo.png", 400, 200);
        let thumb = thumbnail(&source, 96, 70).unwrap();
        assert_eq!(thumb.dimensions, Dimensions::new(192, 96));
        assert!(thumb.bytes.starts_with(&[0xFF, 0xD8]));
    }

    #[test]
    fn flatten_composites_transparency_onto_white() {
        let image = DynamicImage::ImageRgba8(image::RgbaImage::from_pixel(2, 2, image::Rgba([0, 0, 0, 0])));
        let flat = flatten(&image);
        assert_eq!(flat.get_pixel(0, 0).0, [255, 255, 255]);
    }
}
