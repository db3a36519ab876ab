//! Image-to-PDF document assembly.

mod layout;

pub use self::layout::{Placement, place};
use crate::error::{ErrorKind, Result};
use crate::pdf::{PDF_VERSION, PRODUCER};
use crate::util::mm_to_pt;
use crate::{Artifact, ConvertOptions, Dimensions, Source, raster};
use exn::ResultExt;
use flate2::Compression;
use flate2::write::ZlibEncoder;
use image::RgbImage;
use lopdf::content::{Content, Operation};
use lopdf::{Document, Object, ObjectId, Stream, dictionary};
use std::io::Write;

const IMAGE_NAME: &str = "Im1";

/// Build one PDF with a page per image, in order.
///
/// Any image that cannot be decoded aborts the conversion; the error names
/// the offending input.
#[tracing::instrument(level = "debug", skip_all, fields(images = sources.len(), page_size = %options.page_size))]
pub fn convert(
    sources: &[Source],
    options: &ConvertOptions,
    progress: &mut dyn FnMut(usize),
) -> Result<Artifact> {
    if sources.is_empty() {
        exn::bail!(ErrorKind::EmptyBatch);
    }

    let mut document = Document::with_version(PDF_VERSION);
    let pages_id = document.new_object_id();
    let mut kids = Vec::with_capacity(sources.len());

    for source in sources {
        let image = raster::flatten(&raster::decode(source)?);
        let dimensions = Dimensions::new(image.width(), image.height());
        let placement = place(dimensions, options);
        let image_id = document.add_object(embed(&image, options)?);
        let content_id = document.add_object(Stream::new(dictionary! {}, draw(&placement)?));
        let page_id = document.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "MediaBox" => vec![
                Object::Integer(0),
                Object::Integer(0),
                Object::Real(mm_to_pt(placement.page_width)),
                Object::Real(mm_to_pt(placement.page_height)),
            ],
            "Resources" => dictionary! {
                "XObject" => dictionary! { IMAGE_NAME => image_id },
            },
            "Contents" => content_id,
        });
        kids.push(Object::Reference(page_id));
        tracing::trace!(name = %source.name, width = dimensions.width, height = dimensions.height, "Placed image");
        progress(kids.len());
    }

    let count = u32::try_from(kids.len()).unwrap_or(u32::MAX);
    document.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => i64::from(count),
        }),
    );
    finish(&mut document, pages_id);
    document.compress();

    Ok(Artifact {
        bytes: crate::pdf::save(&mut document)?,
        page_count: count,
    })
}

fn finish(document: &mut Document, pages_id: ObjectId) {
    let catalog_id = document.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    let info_id = document.add_object(dictionary! {
        "Producer" => Object::string_literal(PRODUCER),
    });
    document.trailer.set("Root", catalog_id);
    document.trailer.set("Info", info_id);
}

/// An image XObject: baseline JPEG, or zlib-compressed raw RGB when lossless.
fn embed(image: &RgbImage, options: &ConvertOptions) -> Result<Stream> {
    let mut dict = dictionary! {
        "Type" => "XObject",
        "Subtype" => "Image",
        "Width" => i64::from(image.width()),
        "Height" => i64::from(image.height()),
        "ColorSpace" => "DeviceRGB",
        "BitsPerComponent" => 8,
    };
    let content = if options.is_lossless() {
        dict.set("Filter", "FlateDecode");
        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::best());
        encoder.write_all(image.as_raw()).or_raise(|| ErrorKind::Encode)?;
        encoder.finish().or_raise(|| ErrorKind::Encode)?
    } else {
        dict.set("Filter", "DCTDecode");
        raster::encode_jpeg(image, options.jpeg_quality())?
    };
    // Already compressed; a second flate pass would only cost time.
    Ok(Stream::new(dict, content).with_compression(false))
}

/// Content stream drawing the image into its placement rectangle.
fn draw(placement: &Placement) -> Result<Vec<u8>> {
    let content = Content {
        operations: vec![
            Operation::new("q", vec![]),
            Operation::new(
                "cm",
                vec![
                    mm_to_pt(placement.width).into(),
                    0.into(),
                    0.into(),
                    mm_to_pt(placement.height).into(),
                    mm_to_pt(placement.x).into(),
                    mm_to_pt(placement.y).into(),
                ],
            ),
            Operation::new("Do", vec![Object::Name(IMAGE_NAME.as_bytes().to_vec())]),
            Operation::new("Q", vec![]),
        ],
    };
    content.encode().or_raise(|| ErrorKind::Encode)
}
