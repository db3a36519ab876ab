//! Small generated documents and images for tests.
//!
//! Available to this crate's own tests and, through the `mock` feature, to
//! other crates' tests that want real bytes for the native engine.

use crate::Source;
use image::{DynamicImage, ImageFormat, Rgb, RgbImage, Rgba, RgbaImage};
use lopdf::content::{Content, Operation};
use lopdf::{Document, Object, ObjectId, Stream, dictionary};
use std::io::Cursor;

/// Page dictionary key carrying `"<name>#<page number>"`, so tests can tell
/// pages apart after they've been moved between documents.
const LABEL_KEY: &[u8] = b"SheafLabel";

/// A valid PDF with `pages` pages.
///
/// `MediaBox` and `Resources` are set only on the page tree root, so pages
/// depend on inheritance.
pub fn pdf(name: &str, pages: u32) -> Source {
    let mut document = build(name, pages);
    Source::new(name, save(&mut document))
}

/// A PDF whose trailer references an encryption dictionary.
pub fn encrypted_pdf(name: &str) -> Source {
    let mut document = build(name, 1);
    let encrypt_id = document.add_object(dictionary! {
        "Filter" => "Standard",
        "V" => 1,
        "R" => 2,
        "O" => Object::string_literal(vec![0x11_u8; 32]),
        "U" => Object::string_literal(vec![0x22_u8; 32]),
        "P" => -44,
    });
    document.trailer.set("Encrypt", encrypt_id);
    Source::new(name, save(&mut document))
}

/// A two-page PDF with everything the compressor removes: uncompressed
/// repetitive content, unreferenced objects, an empty stream, document
/// information, XMP metadata and annotations.
pub fn bloated_pdf(name: &str) -> Source {
    let mut document = build(name, 2);
    let text = "BT /F1 12 Tf 72 700 Td (All work and no play makes a dull document.) Tj ET\n".repeat(400);
    for page_id in document.page_iter().collect::<Vec<_>>() {
        let content_id = document.add_object(Stream::new(dictionary! {}, text.clone().into_bytes()));
        let annotation_id = document.add_object(dictionary! {
            "Type" => "Annot",
            "Subtype" => "Text",
            "Rect" => [100, 100, 120, 120].map(Object::Integer).to_vec(),
            "Contents" => Object::string_literal("note"),
        });
        if let Ok(page) = document.get_dictionary_mut(page_id) {
            page.set("Contents", content_id);
            page.set("Annots", vec![Object::Reference(annotation_id)]);
        }
    }
    for _ in 0..20 {
        document.add_object(Stream::new(dictionary! {}, vec![b'x'; 2048]));
    }
    let empty_id = document.add_object(Stream::new(dictionary! {}, Vec::new()));
    let metadata_id = document.add_object(Stream::new(
        dictionary! { "Type" => "Metadata", "Subtype" => "XML" },
        b"<x:xmpmeta xmlns:x=\"adobe:ns:meta/\"></x:xmpmeta>".repeat(20),
    ));
    let info_id = document.add_object(dictionary! {
        "Title" => Object::string_literal("Bloated"),
        "Author" => Object::string_literal("Someone"),
        "Empty" => empty_id,
    });
    document.trailer.set("Info", info_id);
    if let Ok(catalog) = document.catalog_mut() {
        catalog.set("Metadata", metadata_id);
    }
    Source::new(name, save(&mut document))
}

/// The label of a page produced by [`pdf`].
pub fn page_label(document: &Document, page_id: ObjectId) -> Option<String> {
    let label = document.get_dictionary(page_id).ok()?.get(LABEL_KEY).ok()?.as_str().ok()?;
    Some(String::from_utf8_lossy(label).into_owned())
}

/// An opaque PNG of the given size.
pub fn png(name: &str, width: u32, height: u32) -> Source {
    let image = RgbImage::from_fn(width, height, |x, y| Rgb([(x % 256) as u8, (y % 256) as u8, 128]));
    Source::new(name, encode(DynamicImage::ImageRgb8(image), ImageFormat::Png))
}

/// A half-transparent PNG of the given size.
pub fn transparent_png(name: &str, width: u32, height: u32) -> Source {
    let image = RgbaImage::from_pixel(width, height, Rgba([200, 30, 30, 128]));
    Source::new(name, encode(DynamicImage::ImageRgba8(image), ImageFormat::Png))
}

/// A JPEG of the given size.
pub fn jpeg(name: &str, width: u32, height: u32) -> Source {
    let image = RgbImage::from_pixel(width, height, Rgb([30, 120, 200]));
    Source::new(name, encode(DynamicImage::ImageRgb8(image), ImageFormat::Jpeg))
}

fn encode(image: DynamicImage, format: ImageFormat) -> Vec<u8> {
    let mut cursor = Cursor::new(Vec::new());
    image.write_to(&mut cursor, format).expect("fixture image encodes");
    cursor.into_inner()
}

fn build(name: &str, pages: u32) -> Document {
    let mut document = Document::with_version("1.5");
    let pages_id = document.new_object_id();
    let font_id = document.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
    });

    let mut kids = Vec::new();
    for number in 1..=pages {
        let content = Content {
            operations: vec![
                Operation::new("BT", vec![]),
                Operation::new("Tf", vec!["F1".into(), 24.into()]),
                Operation::new("Td", vec![72.into(), 720.into()]),
                Operation::new("Tj", vec![Object::string_literal(format!("{name} page {number}"))]),
                Operation::new("ET", vec![]),
            ],
        };
        let content_id = document.add_object(Stream::new(dictionary! {}, content.encode().expect("fixture content")));
        let page_id = document.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
            "SheafLabel" => Object::string_literal(format!("{name}#{number}")),
        });
        kids.push(Object::Reference(page_id));
    }

    document.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Count" => i64::from(pages),
            "Kids" => kids,
            "MediaBox" => [0, 0, 595, 842].map(Object::Integer).to_vec(),
            "Resources" => dictionary! {
                "Font" => dictionary! { "F1" => font_id },
            },
        }),
    );
    let catalog_id = document.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    document.trailer.set("Root", catalog_id);
    document
}

fn save(document: &mut Document) -> Vec<u8> {
    let mut bytes = Vec::new();
    document.save_to(&mut bytes).expect("fixture document saves");
    bytes
}
