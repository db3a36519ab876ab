use super::{PDF_VERSION, PRODUCER, load, save, save_packed};
use crate::error::Result;
use crate::{CompressionLevel, CompressionOptions, Source};
use lopdf::{Object, dictionary};

/// Rewrite a document to be smaller.
///
/// Every level drops unreferenced objects and empty streams, renumbers what
/// is left and flate-compresses any stream that isn't compressed already.
/// [`CompressionLevel::Strong`](crate::CompressionLevel::Strong) with
/// `remove_metadata` additionally replaces the document information with a
/// bare producer entry and drops the XMP metadata stream; the strong level
/// also packs objects into object streams.
#[tracing::instrument(level = "debug", skip_all, fields(name = %source.name, level = %options.level))]
pub fn compress(source: &Source, options: &CompressionOptions) -> Result<Vec<u8>> {
    let mut document = load(source)?;

    if options.flatten_annotations {
        let pages: Vec<_> = document.page_iter().collect();
        for page_id in pages {
            if let Ok(page) = document.get_dictionary_mut(page_id) {
                page.remove(b"Annots");
            }
        }
        if let Ok(catalog) = document.catalog_mut() {
            // Form fields are annotations too; without widgets the form is empty.
            catalog.remove(b"AcroForm");
        }
    }

    if options.strips_metadata() {
        let info_id = document.add_object(dictionary! {
            "Producer" => Object::string_literal(PRODUCER),
        });
        document.trailer.set("Info", info_id);
        if let Ok(catalog) = document.catalog_mut() {
            catalog.remove(b"Metadata");
        }
    }

    let pruned = document.prune_objects().len();
    let emptied = document.delete_zero_length_streams().len();
    document.renumber_objects();
    document.compress();
    tracing::debug!(pruned, emptied, "Rewrote document");

    match options.level {
        CompressionLevel::Basic => save(&mut document),
        CompressionLevel::Strong => {
            if document.version.as_str() < "1.5" {
                document.version = PDF_VERSION.to_string();
            }
            save_packed(&mut document)
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::fixtures;
    use crate::pdf::page_count;
    use lopdf::Document;

    fn strong() -> CompressionOptions {
        CompressionOptions {
            level: CompressionLevel::Strong,
            ..Default::default()
        }
    }

    #[test]
    fn keeps_every_page() {
        let source = fixtures::pdf("doc.pdf", 4);
        let bytes = compress(&source, &CompressionOptions::default()).unwrap();
        assert_eq!(page_count(&Source::new("out.pdf", bytes)).unwrap(), 4);
    }

    #[test]
    fn bloated_input_shrinks() {
        let source = fixtures::bloated_pdf("bloated.pdf");
        let bytes = compress(&source, &CompressionOptions::default()).unwrap();
        assert!(bytes.len() < source.len(), "{} >= {}", bytes.len(), source.len());
    }

    #[test]
    fn basic_level_keeps_metadata() {
        let source = fixtures::bloated_pdf("bloated.pdf");
        let bytes = compress(&source, &CompressionOptions::default()).unwrap();
        let document = Document::load_mem(&bytes).unwrap();
        let info = document.trailer.get(b"Info").and_then(Object::as_reference).unwrap();
        let info = document.get_dictionary(info).unwrap();
        assert!(info.has(b"Title"));
    }

    #[test]
    fn strong_level_strips_metadata() {
        let source = fixtures::bloated_pdf("bloated.pdf");
        let bytes = compress(&source, &strong()).unwrap();
        let document = Document::load_mem(&bytes).unwrap();
        let info = document.trailer.get(b"Info").and_then(Object::as_reference).unwrap();
        let info = document.get_dictionary(info).unwrap();
        assert!(!info.has(b"Title"));
        assert_eq!(info.get(b"Producer").and_then(Object::as_str).unwrap(), PRODUCER.as_bytes());
        assert!(!document.catalog().unwrap().has(b"Metadata"));
    }

    #[test]
    fn strong_level_can_keep_metadata() {
        let options = CompressionOptions {
            remove_metadata: false,
            ..strong()
        };
        let source = fixtures::bloated_pdf("bloated.pdf");
        let bytes = compress(&source, &options).unwrap();
        let document = Document::load_mem(&bytes).unwrap();
        assert!(document.catalog().unwrap().has(b"Metadata"));
    }

    #[test]
    fn flatten_removes_annotations() {
        let options = CompressionOptions {
            flatten_annotations: true,
            ..Default::default()
        };
        let source = fixtures::bloated_pdf("bloated.pdf");
        let bytes = compress(&source, &options).unwrap();
        let document = Document::load_mem(&bytes).unwrap();
        for page_id in document.page_iter() {
            assert!(!document.get_dictionary(page_id).unwrap().has(b"Annots"));
        }
    }

    #[test]
    fn strong_level_is_smaller_than_basic() {
        let source = fixtures::bloated_pdf("bloated.pdf");
        let basic = compress(&source, &CompressionOptions::default()).unwrap();
        let strong = compress(&source, &strong()).unwrap();
        assert!(strong.len() < basic.len(), "{} >= {}", strong.len(), basic.len());
        assert_eq!(page_count(&Source::new("out.pdf", strong)).unwrap(), 2);
    }

    #[test]
    fn encrypted_input_is_refused() {
        let source = fixtures::encrypted_pdf("locked.pdf");
        let err = compress(&source, &CompressionOptions::default()).unwrap_err();
        assert_eq!(*err, ErrorKind::Encrypted("locked.pdf".to_string()));
    }
}
