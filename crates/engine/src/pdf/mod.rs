//! PDF loading, saving and the document-level transforms.

mod compress;
mod merge;

pub use self::compress::compress;
pub use self::merge::merge;
use crate::Source;
use crate::error::{ErrorKind, Result};
use exn::ResultExt;
use lopdf::Document;

pub(crate) const PDF_VERSION: &str = "1.7";
pub(crate) const PRODUCER: &str = "sheaf";
const ENCRYPT_MARKER: &[u8] = b"/Encrypt";

/// Parse a document, classifying failures as encrypted or corrupt.
///
/// Documents that carry an encryption dictionary are refused even when
/// `lopdf` manages to open them with an empty user password: their content
/// streams may still be restricted, and the user can remove the protection
/// themselves.
#[tracing::instrument(level = "debug", skip_all, fields(name = %source.name, size = source.len()))]
pub fn load(source: &Source) -> Result<Document> {
    match Document::load_mem(&source.bytes) {
        Ok(document) if document.encryption_state.is_some() || document.is_encrypted() => {
            exn::bail!(ErrorKind::Encrypted(source.name.clone()))
        },
        Ok(document) => Ok(document),
        Err(lopdf::Error::Decryption(_)) => {
            exn::bail!(ErrorKind::Encrypted(source.name.clone()))
        },
        Err(err) if contains(&source.bytes, ENCRYPT_MARKER) => {
            tracing::debug!(error = %err, "Load failed on a document with an encryption dictionary");
            exn::bail!(ErrorKind::Encrypted(source.name.clone()))
        },
        Err(err) => Err(err).or_raise(|| ErrorKind::Corrupt(source.name.clone())),
    }
}

/// Number of pages in the document; a document without pages is corrupt.
pub fn page_count(source: &Source) -> Result<u32> {
    let document = load(source)?;
    let count = count_pages(&document);
    if count == 0 {
        exn::bail!(ErrorKind::Corrupt(source.name.clone()));
    }
    Ok(count)
}

pub(crate) fn count_pages(document: &Document) -> u32 {
    u32::try_from(document.page_iter().count()).unwrap_or(u32::MAX)
}

/// Serialize a document with a classic cross-reference table.
pub(crate) fn save(document: &mut Document) -> Result<Vec<u8>> {
    let mut bytes = Vec::new();
    document.save_to(&mut bytes).or_raise(|| ErrorKind::Encode)?;
    Ok(bytes)
}

/// Serialize a document packing objects into compressed object streams
/// (PDF 1.5+), which is noticeably smaller for object-heavy files.
pub(crate) fn save_packed(document: &mut Document) -> Result<Vec<u8>> {
    let mut bytes = Vec::new();
    document.save_modern(&mut bytes).or_raise(|| ErrorKind::Encode)?;
    Ok(bytes)
}

fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    haystack.windows(needle.len()).any(|window| window == needle)
}
