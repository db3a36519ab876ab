use super::{PDF_VERSION, count_pages, load, save};
use crate::error::{ErrorKind, Result};
use crate::{Artifact, Source};
use lopdf::{Dictionary, Document, Object, ObjectId, dictionary};

/// Page attributes that a page may inherit from its ancestors in the page
/// tree. They must be copied onto the page itself before it is moved under a
/// new parent, or the page would silently lose its size or resources.
const INHERITABLE: [&[u8]; 4] = [b"MediaBox", b"CropBox", b"Resources", b"Rotate"];
/// US Letter, which is what readers assume when no MediaBox exists anywhere.
const DEFAULT_MEDIA_BOX: [i64; 4] = [0, 0, 612, 792];
/// Guard against cyclic `/Parent` chains in malformed files.
const MAX_TREE_DEPTH: usize = 64;
/// Structural objects that are rebuilt for the merged document (or that
/// point at page objects which no longer exist in their old tree).
const DROPPED_TYPES: [&[u8]; 4] = [b"Catalog", b"Pages", b"Outlines", b"Outline"];

/// Concatenate every page of every source, in order, into one document.
///
/// The first source that cannot be read aborts the whole merge: there is no
/// meaningful partial output of a merge.
#[tracing::instrument(level = "debug", skip_all, fields(sources = sources.len()))]
pub fn merge(sources: &[Source]) -> Result<Artifact> {
    if sources.is_empty() {
        exn::bail!(ErrorKind::EmptyBatch);
    }

    let mut merged = Document::with_version(PDF_VERSION);
    let pages_id = merged.new_object_id();
    let mut kids: Vec<ObjectId> = Vec::new();

    for source in sources {
        let mut document = load(source)?;
        if count_pages(&document) == 0 {
            exn::bail!(ErrorKind::Corrupt(source.name.clone()));
        }
        materialise_inherited(&mut document);
        document.renumber_objects_with(merged.max_id + 1);

        // Collected after renumbering, and from the tree walk rather than by
        // object id, so the source's reading order is kept.
        let pages: Vec<ObjectId> = document.page_iter().collect();
        let highest = document.objects.keys().map(|(id, _)| *id).max().unwrap_or(merged.max_id);

        for (id, object) in document.objects {
            if let Object::Dictionary(dict) = &object
                && dict.get_type().is_ok_and(|t| DROPPED_TYPES.iter().any(|dropped| *dropped == t))
            {
                continue;
            }
            merged.objects.insert(id, object);
        }
        for page_id in &pages {
            if let Ok(page) = merged.get_dictionary_mut(*page_id) {
                page.set("Parent", pages_id);
                // The structure tree lived in the dropped catalog.
                page.remove(b"StructParents");
            }
        }
        kids.extend(pages);
        merged.max_id = merged.max_id.max(highest);
        tracing::debug!(name = %source.name, total = kids.len(), "Appended source pages");
    }

    let count = u32::try_from(kids.len()).unwrap_or(u32::MAX);
    merged.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids.into_iter().map(Object::Reference).collect::<Vec<_>>(),
            "Count" => i64::from(count),
        }),
    );
    let catalog_id = merged.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    merged.trailer.set("Root", catalog_id);
    merged.prune_objects();

    Ok(Artifact {
        bytes: save(&mut merged)?,
        page_count: count,
    })
}

/// Copy inheritable attributes from ancestors onto every page.
fn materialise_inherited(document: &mut Document) {
    let pages: Vec<ObjectId> = document.page_iter().collect();
    for page_id in pages {
        let Ok(page) = document.get_dictionary(page_id) else {
            continue;
        };
        let missing: Vec<(&[u8], Object)> = INHERITABLE
            .iter()
            .filter(|key| !page.has(key))
            .filter_map(|key| inherited(document, page, key).map(|value| (*key, value)))
            .collect();
        let has_media_box = page.has(b"MediaBox") || missing.iter().any(|(key, _)| *key == b"MediaBox");

        if let Ok(page) = document.get_dictionary_mut(page_id) {
            for (key, value) in missing {
                page.set(key, value);
            }
            if !has_media_box {
                page.set("MediaBox", DEFAULT_MEDIA_BOX.iter().map(|v| Object::Integer(*v)).collect::<Vec<_>>());
            }
        }
    }
}

fn inherited(document: &Document, page: &Dictionary, key: &[u8]) -> Option<Object> {
    let mut parent = page.get(b"Parent").and_then(Object::as_reference).ok();
    for _ in 0..MAX_TREE_DEPTH {
        let node = document.get_dictionary(parent?).ok()?;
        if let Ok(value) = node.get(key) {
            return Some(value.clone());
        }
        parent = node.get(b"Parent").and_then(Object::as_reference).ok();
    }
    None
}
