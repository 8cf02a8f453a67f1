//! Assembly: concatenate normalized documents into one output PDF.
//!
//! Page content is copied at the object level, never re-rendered: every
//! source document's objects are renumbered into a disjoint id range, its
//! page dictionaries are re-parented under a fresh page tree, and a new
//! catalog is written. Output page order is exactly the order of the input
//! document list, with each document's internal page order preserved.
//!
//! ## Why flatten inherited attributes?
//!
//! A PDF page may omit `MediaBox`, `Resources`, `CropBox`, or `Rotate` and
//! inherit them from an ancestor `Pages` node. The source page trees are
//! discarded during the merge, so each page's effective attributes are
//! resolved onto the page dictionary itself before its tree is dropped.
//!
//! This stage is CPU-bound; the merge engine runs it under
//! `tokio::task::spawn_blocking`.

use crate::error::MergeError;
use lopdf::{dictionary, Dictionary, Document, Object, ObjectId};
use std::collections::BTreeMap;
use tracing::debug;

/// Page attributes a page dictionary may inherit from ancestor tree nodes.
const INHERITABLE_PAGE_KEYS: [&[u8]; 4] = [b"Resources", b"MediaBox", b"CropBox", b"Rotate"];

/// The assembled output document.
pub struct AssembledPdf {
    /// Serialized PDF bytes.
    pub bytes: Vec<u8>,
    /// Total page count — the sum of every input document's page count.
    pub page_count: usize,
}

/// Concatenate `documents` into one PDF, strictly in list order.
pub fn concatenate(documents: Vec<Document>) -> Result<AssembledPdf, MergeError> {
    if documents.is_empty() {
        return Err(MergeError::Internal(
            "assembly invoked with no documents".to_string(),
        ));
    }

    let mut carried_objects: BTreeMap<ObjectId, Object> = BTreeMap::new();
    let mut pages_in_order: Vec<(ObjectId, Dictionary)> = Vec::new();
    let mut max_id = 1u32;

    for mut doc in documents {
        // Shift this document's object ids past everything merged so far.
        doc.renumber_objects_with(max_id);
        max_id = doc.max_id + 1;

        // get_pages() is keyed by page number, so iteration preserves the
        // document's internal page order.
        let page_ids: Vec<ObjectId> = doc.get_pages().into_values().collect();
        for page_id in &page_ids {
            pages_in_order.push((*page_id, flattened_page(&doc, *page_id)?));
        }

        // Carry every object except the page-tree scaffolding we rebuild
        // (and outlines, which would dangle once catalogs are dropped).
        for (object_id, object) in doc.objects {
            match object_type(&object) {
                b"Catalog" | b"Pages" | b"Page" | b"Outlines" | b"Outline" => {}
                _ => {
                    carried_objects.insert(object_id, object);
                }
            }
        }
    }

    let page_count = pages_in_order.len();

    let mut output = Document::with_version("1.5");
    output.max_id = max_id;
    output.objects.extend(carried_objects);

    let pages_id = output.new_object_id();
    let mut kids: Vec<Object> = Vec::with_capacity(page_count);
    for (page_id, mut page) in pages_in_order {
        page.set("Parent", Object::Reference(pages_id));
        output.objects.insert(page_id, Object::Dictionary(page));
        kids.push(Object::Reference(page_id));
    }

    output.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => page_count as i64,
        }),
    );

    let catalog_id = output.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => Object::Reference(pages_id),
    });
    output.trailer.set("Root", catalog_id);

    output.renumber_objects();
    output.compress();

    let mut bytes = Vec::new();
    output
        .save_to(&mut bytes)
        .map_err(|e| MergeError::Internal(format!("failed to serialize merged PDF: {e}")))?;

    debug!(pages = page_count, bytes = bytes.len(), "output document assembled");
    Ok(AssembledPdf { bytes, page_count })
}

/// The `/Type` name of a dictionary object, or empty for anything else.
fn object_type(object: &Object) -> &[u8] {
    match object {
        Object::Dictionary(dict) => dict
            .get(b"Type")
            .and_then(Object::as_name)
            .unwrap_or(b""),
        _ => b"",
    }
}

/// Clone a page dictionary with inherited attributes resolved onto it.
fn flattened_page(doc: &Document, page_id: ObjectId) -> Result<Dictionary, MergeError> {
    let mut page = doc
        .get_dictionary(page_id)
        .map_err(|e| MergeError::Internal(format!("page object {page_id:?} unreadable: {e}")))?
        .clone();

    for key in INHERITABLE_PAGE_KEYS {
        if page.has(key) {
            continue;
        }
        if let Some(value) = inherited_attribute(doc, &page, key) {
            page.set(key, value);
        }
    }
    Ok(page)
}

/// Walk the `Parent` chain looking for an inherited attribute value.
fn inherited_attribute(doc: &Document, page: &Dictionary, key: &[u8]) -> Option<Object> {
    let mut parent_ref = page.get(b"Parent").and_then(Object::as_reference).ok();
    // Depth guard against malformed self-referential trees.
    let mut remaining = 32;
    while let Some(parent_id) = parent_ref {
        if remaining == 0 {
            return None;
        }
        remaining -= 1;
        let parent = doc.get_dictionary(parent_id).ok()?;
        if let Ok(value) = parent.get(key) {
            return Some(value.clone());
        }
        parent_ref = parent.get(b"Parent").and_then(Object::as_reference).ok();
    }
    None
}
