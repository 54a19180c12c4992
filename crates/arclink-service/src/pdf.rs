//! PDF text extraction and page-level append, built on `lopdf`.

use lopdf::{Document, Object, ObjectId};

use arclink_core::{ArchiveError, ArchiveResult};

fn load(data: &[u8]) -> ArchiveResult<Document> {
    Document::load_mem(data)
        .map_err(|err| ArchiveError::validation(format!("Malformed PDF: {err}")))
}

/// Extracts the text of every page, in page order.
pub fn pdf_text(data: &[u8]) -> ArchiveResult<String> {
    let document = load(data)?;
    let pages: Vec<u32> = document.get_pages().keys().copied().collect();
    document
        .extract_text(&pages)
        .map_err(|err| ArchiveError::validation(format!("PDF text extraction failed: {err}")))
}

/// Appends the addition's pages after the base document's pages.
///
/// The addition's objects are renumbered past the base document's id
/// space, its pages reparented under the base page tree, and the tree's
/// `Kids`/`Count` updated.
pub fn pdf_append(base: &[u8], addition: &[u8]) -> ArchiveResult<Vec<u8>> {
    let mut base_doc = load(base)?;
    let mut add_doc = load(addition)?;

    add_doc.renumber_objects_with(base_doc.max_id + 1);
    base_doc.max_id = add_doc.max_id;

    let added_pages: Vec<ObjectId> = add_doc.get_pages().values().copied().collect();
    if added_pages.is_empty() {
        return Err(ArchiveError::validation("PDF has no pages"));
    }
    base_doc.objects.extend(add_doc.objects);

    let pages_id = base_doc
        .catalog()
        .and_then(|catalog| catalog.get(b"Pages"))
        .and_then(Object::as_reference)
        .map_err(|err| ArchiveError::validation(format!("Malformed PDF: {err}")))?;

    for &page_id in &added_pages {
        let page = base_doc
            .get_object_mut(page_id)
            .and_then(Object::as_dict_mut)
            .map_err(|err| ArchiveError::validation(format!("Malformed PDF: {err}")))?;
        page.set("Parent", Object::Reference(pages_id));
    }

    let pages = base_doc
        .get_object_mut(pages_id)
        .and_then(Object::as_dict_mut)
        .map_err(|err| ArchiveError::validation(format!("Malformed PDF: {err}")))?;
    let count = pages
        .get(b"Count")
        .and_then(Object::as_i64)
        .unwrap_or_default();
    let kids = pages
        .get_mut(b"Kids")
        .and_then(Object::as_array_mut)
        .map_err(|err| ArchiveError::validation(format!("Malformed PDF: {err}")))?;
    kids.extend(added_pages.iter().map(|&id| Object::Reference(id)));
    pages.set("Count", count + added_pages.len() as i64);

    let mut out = Vec::new();
    base_doc
        .save_to(&mut out)
        .map_err(|err| ArchiveError::internal(format!("PDF serialization failed: {err}")))?;
    Ok(out)
}
