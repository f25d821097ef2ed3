//! Overlay merge
//!
//! Stamps an [`OverlayLayer`] onto one page of a base form and keeps only
//! that page.

use crate::error::FormError;
use crate::render::OverlayLayer;
use lopdf::{Dictionary, Document, Object, ObjectId, Stream};

/// Resources may be inherited through at most this many `Parent` links.
const MAX_TREE_DEPTH: usize = 32;

/// Merge `layer` on top of page `page_index` (0-based) of `base`.
///
/// The algorithm:
/// 1. Load the base and locate the page; too few pages is an error
/// 2. Resolve the page resources (inline, referenced or inherited) and
///    register the overlay fonts in a copy set directly on the page
/// 3. Wrap the existing content in `q`/`Q` so its graphics state cannot
///    leak, then append the overlay stream
/// 4. Drop form fields and annotations which would draw over the overlay
/// 5. Delete every other page, prune, compress and save
pub fn merge_overlay(
    base: &[u8],
    page_index: usize,
    layer: &OverlayLayer,
) -> Result<Vec<u8>, FormError> {
    let mut doc = Document::load_mem(base)
        .map_err(|e| FormError::Pdf(format!("Failed to load base document: {}", e)))?;

    let pages = doc.get_pages();
    let (page_number, page_id) = pages
        .iter()
        .nth(page_index)
        .map(|(number, id)| (*number, *id))
        .ok_or_else(|| {
            FormError::Pdf(format!(
                "Base document has {} pages, page {} requested",
                pages.len(),
                page_index + 1
            ))
        })?;

    let mut resources = resolve_resources(&doc, page_id)?;
    let mut fonts = match resources.get(b"Font") {
        Ok(Object::Reference(id)) => doc.get_dictionary(*id)?.clone(),
        Ok(Object::Dictionary(dict)) => dict.clone(),
        _ => Dictionary::new(),
    };
    for font in layer.fonts() {
        let font_id = doc.add_object(font.dictionary());
        fonts.set(font.resource_name(), Object::Reference(font_id));
    }
    resources.set("Font", Object::Dictionary(fonts));

    let existing = page_contents(doc.get_dictionary(page_id)?);
    let save_id = doc.add_object(Stream::new(Dictionary::new(), b"q\n".to_vec()));
    let restore_id = doc.add_object(Stream::new(Dictionary::new(), b"\nQ\n".to_vec()));
    let overlay_id = doc.add_object(Stream::new(Dictionary::new(), layer.content()?));

    let mut contents = Vec::with_capacity(existing.len() + 3);
    contents.push(Object::Reference(save_id));
    contents.extend(existing);
    contents.push(Object::Reference(restore_id));
    contents.push(Object::Reference(overlay_id));

    let page = doc.get_object_mut(page_id)?.as_dict_mut()?;
    page.set("Contents", Object::Array(contents));
    page.set("Resources", Object::Dictionary(resources));
    page.remove(b"Annots");

    remove_form_fields(&mut doc)?;

    let others: Vec<u32> = pages
        .keys()
        .copied()
        .filter(|number| *number != page_number)
        .collect();
    if !others.is_empty() {
        doc.delete_pages(&others);
    }

    doc.prune_objects();
    doc.compress();

    let mut buffer = Vec::new();
    doc.save_to(&mut buffer)
        .map_err(|e| FormError::Pdf(format!("Failed to save merged page: {}", e)))?;

    Ok(buffer)
}

/// Copy of the resources that apply to `page_id`, walking up the page
/// tree when the page inherits them.
fn resolve_resources(doc: &Document, page_id: ObjectId) -> Result<Dictionary, FormError> {
    let mut current = page_id;
    for _ in 0..MAX_TREE_DEPTH {
        let node = doc.get_dictionary(current)?;
        match node.get(b"Resources") {
            Ok(Object::Reference(id)) => return Ok(doc.get_dictionary(*id)?.clone()),
            Ok(Object::Dictionary(dict)) => return Ok(dict.clone()),
            _ => {}
        }
        match node.get(b"Parent").and_then(Object::as_reference) {
            Ok(parent) => current = parent,
            Err(_) => return Ok(Dictionary::new()),
        }
    }
    Err(FormError::Pdf("Page tree is too deep".into()))
}

/// Content stream references of a page, in drawing order.
fn page_contents(page: &Dictionary) -> Vec<Object> {
    match page.get(b"Contents") {
        Ok(Object::Reference(id)) => vec![Object::Reference(*id)],
        Ok(Object::Array(items)) => items
            .iter()
            .filter(|item| matches!(item, Object::Reference(_)))
            .cloned()
            .collect(),
        _ => Vec::new(),
    }
}

/// Remove the interactive form from the catalog.
fn remove_form_fields(doc: &mut Document) -> Result<(), FormError> {
    let catalog_id = doc
        .trailer
        .get(b"Root")
        .and_then(Object::as_reference)
        .map_err(|_| FormError::Pdf("No Root in trailer".into()))?;

    if let Some(Object::Dictionary(catalog)) = doc.objects.get_mut(&catalog_id) {
        catalog.remove(b"AcroForm");
        Ok(())
    } else {
        Err(FormError::Pdf("Invalid catalog".into()))
    }
}
