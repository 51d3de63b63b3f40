//! Document structuralizer: walks the catalog's page tree over a parsed
//! [`quill_pdf::ObjStore`] and reports the page list with inherited
//! attributes resolved.

use std::collections::HashSet;

use serde::Serialize;
use tracing::debug;

use quill_pdf::object::{ObjId, ObjKind, ObjStore};
use quill_pdf::{Document, Warning};

#[derive(Debug, Clone, Serialize)]
pub struct PageNode {
    /// 1-based page number in tree order.
    pub number: usize,
    /// Identifier of the indirect object carrying the page dictionary.
    pub ident: Option<(i64, i64)>,
    pub media_box: Option<[f64; 4]>,
    pub crop_box: Option<[f64; 4]>,
    pub rotate: Option<i64>,
    pub has_resources: bool,
    pub has_contents: bool,
}

#[derive(Debug, Default, Serialize)]
pub struct Structure {
    pub pages: Vec<PageNode>,
    /// Catalog `/Version` override, when present.
    pub version_override: Option<String>,
}

#[derive(Debug, Default)]
pub struct StructureOutcome {
    pub structure: Structure,
    pub warnings: Vec<Warning>,
}

/// Attributes that inherit down the page tree.
#[derive(Debug, Clone, Copy, Default)]
struct Inherited {
    media_box: Option<[f64; 4]>,
    crop_box: Option<[f64; 4]>,
    rotate: Option<i64>,
    has_resources: bool,
}

/// Descends `Catalog.Pages`. A node counts as a page iff its `Type` is
/// `/Page` or its merged dictionary carries `Contents`.
pub fn build_structure(doc: &Document) -> StructureOutcome {
    let store = &doc.store;
    let mut out = StructureOutcome::default();
    let Some(catalog) = store.catalog else {
        out.warnings.push(Warning::new(
            "pdf:structuralizer:no_catalog",
            "document has no resolvable catalog dictionary",
        ));
        return out;
    };
    out.structure.version_override = store
        .dict_get_deref(catalog, "Version")
        .and_then(|v| store.name_value(v).map(str::to_string));
    let Some(pages) = store.dict_get(catalog, "Pages") else {
        out.warnings.push(Warning::new(
            "pdf:structuralizer:no_pages",
            "catalog has no Pages entry",
        ));
        return out;
    };
    let mut seen = HashSet::new();
    walk(
        store,
        pages,
        Inherited::default(),
        &mut out.structure.pages,
        &mut seen,
        &mut out.warnings,
    );
    debug!(
        domain = "pdf.structure",
        kind = "page_tree_walked",
        pages = out.structure.pages.len(),
        "Walked page tree"
    );
    out
}

fn walk(
    store: &ObjStore,
    node: ObjId,
    inherited: Inherited,
    pages: &mut Vec<PageNode>,
    seen: &mut HashSet<ObjId>,
    warnings: &mut Vec<Warning>,
) {
    let target = store.deref(node);
    if !seen.insert(target) {
        warnings.push(
            Warning::new(
                "pdf:structuralizer:page_tree_cycle",
                "page tree node visited twice; pruning",
            )
            .with_span(store.get(target).span),
        );
        return;
    }
    if !matches!(store.kind(target), ObjKind::Dictionary(_)) {
        warnings.push(
            Warning::new(
                "pdf:structuralizer:not_a_dictionary",
                format!(
                    "page tree node is a `{}`, expected a dictionary",
                    store.kind(target).tag()
                ),
            )
            .with_span(store.get(target).span),
        );
        return;
    }
    let dict = target;
    let merged = Inherited {
        media_box: rect(store, dict, "MediaBox").or(inherited.media_box),
        crop_box: rect(store, dict, "CropBox").or(inherited.crop_box),
        rotate: store
            .dict_get_deref(dict, "Rotate")
            .and_then(|v| store.int_value(v))
            .or(inherited.rotate),
        has_resources: store.dict_get(dict, "Resources").is_some() || inherited.has_resources,
    };
    let type_name = store
        .dict_get_deref(dict, "Type")
        .and_then(|v| store.name_value(v).map(str::to_string));
    let has_contents = store.dict_get(dict, "Contents").is_some();
    let kids = store.dict_get_deref(dict, "Kids");
    let is_page = type_name.as_deref() == Some("Page") || has_contents;
    if !is_page {
        if let Some(kids) = kids {
            if let ObjKind::Array(items) = store.kind(kids) {
                for kid in items.clone() {
                    walk(store, kid, merged, pages, seen, warnings);
                }
                return;
            }
        }
        if type_name.as_deref() == Some("Pages") {
            warnings.push(
                Warning::new(
                    "pdf:structuralizer:pages_without_kids",
                    "intermediate Pages node has no Kids array",
                )
                .with_span(store.get(dict).span),
            );
        }
        return;
    }
    let ident = node_ident(store, node, dict);
    pages.push(PageNode {
        number: pages.len() + 1,
        ident,
        media_box: merged.media_box,
        crop_box: merged.crop_box,
        rotate: merged.rotate,
        has_resources: merged.has_resources,
        has_contents,
    });
}

fn node_ident(store: &ObjStore, node: ObjId, dict: ObjId) -> Option<(i64, i64)> {
    if let ObjKind::Ref { ident, .. } = store.kind(node) {
        return Some((ident.num, ident.gen));
    }
    store
        .find_ancestor(dict, |k| matches!(k, ObjKind::Indirect { .. }))
        .and_then(|id| match store.kind(id) {
            ObjKind::Indirect { ident, .. } => Some((ident.num, ident.gen)),
            _ => None,
        })
}

fn rect(store: &ObjStore, dict: ObjId, key: &str) -> Option<[f64; 4]> {
    let arr = store.dict_get_deref(dict, key)?;
    let ObjKind::Array(items) = store.kind(arr) else {
        return None;
    };
    let mut out = [0f64; 4];
    let mut idx = 0usize;
    for item in items {
        if idx >= 4 {
            break;
        }
        if let Some(v) = store.number_value(store.deref(*item)) {
            out[idx] = v;
            idx += 1;
        }
    }
    (idx == 4).then_some(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use quill_pdf::{load_document_from_bytes, ParseOptions};

    fn pad(mut bytes: Vec<u8>) -> Vec<u8> {
        while bytes.len() < 255 {
            bytes.push(b'\n');
        }
        bytes
    }

    fn parse(bytes: Vec<u8>) -> Document {
        load_document_from_bytes(&pad(bytes), &ParseOptions::default()).expect("parse")
    }

    fn two_page_fixture() -> Document {
        let mut pdf = Vec::new();
        pdf.extend_from_slice(b"%PDF-1.4\n");
        pdf.extend_from_slice(
            b"1 0 obj\n<< /Type /Catalog /Version /1.6 /Pages 2 0 R >>\nendobj\n",
        );
        pdf.extend_from_slice(
            b"2 0 obj\n<< /Type /Pages /MediaBox [0 0 612 792] /Kids [3 0 R 4 0 R] /Count 2 >>\nendobj\n",
        );
        pdf.extend_from_slice(
            b"3 0 obj\n<< /Type /Page /Rotate 90 /Resources << >> >>\nendobj\n",
        );
        pdf.extend_from_slice(
            b"4 0 obj\n<< /Type /Page /MediaBox [0 0 200 200] /Contents 5 0 R >>\nendobj\n",
        );
        pdf.extend_from_slice(b"5 0 obj\nnull\nendobj\n");
        pdf.extend_from_slice(b"trailer\n<< /Size 6 /Root 1 0 R >>\nstartxref\n9\n%%EOF\n");
        parse(pdf)
    }

    #[test]
    fn walks_pages_with_inheritance() {
        let doc = two_page_fixture();
        let out = build_structure(&doc);
        assert!(out.warnings.is_empty(), "{:?}", out.warnings);
        assert_eq!(out.structure.version_override.as_deref(), Some("1.6"));
        let pages = &out.structure.pages;
        assert_eq!(pages.len(), 2);
        // Page 1 inherits the parent MediaBox and keeps its own Rotate.
        assert_eq!(pages[0].ident, Some((3, 0)));
        assert_eq!(pages[0].media_box, Some([0.0, 0.0, 612.0, 792.0]));
        assert_eq!(pages[0].rotate, Some(90));
        assert!(pages[0].has_resources);
        assert!(!pages[0].has_contents);
        // Page 2 overrides the MediaBox locally.
        assert_eq!(pages[1].ident, Some((4, 0)));
        assert_eq!(pages[1].media_box, Some([0.0, 0.0, 200.0, 200.0]));
        assert_eq!(pages[1].rotate, None);
        assert!(pages[1].has_contents);
    }

    #[test]
    fn node_with_contents_counts_as_page_without_type() {
        let mut pdf = Vec::new();
        pdf.extend_from_slice(b"%PDF-1.4\n");
        pdf.extend_from_slice(b"1 0 obj\n<< /Type /Catalog /Pages 2 0 R >>\nendobj\n");
        pdf.extend_from_slice(b"2 0 obj\n<< /Kids [3 0 R] /Count 1 >>\nendobj\n");
        pdf.extend_from_slice(b"3 0 obj\n<< /Contents 4 0 R >>\nendobj\n");
        pdf.extend_from_slice(b"4 0 obj\nnull\nendobj\n");
        pdf.extend_from_slice(b"trailer\n<< /Size 5 /Root 1 0 R >>\nstartxref\n9\n%%EOF\n");
        let doc = parse(pdf);
        let out = build_structure(&doc);
        assert!(out.warnings.is_empty(), "{:?}", out.warnings);
        assert_eq!(out.structure.pages.len(), 1);
        assert!(out.structure.pages[0].has_contents);
    }

    #[test]
    fn page_tree_cycle_is_pruned_with_warning() {
        let mut pdf = Vec::new();
        pdf.extend_from_slice(b"%PDF-1.4\n");
        pdf.extend_from_slice(b"1 0 obj\n<< /Type /Catalog /Pages 2 0 R >>\nendobj\n");
        // The tree points back at itself through Kids.
        pdf.extend_from_slice(b"2 0 obj\n<< /Type /Pages /Kids [2 0 R] /Count 1 >>\nendobj\n");
        pdf.extend_from_slice(b"trailer\n<< /Size 3 /Root 1 0 R >>\nstartxref\n9\n%%EOF\n");
        let doc = parse(pdf);
        let out = build_structure(&doc);
        assert!(out
            .warnings
            .iter()
            .any(|w| w.code == "pdf:structuralizer:page_tree_cycle"));
        assert!(out.structure.pages.is_empty());
    }

    #[test]
    fn missing_catalog_is_reported() {
        let doc = parse(b"%PDF-1.4\n1 0 obj\nnull\nendobj\n".to_vec());
        let out = build_structure(&doc);
        assert_eq!(out.warnings[0].code, "pdf:structuralizer:no_catalog");
        assert!(out.structure.pages.is_empty());
    }
}
