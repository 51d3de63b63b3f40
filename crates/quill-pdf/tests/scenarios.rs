//! End-to-end parse scenarios over literal PDF byte fixtures.

use quill_pdf::object::{ObjKind, TextEncoding};
use quill_pdf::xref::XrefStreamEntry;
use quill_pdf::{load_document_from_bytes, Document, ParseOptions};

/// Fixtures must clear the 255-byte minimum; pad with trailing newlines.
fn pad(mut bytes: Vec<u8>) -> Vec<u8> {
    while bytes.len() < 255 {
        bytes.push(b'\n');
    }
    bytes
}

fn parse(bytes: &[u8]) -> Document {
    load_document_from_bytes(bytes, &ParseOptions::default()).expect("parse")
}

#[test]
fn minimal_catalog_document() {
    let pdf = pad(
        b"%PDF-1.4\n%\xE2\xE3\xCF\xD3\n1 0 obj\n<< /Type /Catalog >>\nendobj\nxref\n0 2\n0000000000 65535 f \n0000000015 00000 n \ntrailer\n<< /Size 2 /Root 1 0 R >>\nstartxref\n60\n%%EOF\n"
            .to_vec(),
    );
    let doc = parse(&pdf);
    assert_eq!(doc.store.pdf_version.as_deref(), Some("1.4"));
    assert!(doc.parser_warnings.is_empty(), "{:?}", doc.parser_warnings);
    let catalog = doc.store.catalog.expect("catalog resolved from trailer Root");
    assert!(matches!(doc.store.kind(catalog), ObjKind::Dictionary(_)));
    let ty = doc.store.dict_get(catalog, "Type").unwrap();
    assert_eq!(doc.store.name_value(ty), Some("Catalog"));
    // Single sealed revision.
    assert_eq!(doc.store.tables().len(), 1);
    let ObjKind::Table(table) = doc.store.kind(doc.store.tables()[0]) else {
        panic!("expected table")
    };
    assert_eq!(table.startxref, Some(60));
    let xref = table.xref_table.as_ref().expect("classical xref attached");
    assert_eq!(xref.entries.len(), 2);
    assert!(xref.entries[0].free);
    assert!(!xref.entries[1].free);
}

#[test]
fn chained_ref_resolution() {
    let pdf = pad(
        b"%PDF-1.4\n1 0 obj\n2 0 R\nendobj\n2 0 obj\n<< /Title (Hi) >>\nendobj\n".to_vec(),
    );
    let doc = parse(&pdf);
    assert!(doc.parser_warnings.is_empty(), "{:?}", doc.parser_warnings);
    let store = &doc.store;
    let r = store.refs[0];
    let ObjKind::Ref {
        indirect: Some(ind),
        ..
    } = store.kind(r)
    else {
        panic!("ref did not resolve")
    };
    let ObjKind::Indirect {
        ident,
        direct: Some(dict),
    } = store.kind(*ind)
    else {
        panic!("expected populated indirect")
    };
    assert_eq!((ident.num, ident.gen), (2, 0));
    let title = store.dict_get(*dict, "Title").unwrap();
    let ObjKind::Text {
        value, encoding, ..
    } = store.kind(title)
    else {
        panic!("expected text title")
    };
    assert_eq!(value, "Hi");
    assert_eq!(*encoding, TextEncoding::Pdf);
    // A resolved ref dereferences to the same payload as its indirect.
    assert_eq!(store.deref(r), store.deref(*ind));
}

#[test]
fn object_stream_expansion_end_to_end() {
    let payload: &[u8] = b"3 0 4 10\n<< /A 1 >><< /B 2 >>";
    let mut pdf = Vec::new();
    pdf.extend_from_slice(b"%PDF-1.5\n");
    pdf.extend_from_slice(b"1 0 obj\n[ 3 0 R ]\nendobj\n");
    pdf.extend_from_slice(
        format!(
            "5 0 obj\n<< /Type /ObjStm /N 2 /First 9 /Length {} >>\nstream\n",
            payload.len()
        )
        .as_bytes(),
    );
    pdf.extend_from_slice(payload);
    pdf.extend_from_slice(b"\nendstream\nendobj\n");
    let pdf = pad(pdf);
    let doc = parse(&pdf);
    assert!(doc.parser_warnings.is_empty(), "{:?}", doc.parser_warnings);
    let store = &doc.store;
    // The `3 0 R` ref resolves through the second pass to the packed dict.
    let r = store.refs[0];
    let target = store.deref(r);
    let ObjKind::Dictionary(d) = store.kind(target) else {
        panic!("expected dictionary behind 3 0 R")
    };
    assert_eq!(store.int_value(d.get("A").unwrap()), Some(1));
    // The stream's direct child is the wrapping array of new indirects.
    let stream = store.streams[0];
    let ObjKind::Stream(s) = store.kind(stream) else {
        panic!("stream")
    };
    assert_eq!(s.stream_type.as_deref(), Some("ObjStm"));
    let ObjKind::Array(items) = store.kind(s.direct.unwrap()) else {
        panic!("expected wrapper array")
    };
    assert_eq!(items.len(), 2);
}

#[test]
fn xref_stream_end_to_end() {
    let body: &[u8] = &[
        0x00, 0x00, 0x00, 0x00, 0x01, 0x00, 0x0F, 0x00, 0x02, 0x00, 0x02, 0x01,
    ];
    let mut pdf = Vec::new();
    pdf.extend_from_slice(b"%PDF-1.5\n");
    pdf.extend_from_slice(
        format!(
            "2 0 obj\n<< /Type /XRef /W [1 2 1] /Size 3 /Index [0 3] /Root 1 0 R /Length {} >>\nstream\n",
            body.len()
        )
        .as_bytes(),
    );
    pdf.extend_from_slice(body);
    pdf.extend_from_slice(b"\nendstream\nendobj\n");
    pdf.extend_from_slice(b"1 0 obj\n<< /Type /Catalog >>\nendobj\n");
    let pdf = pad(pdf);
    let doc = parse(&pdf);
    assert!(doc.parser_warnings.is_empty(), "{:?}", doc.parser_warnings);
    let store = &doc.store;
    let stream = store.streams[0];
    let ObjKind::Stream(s) = store.kind(stream) else {
        panic!("stream")
    };
    assert_eq!(s.stream_type.as_deref(), Some("XRef"));
    let ObjKind::Xref(x) = store.kind(s.direct.unwrap()) else {
        panic!("expected xref payload")
    };
    assert_eq!(x.widths, vec![1, 2, 1]);
    assert_eq!(
        x.entries,
        vec![
            XrefStreamEntry::Free {
                next_free: 0,
                reuse_gen: 0
            },
            XrefStreamEntry::InUse { offset: 15, gen: 0 },
            XrefStreamEntry::Compressed {
                stream_num: 2,
                index_in_stream: 1
            },
        ]
    );
    // Attached to the enclosing revision table.
    let ObjKind::Table(t) = store.kind(store.tables()[0]) else {
        panic!("table")
    };
    assert_eq!(t.xref_obj, s.direct);
    // Catalog came from the xref stream's dictionary Root.
    let catalog = store.catalog.expect("catalog");
    assert_eq!(
        store.name_value(store.dict_get(catalog, "Type").unwrap()),
        Some("Catalog")
    );
}

#[test]
fn malformed_dictionary_key_keeps_parsing() {
    let pdf = pad(b"%PDF-1.4\n1 0 obj\n<< 1 (X) >>\nendobj\n2 0 obj\nnull\nendobj\n".to_vec());
    let doc = parse(&pdf);
    assert!(doc
        .parser_warnings
        .iter()
        .any(|w| w.code == "pdf:lexer:invalid_token:integer:invalid_key"));
    // The object after the malformed dictionary still parsed.
    assert!(doc
        .store
        .lookup_indirect(&quill_pdf::token::ObjIdent::new(2, 0))
        .is_some());
}

#[test]
fn stream_length_off_by_two_adjusts_silently() {
    let pdf = pad(
        b"%PDF-1.4\n1 0 obj\n<< /Type /Content /Length 10 >>\nstream\nABCDEFGH\nendstream\nendobj\n"
            .to_vec(),
    );
    let doc = parse(&pdf);
    assert!(doc.parser_warnings.is_empty(), "{:?}", doc.parser_warnings);
    let store = &doc.store;
    let ObjKind::Stream(s) = store.kind(store.streams[0]) else {
        panic!("stream")
    };
    let loc = s.source_location.unwrap();
    assert_eq!(loc.len(), 10);
    assert!(matches!(
        store.kind(s.direct.unwrap()),
        ObjKind::Content(_)
    ));
}

#[test]
fn stream_length_off_by_more_warns_but_decodes() {
    let pdf = pad(
        b"%PDF-1.4\n1 0 obj\n<< /Type /Content /Length 13 >>\nstream\nABCDEFGH\nendstream\nendobj\n"
            .to_vec(),
    );
    let doc = parse(&pdf);
    assert!(doc
        .parser_warnings
        .iter()
        .any(|w| w.code == "pdf:parser:invalid_stream:length_mismatch"));
    let store = &doc.store;
    let ObjKind::Stream(s) = store.kind(store.streams[0]) else {
        panic!("stream")
    };
    assert_eq!(s.source_location.unwrap().len(), 13);
    assert!(s.direct.is_some());
}

#[test]
fn incremental_update_yields_two_tables() {
    let mut pdf = Vec::new();
    pdf.extend_from_slice(b"%PDF-1.4\n1 0 obj\n<< /Type /Catalog >>\nendobj\n");
    pdf.extend_from_slice(
        b"trailer\n<< /Size 2 /Root 1 0 R >>\nstartxref\n9\n%%EOF\n",
    );
    pdf.extend_from_slice(b"2 0 obj\n(second revision)\nendobj\n");
    pdf.extend_from_slice(
        b"trailer\n<< /Size 3 /Root 1 0 R >>\nstartxref\n9\n%%EOF\n",
    );
    let pdf = pad(pdf);
    let doc = parse(&pdf);
    assert!(doc.parser_warnings.is_empty(), "{:?}", doc.parser_warnings);
    let tables = doc.store.tables();
    assert_eq!(tables.len(), 2);
    for id in tables {
        let ObjKind::Table(t) = doc.store.kind(id) else {
            panic!("table")
        };
        assert!(t.trailer.is_some());
        assert_eq!(t.startxref, Some(9));
    }
    assert!(doc.store.catalog.is_some());
}

#[test]
fn unsupported_version_warns_but_parses() {
    let pdf = pad(b"%PDF-1.9\n1 0 obj\nnull\nendobj\n".to_vec());
    let doc = parse(&pdf);
    assert_eq!(doc.store.pdf_version.as_deref(), Some("1.9"));
    assert!(doc
        .parser_warnings
        .iter()
        .any(|w| w.code == "pdf:parser:unsupported_version"));
}

#[test]
fn missing_ref_is_reported_after_both_passes() {
    let pdf = pad(b"%PDF-1.4\n1 0 obj\n[ 9 0 R ]\nendobj\n".to_vec());
    let doc = parse(&pdf);
    assert!(doc
        .parser_warnings
        .iter()
        .any(|w| w.code == "pdf:parser:invalid:ref:9/0"));
}

#[test]
fn file_below_minimum_size_is_fatal() {
    let err = load_document_from_bytes(b"%PDF-1.4\n", &ParseOptions::default()).unwrap_err();
    assert!(err
        .to_string()
        .starts_with("pdf:parser:not_pdf:filesize"));
}

#[test]
fn file_at_exactly_minimum_size_parses() {
    let mut pdf = b"%PDF-1.4\n".to_vec();
    while pdf.len() < 255 {
        pdf.push(b'\n');
    }
    assert_eq!(pdf.len(), 255);
    let doc = parse(&pdf);
    assert_eq!(doc.store.pdf_version.as_deref(), Some("1.4"));
}

#[test]
fn header_without_line_break_is_fatal() {
    let mut pdf = b"%PDF-1.4 no line break".to_vec();
    while pdf.len() < 255 {
        pdf.push(b' ');
    }
    let err = load_document_from_bytes(&pdf, &ParseOptions::default()).unwrap_err();
    assert!(err
        .to_string()
        .starts_with("pdf:parser:not_pdf:invalid_header"));
}

#[test]
fn header_with_crlf_parses() {
    let pdf = pad(b"%PDF-1.6\r\n1 0 obj\nnull\nendobj\n".to_vec());
    let doc = parse(&pdf);
    assert_eq!(doc.store.pdf_version.as_deref(), Some("1.6"));
}

#[test]
fn abort_on_warning_stops_between_phases() {
    // Body-phase warning plus an unresolvable ref; with abort set, the
    // missing-ref phase is never reached.
    let pdf = pad(b"%PDF-1.4\n1 0 obj\n<< 1 (X) /K 9 0 R >>\nendobj\n".to_vec());
    let options = ParseOptions {
        abort_on_warning: true,
        ..Default::default()
    };
    let doc = load_document_from_bytes(&pdf, &options).expect("parse");
    assert!(!doc.parser_warnings.is_empty());
    assert!(doc
        .parser_warnings
        .iter()
        .all(|w| !w.code.starts_with("pdf:parser:invalid:ref")));
}

#[test]
fn flate_compressed_content_stream_is_subparsed() {
    use flate2::write::ZlibEncoder;
    use flate2::Compression;
    use std::io::Write;

    let content = b"BT /F1 12 Tf (Hello) Tj ET";
    let mut enc = ZlibEncoder::new(Vec::new(), Compression::default());
    enc.write_all(content).unwrap();
    let data = enc.finish().unwrap();
    let mut pdf = Vec::new();
    pdf.extend_from_slice(b"%PDF-1.4\n");
    pdf.extend_from_slice(
        format!(
            "4 0 obj\n<< /Type /Content /Filter /FlateDecode /Length {} >>\nstream\n",
            data.len()
        )
        .as_bytes(),
    );
    pdf.extend_from_slice(&data);
    pdf.extend_from_slice(b"\nendstream\nendobj\n");
    let pdf = pad(pdf);
    let doc = parse(&pdf);
    assert!(doc.parser_warnings.is_empty(), "{:?}", doc.parser_warnings);
    let store = &doc.store;
    let ObjKind::Stream(s) = store.kind(store.streams[0]) else {
        panic!("stream")
    };
    let ObjKind::Content(items) = store.kind(s.direct.unwrap()) else {
        panic!("expected content tree")
    };
    // Operators and operands from the decoded body.
    let ops: Vec<&str> = items
        .iter()
        .filter_map(|id| match store.kind(*id) {
            ObjKind::Op(op) => Some(op.as_str()),
            _ => None,
        })
        .collect();
    assert_eq!(ops, vec!["BT", "Tf", "Tj", "ET"]);
}

#[test]
fn unknown_filter_warns_and_subparses_empty_payload() {
    let pdf = pad(
        b"%PDF-1.4\n1 0 obj\n<< /Type /Content /Filter /Crypt /Length 4 >>\nstream\nBODY\nendstream\nendobj\n"
            .to_vec(),
    );
    let doc = parse(&pdf);
    let w = doc
        .parser_warnings
        .iter()
        .find(|w| w.code == "pdf:parser:error:stream:decode")
        .expect("decode warning");
    assert!(w
        .cause
        .as_deref()
        .unwrap()
        .contains("pdf:decoder:not_implemented:stream_filter:Crypt"));
    // Decode failed: the sub-parse ran over empty bytes.
    let store = &doc.store;
    let ObjKind::Stream(s) = store.kind(store.streams[0]) else {
        panic!("stream")
    };
    let ObjKind::Content(items) = store.kind(s.direct.unwrap()) else {
        panic!("content")
    };
    assert!(items.is_empty());
}
