use anyhow::Result;
use thiserror::Error;
use tracing::{debug, trace};

use crate::chars::{HEADER_REGEX, SUPPORTED_VERSIONS};
use crate::decode::{decode_chain, FilterSpec, PredictorParms};
use crate::lexer::{LexOutcome, Lexer};
use crate::object::{ObjId, ObjKind, ObjStore};
use crate::objstm::expand_object_stream;
use crate::reader::{MemoryReader, OffsetReader, SequentialReader};
use crate::span::Span;
use crate::token::Token;
use crate::tokenizer::Tokenizer;
use crate::warn::Warning;
use crate::xref::{decode_xref_stream, XrefSubsection};

/// Fatal failures: no partial store is returned for these. Everything else
/// surfaces as a warning and the parse keeps advancing.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("pdf:parser:not_pdf:filesize: input is {0} bytes, below the 255-byte minimum")]
    NotPdfFilesize(u64),
    #[error("pdf:parser:not_pdf:invalid_header: missing `%PDF-M.N` header line")]
    NotPdfHeader,
    #[error("pdf:parser:error:io: {0}")]
    Io(#[from] anyhow::Error),
}

#[derive(Debug, Clone)]
pub struct ParseOptions {
    /// Return as soon as any phase (or per-stream sub-parse) has produced a
    /// warning. Policy only; it never changes what a phase does.
    pub abort_on_warning: bool,
    /// Output budget per decoded stream.
    pub max_stream_bytes: usize,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            abort_on_warning: false,
            max_stream_bytes: 8 * 1024 * 1024,
        }
    }
}

/// Observation hooks over the body-parse pipeline. Both fire in strict
/// source order.
#[derive(Default)]
pub struct ParseHooks<'a> {
    pub on_token: Option<&'a mut dyn FnMut(&Token)>,
    pub on_lexer: Option<&'a mut dyn FnMut(&LexOutcome)>,
}

#[derive(Debug)]
pub struct ParseOutcome {
    pub store: ObjStore,
    pub warnings: Vec<Warning>,
}

/// Drives the full pipeline: header check, body parse, reference
/// resolution, stream classification, stream decode and sub-parse, a second
/// resolution pass for object-stream expansions, catalog detection, and
/// missing-reference reporting — in that order, deterministically.
pub fn run<R: SequentialReader, O: OffsetReader + ?Sized>(
    reader: R,
    offsets: &O,
    options: &ParseOptions,
    hooks: &mut ParseHooks<'_>,
) -> Result<ParseOutcome, EngineError> {
    let mut reader = reader;
    let mut store = ObjStore::new();
    let mut warnings = Vec::new();

    // Phase 1: header.
    let len = reader.len();
    if len < 255 {
        return Err(EngineError::NotPdfFilesize(len));
    }
    let head = reader.read_string(20, false).map_err(EngineError::Io)?;
    let caps = HEADER_REGEX
        .captures(&head)
        .ok_or(EngineError::NotPdfHeader)?;
    let version = caps[1].to_string();
    if !SUPPORTED_VERSIONS.contains(&version.as_str()) {
        warnings.push(
            Warning::new(
                "pdf:parser:unsupported_version",
                format!("PDF version {version} is not supported"),
            )
            .with_span(Span::new(0, 20)),
        );
    }
    store.pdf_version = Some(version);
    if options.abort_on_warning && !warnings.is_empty() {
        return Ok(ParseOutcome { store, warnings });
    }

    // Phase 2: body parse.
    let mut lexer = Lexer::for_document(&mut store);
    let mut tokenizer = Tokenizer::new(&mut reader);
    loop {
        let Some(token) = tokenizer.next_token().map_err(EngineError::Io)? else {
            break;
        };
        if let Some(cb) = hooks.on_token.as_mut() {
            cb(&token);
        }
        if let Some(w) = &token.warning {
            warnings.push(w.clone());
        }
        let out = lexer.push_token(&mut store, &token);
        warnings.extend(out.warnings.iter().cloned());
        if let Some(cb) = hooks.on_lexer.as_mut() {
            cb(&out);
        }
    }
    trim_trailing_table(&mut store);
    debug!(
        domain = "pdf.parser",
        kind = "body_parsed",
        objects = store.len(),
        warnings = warnings.len(),
        "Parsed document body"
    );
    if options.abort_on_warning && !warnings.is_empty() {
        return Ok(ParseOutcome { store, warnings });
    }

    // Phase 3: first reference resolution pass.
    let resolved = resolve_refs(&mut store);
    trace!(
        domain = "pdf.parser",
        kind = "refs_resolved",
        pass = 1,
        resolved = resolved,
        "Resolved references"
    );

    // Phase 4: stream classification.
    resolve_stream_types(&mut store);

    // Phase 5: stream decode and sub-parse.
    for stream_id in store.streams.clone() {
        let before = warnings.len();
        decode_one_stream(&mut store, stream_id, offsets, options, &mut warnings);
        if options.abort_on_warning && warnings.len() > before {
            return Ok(ParseOutcome { store, warnings });
        }
    }

    // Phase 6: second pass picks up object-stream expansions.
    let resolved = resolve_refs(&mut store);
    trace!(
        domain = "pdf.parser",
        kind = "refs_resolved",
        pass = 2,
        resolved = resolved,
        "Resolved references"
    );

    // Phase 7: catalog.
    resolve_catalog(&mut store);

    // Phase 8: report references that never found a target.
    for id in store.refs.clone() {
        if let ObjKind::Ref {
            ident,
            indirect: None,
        } = store.kind(id)
        {
            warnings.push(
                Warning::new(
                    format!("pdf:parser:invalid:ref:{}", ident.key()),
                    format!("reference {} has no indirect object", ident.key()),
                )
                .with_span(store.get(id).span),
            );
        }
    }
    Ok(ParseOutcome { store, warnings })
}

/// Drives a tokenizer/lexer pair over decoded bytes, with `container` as
/// the stack bottom.
pub(crate) fn sub_parse_into(
    store: &mut ObjStore,
    container: ObjId,
    bytes: &[u8],
) -> Vec<Warning> {
    let mut warnings = Vec::new();
    let mut lexer = Lexer::for_container(container);
    let mut tokenizer = Tokenizer::new(MemoryReader::new(bytes));
    loop {
        match tokenizer.next_token() {
            Ok(Some(token)) => {
                if let Some(w) = &token.warning {
                    warnings.push(w.clone());
                }
                let out = lexer.push_token(store, &token);
                warnings.extend(out.warnings);
            }
            Ok(None) => break,
            Err(err) => {
                warnings.push(
                    Warning::new("pdf:parser:error:stream:subparse", "sub-parse read failed")
                        .with_cause(err.to_string()),
                );
                break;
            }
        }
    }
    warnings
}

/// Fills `Ref.indirect` from the identifier index. Idempotent: already
/// resolved references are left alone.
pub fn resolve_refs(store: &mut ObjStore) -> usize {
    let mut resolved = 0usize;
    for id in store.refs.clone() {
        let ident = match store.kind(id) {
            ObjKind::Ref {
                ident,
                indirect: None,
            } => *ident,
            _ => continue,
        };
        if let Some(target) = store.lookup_indirect(&ident) {
            if let ObjKind::Ref { indirect, .. } = &mut store.get_mut(id).kind {
                *indirect = Some(target);
            }
            resolved += 1;
        }
    }
    resolved
}

/// Derives each stream's classification key from its dictionary:
/// `Type`, `Type/Subtype`, with `XObject` filled in when only a Form or
/// Image subtype is present. Deterministic and idempotent.
pub fn resolve_stream_types(store: &mut ObjStore) {
    for id in store.streams.clone() {
        let dict = match store.kind(id) {
            ObjKind::Stream(s) => s.dictionary,
            _ => None,
        };
        let Some(dict) = dict else { continue };
        let ty = store
            .dict_get_deref(dict, "Type")
            .and_then(|v| store.name_value(v).map(str::to_string));
        let subtype = store
            .dict_get_deref(dict, "Subtype")
            .or_else(|| store.dict_get_deref(dict, "S"))
            .and_then(|v| store.name_value(v).map(str::to_string));
        let ty = match (&ty, subtype.as_deref()) {
            (None, Some("Form")) | (None, Some("Image")) => Some("XObject".to_string()),
            _ => ty,
        };
        let combined = match (ty, subtype) {
            (Some(t), Some(s)) => Some(format!("{t}/{s}")),
            (Some(t), None) => Some(t),
            (None, _) => None,
        };
        if let ObjKind::Stream(s) = &mut store.get_mut(id).kind {
            s.stream_type = combined;
        }
    }
}

fn trim_trailing_table(store: &mut ObjStore) {
    let root = store.root;
    let last = match store.kind(root) {
        ObjKind::Root(children) => children.last().copied(),
        _ => None,
    };
    let Some(last) = last else { return };
    let unused = matches!(store.kind(last), ObjKind::Table(t) if t.is_unused());
    if unused {
        if let ObjKind::Root(children) = &mut store.get_mut(root).kind {
            children.pop();
        }
    }
}

fn decode_one_stream<O: OffsetReader + ?Sized>(
    store: &mut ObjStore,
    stream_id: ObjId,
    offsets: &O,
    options: &ParseOptions,
    warnings: &mut Vec<Warning>,
) {
    let (dict, location, stream_type) = match store.kind(stream_id) {
        ObjKind::Stream(s) => (s.dictionary, s.source_location, s.stream_type.clone()),
        _ => return,
    };
    // Only classified streams are decoded.
    let Some(stream_type) = stream_type else {
        return;
    };
    let (Some(dict), Some(location)) = (dict, location) else {
        return;
    };
    if store.dict_get(dict, "F").is_some() {
        warnings.push(
            Warning::new(
                "pdf:parser:invalid_stream:external_file",
                "stream data lives in an external file; not supported",
            )
            .with_span(store.get(stream_id).span),
        );
    }
    let mut span = location;
    if let Some(declared) = store
        .dict_get_deref(dict, "Length")
        .and_then(|v| store.int_value(v))
        .filter(|v| *v >= 0)
    {
        let actual = span.len() as i64;
        if declared != actual {
            span.end = span.start.saturating_add(declared as u64);
            if (declared - actual).abs() > 2 {
                warnings.push(
                    Warning::new(
                        "pdf:parser:invalid_stream:length_mismatch",
                        format!(
                            "stream declares Length {declared} but body holds {actual} bytes"
                        ),
                    )
                    .with_span(location),
                );
            }
            if let ObjKind::Stream(s) = &mut store.get_mut(stream_id).kind {
                s.source_location = Some(span);
            }
        }
    }
    let filters = assemble_filters(store, dict);
    let raw = match offsets.read_range(span.start, span.end) {
        Ok(raw) => raw,
        Err(err) => {
            warnings.push(
                Warning::new("pdf:parser:error:stream:decode", "stream body read failed")
                    .with_span(span)
                    .with_cause(err.to_string()),
            );
            Vec::new()
        }
    };
    let decoded = if filters.is_empty() {
        raw
    } else {
        match decode_chain(&raw, &filters, options.max_stream_bytes) {
            Ok(d) => d,
            Err(err) => {
                warnings.push(
                    Warning::new(
                        "pdf:parser:error:stream:decode",
                        format!("stream filter chain failed for `{stream_type}` stream"),
                    )
                    .with_span(span)
                    .with_cause(err.to_string()),
                );
                Vec::new()
            }
        }
    };
    match stream_type.as_str() {
        "Content" | "XObject/Form" => {
            let content = store.create(ObjKind::Content(Vec::new()), span);
            let ws = sub_parse_into(store, content, &decoded);
            warnings.extend(ws);
            attach_direct(store, stream_id, content);
        }
        "XObject/Image" => {
            let bytes = store.create(ObjKind::Bytes(decoded), span);
            attach_direct(store, stream_id, bytes);
        }
        "ObjStm" => {
            let n = store
                .dict_get_deref(dict, "N")
                .and_then(|v| store.int_value(v))
                .filter(|v| *v >= 0);
            let first = store
                .dict_get_deref(dict, "First")
                .and_then(|v| store.int_value(v))
                .filter(|v| *v >= 0);
            let (Some(n), Some(first)) = (n, first) else {
                warnings.push(
                    Warning::new(
                        "pdf:parser:invalid_stream:objstm",
                        "object stream lacks numeric N/First entries",
                    )
                    .with_span(span),
                );
                return;
            };
            let out =
                expand_object_stream(store, stream_id, &decoded, n as usize, first as usize);
            warnings.extend(out.warnings);
        }
        "XRef" => {
            decode_xref_substream(store, stream_id, dict, &decoded, span, warnings);
        }
        _ => {
            let bytes = store.create(ObjKind::Bytes(decoded), span);
            attach_direct(store, stream_id, bytes);
        }
    }
}

fn attach_direct(store: &mut ObjStore, stream_id: ObjId, child: ObjId) {
    store.set_parent(child, stream_id);
    if let ObjKind::Stream(s) = &mut store.get_mut(stream_id).kind {
        s.direct = Some(child);
    }
}

fn assemble_filters(store: &ObjStore, dict: ObjId) -> Vec<FilterSpec> {
    let mut names: Vec<String> = Vec::new();
    if let Some(filter) = store.dict_get_deref(dict, "Filter") {
        match store.kind(filter) {
            ObjKind::Name(n) => names.push(n.clone()),
            ObjKind::Array(items) => {
                for item in items {
                    let item = store.deref(*item);
                    if let Some(n) = store.name_value(item) {
                        names.push(n.to_string());
                    }
                }
            }
            _ => {}
        }
    }
    let mut parms: Vec<Option<PredictorParms>> = vec![None; names.len()];
    if let Some(dp) = store.dict_get_deref(dict, "DecodeParms") {
        match store.kind(dp) {
            ObjKind::Dictionary(_) => {
                if let Some(slot) = parms.first_mut() {
                    *slot = Some(predictor_parms(store, dp));
                }
            }
            ObjKind::Array(items) => {
                for (idx, item) in items.iter().enumerate() {
                    if idx >= parms.len() {
                        break;
                    }
                    let item = store.deref(*item);
                    if matches!(store.kind(item), ObjKind::Dictionary(_)) {
                        parms[idx] = Some(predictor_parms(store, item));
                    }
                }
            }
            _ => {}
        }
    }
    names
        .into_iter()
        .zip(parms)
        .map(|(name, parms)| FilterSpec { name, parms })
        .collect()
}

fn predictor_parms(store: &ObjStore, dict: ObjId) -> PredictorParms {
    let int = |key: &str, default: u32| -> u32 {
        store
            .dict_get_deref(dict, key)
            .and_then(|v| store.int_value(v))
            .and_then(|v| u32::try_from(v).ok())
            .unwrap_or(default)
    };
    PredictorParms {
        predictor: int("Predictor", 1),
        colors: int("Colors", 1),
        bits_per_component: int("BitsPerComponent", 8),
        columns: int("Columns", 1),
    }
}

fn decode_xref_substream(
    store: &mut ObjStore,
    stream_id: ObjId,
    dict: ObjId,
    decoded: &[u8],
    span: Span,
    warnings: &mut Vec<Warning>,
) {
    let widths: Vec<i64> = match store.dict_get_deref(dict, "W") {
        Some(w) => match store.kind(w) {
            ObjKind::Array(items) => items
                .iter()
                .filter_map(|i| store.int_value(store.deref(*i)))
                .collect(),
            _ => Vec::new(),
        },
        None => Vec::new(),
    };
    if widths.is_empty() {
        warnings.push(
            Warning::new(
                "pdf:parser:invalid_stream:xref:missing_w",
                "xref stream has no usable W column widths",
            )
            .with_span(span),
        );
        return;
    }
    let size = store
        .dict_get_deref(dict, "Size")
        .and_then(|v| store.int_value(v))
        .unwrap_or(0);
    let mut subsections = Vec::new();
    if let Some(index) = store.dict_get_deref(dict, "Index") {
        if let ObjKind::Array(items) = store.kind(index) {
            let values: Vec<i64> = items
                .iter()
                .filter_map(|i| store.int_value(store.deref(*i)))
                .collect();
            for pair in values.chunks_exact(2) {
                subsections.push(XrefSubsection {
                    start: pair[0],
                    count: pair[1],
                });
            }
        }
    }
    if subsections.is_empty() {
        subsections.push(XrefSubsection {
            start: 0,
            count: size,
        });
    }
    let (data, ws) = decode_xref_stream(&widths, &subsections, decoded, span);
    warnings.extend(ws);
    let xref_obj = store.create(ObjKind::Xref(data), span);
    attach_direct(store, stream_id, xref_obj);
    if let Some(table) = store.find_ancestor(stream_id, |k| matches!(k, ObjKind::Table(_))) {
        if let ObjKind::Table(t) = &mut store.get_mut(table).kind {
            t.xref_obj = Some(xref_obj);
        }
    }
}

/// Picks the catalog: each revision's trailer `Root` first, then the xref
/// stream dictionary's `Root`. First dictionary found wins.
pub fn resolve_catalog(store: &mut ObjStore) {
    for table_id in store.tables() {
        let (trailer, xref_obj) = match store.kind(table_id) {
            ObjKind::Table(t) => (t.trailer, t.xref_obj),
            _ => continue,
        };
        if let Some(trailer) = trailer {
            if let Some(root) = store.dict_get(trailer, "Root") {
                let target = store.deref(root);
                if matches!(store.kind(target), ObjKind::Dictionary(_)) {
                    store.catalog = Some(target);
                    return;
                }
            }
        }
        if let Some(xref_obj) = xref_obj {
            let stream_id = store.get(xref_obj).parent;
            let dict = stream_id.and_then(|s| match store.kind(s) {
                ObjKind::Stream(st) => st.dictionary,
                _ => None,
            });
            if let Some(dict) = dict {
                if let Some(root) = store.dict_get(dict, "Root") {
                    let target = store.deref(root);
                    if matches!(store.kind(target), ObjKind::Dictionary(_)) {
                        store.catalog = Some(target);
                        return;
                    }
                }
            }
        }
    }
}
