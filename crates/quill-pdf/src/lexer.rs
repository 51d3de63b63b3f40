use tracing::trace;

use crate::object::{DictData, ObjId, ObjKind, ObjStore, StreamData, TableData};
use crate::span::Span;
use crate::strings::classify_string;
use crate::token::{Token, TokenKind};
use crate::warn::Warning;
use crate::xref::XrefTable;

/// Result of lexing one token.
#[derive(Debug, Default)]
pub struct LexOutcome {
    pub produced: Option<ObjId>,
    pub warnings: Vec<Warning>,
}

#[derive(Debug)]
struct Frame {
    id: ObjId,
    /// Dictionary frames alternate between key and value state; a taken key
    /// waits here for its value.
    pending_key: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CloseKind {
    Array,
    Dict,
    Indirect,
}

impl CloseKind {
    fn matches(self, kind: &ObjKind) -> bool {
        matches!(
            (self, kind),
            (CloseKind::Array, ObjKind::Array(_))
                | (CloseKind::Dict, ObjKind::Dictionary(_))
                | (CloseKind::Indirect, ObjKind::Indirect { .. })
        )
    }

    fn tag(self) -> &'static str {
        match self {
            CloseKind::Array => "array_end",
            CloseKind::Dict => "dict_end",
            CloseKind::Indirect => "indirect_end",
        }
    }
}

/// Token-at-a-time tree builder. Owns the parent stack plus the
/// xref/trailer state that a revision's `%%EOF` seals into its Table.
///
/// The stack bottom is the document Root (with a Table above it), or an
/// arbitrary container when sub-parsing decoded stream payloads; the bottom
/// frame is never popped.
#[derive(Debug)]
pub struct Lexer {
    stack: Vec<Frame>,
    pending_xref: Option<XrefTable>,
    pending_trailer: bool,
    pending_trailer_dict: Option<ObjId>,
}

impl Lexer {
    /// Document-mode lexer: Root at the bottom, a fresh Table above it.
    pub fn for_document(store: &mut ObjStore) -> Self {
        let mut lexer = Self {
            stack: vec![Frame {
                id: store.root,
                pending_key: None,
            }],
            pending_xref: None,
            pending_trailer: false,
            pending_trailer_dict: None,
        };
        let table = store.create(ObjKind::Table(TableData::default()), Span::default());
        lexer.attach_to_root(store, table);
        lexer.stack.push(Frame {
            id: table,
            pending_key: None,
        });
        lexer
    }

    /// Sub-parse lexer: everything lexed lands inside `container`.
    pub fn for_container(container: ObjId) -> Self {
        Self {
            stack: vec![Frame {
                id: container,
                pending_key: None,
            }],
            pending_xref: None,
            pending_trailer: false,
            pending_trailer_dict: None,
        }
    }

    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    pub fn push_token(&mut self, store: &mut ObjStore, token: &Token) -> LexOutcome {
        let mut out = LexOutcome::default();
        match &token.kind {
            TokenKind::Space => {}
            TokenKind::Comment(s) => {
                out.produced = self.insert_new(store, ObjKind::Comment(s.clone()), token, &mut out.warnings)
            }
            TokenKind::Junk(s) => {
                out.produced = self.insert_new(store, ObjKind::Junk(s.clone()), token, &mut out.warnings)
            }
            TokenKind::Null => {
                out.produced = self.insert_new(store, ObjKind::Null, token, &mut out.warnings)
            }
            TokenKind::Boolean(v) => {
                out.produced = self.insert_new(store, ObjKind::Boolean(*v), token, &mut out.warnings)
            }
            TokenKind::Integer(v) => {
                out.produced = self.insert_new(store, ObjKind::Integer(*v), token, &mut out.warnings)
            }
            TokenKind::Real(v) => {
                out.produced = self.insert_new(store, ObjKind::Real(*v), token, &mut out.warnings)
            }
            TokenKind::Name(n) => {
                out.produced = self.insert_new(store, ObjKind::Name(n.clone()), token, &mut out.warnings)
            }
            TokenKind::Op(o) => {
                out.produced = self.insert_new(store, ObjKind::Op(o.clone()), token, &mut out.warnings)
            }
            TokenKind::Str(bytes) => {
                let kind = classify_string(bytes, false);
                out.produced = self.insert_new(store, kind, token, &mut out.warnings)
            }
            TokenKind::HexStr(bytes) => {
                let kind = classify_string(bytes, true);
                out.produced = self.insert_new(store, kind, token, &mut out.warnings)
            }
            TokenKind::ArrayStart => {
                out.produced =
                    self.open_container(store, ObjKind::Array(Vec::new()), token, &mut out.warnings)
            }
            TokenKind::DictStart => {
                out.produced = self.open_container(
                    store,
                    ObjKind::Dictionary(DictData::default()),
                    token,
                    &mut out.warnings,
                )
            }
            TokenKind::ArrayEnd => {
                out.produced = self.close(store, CloseKind::Array, token, &mut out.warnings)
            }
            TokenKind::DictEnd => {
                out.produced = self.close(store, CloseKind::Dict, token, &mut out.warnings)
            }
            TokenKind::IndirectStart(ident) => {
                let id = store.create(
                    ObjKind::Indirect {
                        ident: *ident,
                        direct: None,
                    },
                    token.span,
                );
                if ident.is_valid() {
                    store.register_indirect(*ident, id);
                }
                self.insert(store, id, &mut out.warnings);
                self.stack.push(Frame {
                    id,
                    pending_key: None,
                });
                out.produced = Some(id);
            }
            TokenKind::IndirectEnd => {
                out.produced = self.close(store, CloseKind::Indirect, token, &mut out.warnings)
            }
            TokenKind::Ref(ident) => {
                out.produced = self.insert_new(
                    store,
                    ObjKind::Ref {
                        ident: *ident,
                        indirect: None,
                    },
                    token,
                    &mut out.warnings,
                )
            }
            TokenKind::Stream { body } => {
                out.produced = self.stream_token(store, *body, token, &mut out.warnings)
            }
            TokenKind::Xref(table) => {
                self.pending_xref = Some(table.clone());
            }
            TokenKind::Trailer => {
                self.pending_trailer = true;
            }
            TokenKind::Eof { startxref } => {
                out.produced = self.eof_token(store, *startxref, token, &mut out.warnings)
            }
        }
        out
    }

    fn attach_to_root(&mut self, store: &mut ObjStore, id: ObjId) {
        let root = store.root;
        if let ObjKind::Root(children) = &mut store.get_mut(root).kind {
            children.push(id);
        }
        store.set_parent(id, root);
    }

    fn insert_new(
        &mut self,
        store: &mut ObjStore,
        kind: ObjKind,
        token: &Token,
        warnings: &mut Vec<Warning>,
    ) -> Option<ObjId> {
        let id = store.create(kind, token.span);
        self.insert(store, id, warnings);
        Some(id)
    }

    fn open_container(
        &mut self,
        store: &mut ObjStore,
        kind: ObjKind,
        token: &Token,
        warnings: &mut Vec<Warning>,
    ) -> Option<ObjId> {
        let id = store.create(kind, token.span);
        self.insert(store, id, warnings);
        self.stack.push(Frame {
            id,
            pending_key: None,
        });
        Some(id)
    }

    /// Inserts `child` into the current parent per its kind. Under the Root
    /// an implicit Table is opened first, so bodies always live in a Table.
    fn insert(&mut self, store: &mut ObjStore, child: ObjId, warnings: &mut Vec<Warning>) {
        let parent_id = self.stack.last().expect("stack bottom").id;
        if matches!(store.kind(parent_id), ObjKind::Root(_)) {
            let span = store.get(child).span;
            let table = store.create(ObjKind::Table(TableData::default()), span);
            self.attach_to_root(store, table);
            self.stack.push(Frame {
                id: table,
                pending_key: None,
            });
        }
        let frame_idx = self.stack.len() - 1;
        let parent_id = self.stack[frame_idx].id;
        match store.kind(parent_id) {
            ObjKind::Array(_) | ObjKind::Content(_) => {
                if let ObjKind::Array(children) | ObjKind::Content(children) =
                    &mut store.get_mut(parent_id).kind
                {
                    children.push(child);
                }
                store.set_parent(child, parent_id);
            }
            ObjKind::Table(_) => {
                if self.pending_trailer && matches!(store.kind(child), ObjKind::Dictionary(_)) {
                    self.pending_trailer_dict = Some(child);
                    self.pending_trailer = false;
                }
                if let ObjKind::Table(t) = &mut store.get_mut(parent_id).kind {
                    t.children.push(child);
                }
                store.set_parent(child, parent_id);
            }
            ObjKind::Dictionary(_) => self.insert_into_dict(store, frame_idx, child, warnings),
            ObjKind::Indirect { direct, .. } => {
                if direct.is_none() {
                    if let ObjKind::Indirect { direct, .. } = &mut store.get_mut(parent_id).kind {
                        *direct = Some(child);
                    }
                    store.set_parent(child, parent_id);
                } else {
                    warnings.push(
                        Warning::new(
                            "pdf:lexer:invalid_token:multiple_children",
                            "indirect object already has a direct child; extra object dropped",
                        )
                        .with_span(store.get(child).span),
                    );
                }
            }
            other => {
                warnings.push(
                    Warning::new(
                        "pdf:lexer:invalid_token:bad_parent",
                        format!("cannot insert into `{}` parent", other.tag()),
                    )
                    .with_span(store.get(child).span),
                );
            }
        }
    }

    fn insert_into_dict(
        &mut self,
        store: &mut ObjStore,
        frame_idx: usize,
        child: ObjId,
        warnings: &mut Vec<Warning>,
    ) {
        let parent_id = self.stack[frame_idx].id;
        if matches!(
            store.kind(child),
            ObjKind::Comment(_) | ObjKind::Junk(_)
        ) {
            // Comments and junk inside dictionaries never disturb key state.
            return;
        }
        if let Some(key) = self.stack[frame_idx].pending_key.take() {
            if let ObjKind::Dictionary(d) = &mut store.get_mut(parent_id).kind {
                d.entries.push((key, child));
            }
            store.set_parent(child, parent_id);
            return;
        }
        // Key position: a Name is the normal case. Any other scalar with a
        // printable value becomes the key under protest; containers and
        // valueless objects warn and leave an empty key so the following
        // value keeps key/value parity.
        let span = store.get(child).span;
        match store.kind(child) {
            ObjKind::Name(n) => {
                self.stack[frame_idx].pending_key = Some(n.clone());
            }
            ObjKind::Integer(v) => {
                warnings.push(invalid_key_warning("integer", span));
                self.stack[frame_idx].pending_key = Some(v.to_string());
            }
            ObjKind::Real(v) => {
                warnings.push(invalid_key_warning("real", span));
                self.stack[frame_idx].pending_key = Some(v.to_string());
            }
            ObjKind::Boolean(v) => {
                warnings.push(invalid_key_warning("boolean", span));
                self.stack[frame_idx].pending_key = Some(v.to_string());
            }
            ObjKind::Text { value, .. } => {
                warnings.push(invalid_key_warning("text", span));
                self.stack[frame_idx].pending_key = Some(value.clone());
            }
            other => {
                warnings.push(invalid_key_warning(other.tag(), span));
                self.stack[frame_idx].pending_key = Some(String::new());
            }
        }
    }

    /// Closes a container. On a type mismatch, inner frames are popped with
    /// `missing_end` warnings until the matching frame; a close with no
    /// matching open anywhere reports `missing_start` and pops nothing.
    fn close(
        &mut self,
        store: &mut ObjStore,
        which: CloseKind,
        token: &Token,
        warnings: &mut Vec<Warning>,
    ) -> Option<ObjId> {
        let mut match_idx = None;
        for i in (1..self.stack.len()).rev() {
            if which.matches(store.kind(self.stack[i].id)) {
                match_idx = Some(i);
                break;
            }
        }
        let Some(idx) = match_idx else {
            warnings.push(
                Warning::new(
                    format!("pdf:lexer:invalid_token:{}:missing_start", which.tag()),
                    format!("`{}` with no open container of that type", which.tag()),
                )
                .with_span(token.span),
            );
            return None;
        };
        while self.stack.len() > idx + 1 {
            let popped = self.stack.pop().expect("inner frame");
            warnings.push(
                Warning::new(
                    "pdf:lexer:invalid_token:missing_end",
                    format!(
                        "`{}` closed while inner `{}` was still open",
                        which.tag(),
                        store.kind(popped.id).tag()
                    ),
                )
                .with_span(token.span),
            );
        }
        let frame = self.stack.pop().expect("matching frame");
        trace!(
            domain = "pdf.lexer",
            kind = "container_closed",
            tag = which.tag(),
            depth = self.stack.len(),
            "Closed container"
        );
        Some(frame.id)
    }

    /// `stream` steals the Dictionary that the enclosing Indirect just
    /// received and wraps it into a Stream object.
    fn stream_token(
        &mut self,
        store: &mut ObjStore,
        body: Span,
        token: &Token,
        warnings: &mut Vec<Warning>,
    ) -> Option<ObjId> {
        let top = self.stack.last().expect("stack bottom").id;
        let dict = match store.kind(top) {
            ObjKind::Indirect {
                direct: Some(d), ..
            } if matches!(store.kind(*d), ObjKind::Dictionary(_)) => *d,
            _ => {
                warnings.push(
                    Warning::new(
                        "pdf:lexer:invalid_token:stream:no_dictionary",
                        "stream body without a preceding dictionary in an indirect object",
                    )
                    .with_span(token.span),
                );
                return None;
            }
        };
        if let ObjKind::Indirect { direct, .. } = &mut store.get_mut(top).kind {
            *direct = None;
        }
        let stream = store.create(
            ObjKind::Stream(StreamData {
                dictionary: Some(dict),
                source_location: Some(body),
                stream_type: None,
                direct: None,
            }),
            token.span,
        );
        store.set_parent(dict, stream);
        if let ObjKind::Indirect { direct, .. } = &mut store.get_mut(top).kind {
            *direct = Some(stream);
        }
        store.set_parent(stream, top);
        Some(stream)
    }

    /// `startxref`/`%%EOF` seals the current revision: attaches the pending
    /// xref section, trailer dictionary and startxref offset to the open
    /// Table, then opens a fresh Table for a possible incremental update.
    fn eof_token(
        &mut self,
        store: &mut ObjStore,
        startxref: Option<u64>,
        token: &Token,
        warnings: &mut Vec<Warning>,
    ) -> Option<ObjId> {
        while self.stack.len() > 1
            && !matches!(store.kind(self.stack.last().unwrap().id), ObjKind::Table(_))
        {
            let popped = self.stack.pop().expect("frame");
            warnings.push(
                Warning::new(
                    "pdf:lexer:invalid_token:missing_end",
                    format!(
                        "end of revision while `{}` was still open",
                        store.kind(popped.id).tag()
                    ),
                )
                .with_span(token.span),
            );
        }
        let top = self.stack.last().expect("stack bottom").id;
        if !matches!(store.kind(top), ObjKind::Table(_)) {
            warnings.push(
                Warning::new(
                    "pdf:lexer:invalid_token:eof:no_table",
                    "end-of-file marker outside a document revision",
                )
                .with_span(token.span),
            );
            self.pending_xref = None;
            self.pending_trailer = false;
            self.pending_trailer_dict = None;
            return None;
        }
        let table_id = top;
        let xref = self.pending_xref.take();
        let trailer = self.pending_trailer_dict.take();
        self.pending_trailer = false;
        if let ObjKind::Table(t) = &mut store.get_mut(table_id).kind {
            t.xref_table = xref;
            t.trailer = trailer;
            t.startxref = startxref;
        }
        self.stack.pop();
        let fresh = store.create(ObjKind::Table(TableData::default()), Span::at(token.span.end));
        self.attach_to_root(store, fresh);
        self.stack.push(Frame {
            id: fresh,
            pending_key: None,
        });
        Some(table_id)
    }
}

fn invalid_key_warning(tag: &str, span: Span) -> Warning {
    Warning::new(
        format!("pdf:lexer:invalid_token:{tag}:invalid_key"),
        format!("dictionary key is a `{tag}`, expected a name"),
    )
    .with_span(span)
}
