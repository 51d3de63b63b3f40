use std::collections::HashMap;

use chrono::{DateTime, FixedOffset};

use crate::span::Span;
use crate::token::ObjIdent;
use crate::xref::{XrefData, XrefTable};

/// Handle into the store's object arena. UIDs are assigned in creation
/// order and are never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjId(pub usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextEncoding {
    Pdf,
    Utf8,
    Utf16Be,
}

impl TextEncoding {
    pub fn tag(&self) -> &'static str {
        match self {
            TextEncoding::Pdf => "pdf",
            TextEncoding::Utf8 => "utf-8",
            TextEncoding::Utf16Be => "utf-16be",
        }
    }
}

/// Insertion-ordered dictionary storage. Duplicate keys are kept; lookups
/// return the first occurrence.
#[derive(Debug, Clone, Default)]
pub struct DictData {
    pub entries: Vec<(String, ObjId)>,
}

impl DictData {
    pub fn get(&self, key: &str) -> Option<ObjId> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| *v)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// One revision of the document: body objects plus the cross-reference
/// machinery that sealed it.
#[derive(Debug, Clone, Default)]
pub struct TableData {
    pub children: Vec<ObjId>,
    pub xref_table: Option<XrefTable>,
    pub xref_obj: Option<ObjId>,
    pub trailer: Option<ObjId>,
    pub startxref: Option<u64>,
}

impl TableData {
    pub fn is_unused(&self) -> bool {
        self.children.is_empty()
            && self.xref_table.is_none()
            && self.xref_obj.is_none()
            && self.trailer.is_none()
            && self.startxref.is_none()
    }
}

#[derive(Debug, Clone, Default)]
pub struct StreamData {
    pub dictionary: Option<ObjId>,
    /// Body byte range in the original file.
    pub source_location: Option<Span>,
    /// Classification key: `Type` or `Type/Subtype`.
    pub stream_type: Option<String>,
    /// Decoded child, set only after classification and a successful decode.
    pub direct: Option<ObjId>,
}

#[derive(Debug, Clone)]
pub enum ObjKind {
    Null,
    Boolean(bool),
    Integer(i64),
    Real(f64),
    Name(String),
    Text {
        value: String,
        encoding: TextEncoding,
        from_hex: bool,
    },
    Bytes(Vec<u8>),
    Date(DateTime<FixedOffset>),
    Comment(String),
    Junk(String),
    Op(String),
    Array(Vec<ObjId>),
    Dictionary(DictData),
    /// Content-stream body: operands and operators in order.
    Content(Vec<ObjId>),
    /// Document root: one Table per revision encountered.
    Root(Vec<ObjId>),
    Table(TableData),
    Indirect {
        ident: ObjIdent,
        direct: Option<ObjId>,
    },
    /// `N G R`. `indirect` is a non-owning lookup into the store's
    /// identifier index, filled by the resolution passes.
    Ref {
        ident: ObjIdent,
        indirect: Option<ObjId>,
    },
    Stream(StreamData),
    Xref(XrefData),
}

impl ObjKind {
    pub fn tag(&self) -> &'static str {
        match self {
            ObjKind::Null => "null",
            ObjKind::Boolean(_) => "boolean",
            ObjKind::Integer(_) => "integer",
            ObjKind::Real(_) => "real",
            ObjKind::Name(_) => "name",
            ObjKind::Text { .. } => "text",
            ObjKind::Bytes(_) => "bytes",
            ObjKind::Date(_) => "date",
            ObjKind::Comment(_) => "comment",
            ObjKind::Junk(_) => "junk",
            ObjKind::Op(_) => "op",
            ObjKind::Array(_) => "array",
            ObjKind::Dictionary(_) => "dictionary",
            ObjKind::Content(_) => "content",
            ObjKind::Root(_) => "root",
            ObjKind::Table(_) => "table",
            ObjKind::Indirect { .. } => "indirect",
            ObjKind::Ref { .. } => "ref",
            ObjKind::Stream(_) => "stream",
            ObjKind::Xref(_) => "xref",
        }
    }
}

/// Object header shared by every variant. The parent link is non-owning;
/// ownership flows only through children/direct/dictionary edges.
#[derive(Debug, Clone)]
pub struct Object {
    pub uid: ObjId,
    pub parent: Option<ObjId>,
    pub span: Span,
    pub kind: ObjKind,
}

/// Arena of parsed objects plus the indexes the resolution phases need.
/// Single-owner: the orchestrator and its callees mutate it; it is not
/// shareable across threads during a run.
#[derive(Debug)]
pub struct ObjStore {
    objects: Vec<Object>,
    /// `"num/gen"` to the latest Indirect carrying that identifier.
    pub indirects: HashMap<String, ObjId>,
    pub refs: Vec<ObjId>,
    pub streams: Vec<ObjId>,
    pub root: ObjId,
    pub catalog: Option<ObjId>,
    pub pdf_version: Option<String>,
}

impl Default for ObjStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ObjStore {
    pub fn new() -> Self {
        let root = Object {
            uid: ObjId(0),
            parent: None,
            span: Span::default(),
            kind: ObjKind::Root(Vec::new()),
        };
        Self {
            objects: vec![root],
            indirects: HashMap::new(),
            refs: Vec::new(),
            streams: Vec::new(),
            root: ObjId(0),
            catalog: None,
            pdf_version: None,
        }
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    pub fn create(&mut self, kind: ObjKind, span: Span) -> ObjId {
        let uid = ObjId(self.objects.len());
        if matches!(kind, ObjKind::Ref { .. }) {
            self.refs.push(uid);
        }
        if matches!(kind, ObjKind::Stream(_)) {
            self.streams.push(uid);
        }
        self.objects.push(Object {
            uid,
            parent: None,
            span,
            kind,
        });
        uid
    }

    pub fn get(&self, id: ObjId) -> &Object {
        &self.objects[id.0]
    }

    pub fn get_mut(&mut self, id: ObjId) -> &mut Object {
        &mut self.objects[id.0]
    }

    pub fn kind(&self, id: ObjId) -> &ObjKind {
        &self.objects[id.0].kind
    }

    pub fn set_parent(&mut self, child: ObjId, parent: ObjId) {
        self.objects[child.0].parent = Some(parent);
    }

    pub fn iter(&self) -> impl Iterator<Item = &Object> {
        self.objects.iter()
    }

    /// Registers (or redefines) the Indirect owning `ident`. A later
    /// definition overwrites only this index; the earlier Indirect stays
    /// reachable from its parent.
    pub fn register_indirect(&mut self, ident: ObjIdent, id: ObjId) {
        self.indirects.insert(ident.key(), id);
    }

    pub fn lookup_indirect(&self, ident: &ObjIdent) -> Option<ObjId> {
        self.indirects.get(&ident.key()).copied()
    }

    /// Tables under the Root, in revision order.
    pub fn tables(&self) -> Vec<ObjId> {
        match &self.objects[self.root.0].kind {
            ObjKind::Root(children) => children.clone(),
            _ => Vec::new(),
        }
    }

    /// Follows Ref -> Indirect -> direct chains to the payload object.
    /// Bounded, so reference cycles cannot hang the walk.
    pub fn deref(&self, id: ObjId) -> ObjId {
        let mut cur = id;
        for _ in 0..32 {
            match &self.objects[cur.0].kind {
                ObjKind::Ref {
                    indirect: Some(ind),
                    ..
                } => cur = *ind,
                ObjKind::Indirect {
                    direct: Some(d), ..
                } => cur = *d,
                _ => return cur,
            }
        }
        cur
    }

    pub fn dict_get(&self, dict: ObjId, key: &str) -> Option<ObjId> {
        match &self.objects[dict.0].kind {
            ObjKind::Dictionary(d) => d.get(key),
            _ => None,
        }
    }

    /// Dictionary lookup followed by a deref of the value.
    pub fn dict_get_deref(&self, dict: ObjId, key: &str) -> Option<ObjId> {
        self.dict_get(dict, key).map(|v| self.deref(v))
    }

    pub fn name_value(&self, id: ObjId) -> Option<&str> {
        match &self.objects[id.0].kind {
            ObjKind::Name(n) => Some(n.as_str()),
            _ => None,
        }
    }

    pub fn int_value(&self, id: ObjId) -> Option<i64> {
        match &self.objects[id.0].kind {
            ObjKind::Integer(i) => Some(*i),
            _ => None,
        }
    }

    pub fn number_value(&self, id: ObjId) -> Option<f64> {
        match &self.objects[id.0].kind {
            ObjKind::Integer(i) => Some(*i as f64),
            ObjKind::Real(f) => Some(*f),
            _ => None,
        }
    }

    /// Walks parent links upward until an object matching `pred`, bounded
    /// against degenerate parent chains.
    pub fn find_ancestor<F: Fn(&ObjKind) -> bool>(&self, from: ObjId, pred: F) -> Option<ObjId> {
        let mut cur = self.objects[from.0].parent;
        for _ in 0..64 {
            let id = cur?;
            if pred(&self.objects[id.0].kind) {
                return Some(id);
            }
            cur = self.objects[id.0].parent;
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uids_are_monotonic_and_stable() {
        let mut store = ObjStore::new();
        let a = store.create(ObjKind::Integer(1), Span::at(0));
        let b = store.create(ObjKind::Integer(2), Span::at(1));
        assert_eq!(a, ObjId(1));
        assert_eq!(b, ObjId(2));
        assert_eq!(store.len(), 3);
        assert!(matches!(store.kind(store.root), ObjKind::Root(_)));
    }

    #[test]
    fn indirect_redefinition_overwrites_only_the_index() {
        let mut store = ObjStore::new();
        let ident = ObjIdent::new(7, 0);
        let first = store.create(
            ObjKind::Indirect {
                ident,
                direct: None,
            },
            Span::at(0),
        );
        let second = store.create(
            ObjKind::Indirect {
                ident,
                direct: None,
            },
            Span::at(50),
        );
        store.register_indirect(ident, first);
        store.register_indirect(ident, second);
        assert_eq!(store.lookup_indirect(&ident), Some(second));
        // The first definition is still present in the arena.
        assert!(matches!(
            store.kind(first),
            ObjKind::Indirect { direct: None, .. }
        ));
    }

    #[test]
    fn deref_follows_ref_to_payload() {
        let mut store = ObjStore::new();
        let ident = ObjIdent::new(1, 0);
        let value = store.create(ObjKind::Integer(42), Span::at(10));
        let ind = store.create(
            ObjKind::Indirect {
                ident,
                direct: Some(value),
            },
            Span::at(5),
        );
        store.register_indirect(ident, ind);
        let r = store.create(
            ObjKind::Ref {
                ident,
                indirect: Some(ind),
            },
            Span::at(30),
        );
        assert_eq!(store.deref(r), value);
        assert_eq!(store.int_value(store.deref(r)), Some(42));
    }

    #[test]
    fn dict_lookup_keeps_first_duplicate() {
        let mut store = ObjStore::new();
        let a = store.create(ObjKind::Integer(1), Span::at(0));
        let b = store.create(ObjKind::Integer(2), Span::at(1));
        let dict = store.create(
            ObjKind::Dictionary(DictData {
                entries: vec![("K".into(), a), ("K".into(), b)],
            }),
            Span::at(2),
        );
        assert_eq!(store.dict_get(dict, "K"), Some(a));
    }
}
