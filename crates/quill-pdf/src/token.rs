use crate::span::Span;
use crate::warn::Warning;
use crate::xref::XrefTable;

/// Identifier of an indirect object. Composed by the tokenizer from the two
/// integers preceding `obj`/`R`; `{num:-1, gen:-1}` when they were missing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObjIdent {
    pub num: i64,
    pub gen: i64,
}

impl ObjIdent {
    pub fn new(num: i64, gen: i64) -> Self {
        Self { num, gen }
    }

    /// Store index key, `"num/gen"`.
    pub fn key(&self) -> String {
        format!("{}/{}", self.num, self.gen)
    }

    pub fn is_valid(&self) -> bool {
        self.num >= 0 && self.gen >= 0
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    Space,
    Comment(String),
    Junk(String),
    Null,
    Boolean(bool),
    Integer(i64),
    Real(f64),
    Str(Vec<u8>),
    HexStr(Vec<u8>),
    Name(String),
    ArrayStart,
    ArrayEnd,
    DictStart,
    DictEnd,
    IndirectStart(ObjIdent),
    IndirectEnd,
    Ref(ObjIdent),
    /// Payload is the body byte range in the source file.
    Stream { body: Span },
    /// Classical cross-reference section.
    Xref(XrefTable),
    Trailer,
    /// `startxref` + offset + `%%EOF`.
    Eof { startxref: Option<u64> },
    /// Content-stream operator keyword.
    Op(String),
}

impl TokenKind {
    /// Short tag used in warning codes.
    pub fn tag(&self) -> &'static str {
        match self {
            TokenKind::Space => "space",
            TokenKind::Comment(_) => "comment",
            TokenKind::Junk(_) => "junk",
            TokenKind::Null => "null",
            TokenKind::Boolean(_) => "boolean",
            TokenKind::Integer(_) => "integer",
            TokenKind::Real(_) => "real",
            TokenKind::Str(_) => "string",
            TokenKind::HexStr(_) => "hexstring",
            TokenKind::Name(_) => "name",
            TokenKind::ArrayStart => "array_start",
            TokenKind::ArrayEnd => "array_end",
            TokenKind::DictStart => "dict_start",
            TokenKind::DictEnd => "dict_end",
            TokenKind::IndirectStart(_) => "indirect_start",
            TokenKind::IndirectEnd => "indirect_end",
            TokenKind::Ref(_) => "ref",
            TokenKind::Stream { .. } => "stream",
            TokenKind::Xref(_) => "xref",
            TokenKind::Trailer => "trailer",
            TokenKind::Eof { .. } => "eof",
            TokenKind::Op(_) => "op",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Token {
    pub span: Span,
    pub kind: TokenKind,
    pub warning: Option<Warning>,
}

impl Token {
    pub fn new(span: Span, kind: TokenKind) -> Self {
        Self {
            span,
            kind,
            warning: None,
        }
    }

    pub fn with_warning(mut self, warning: Warning) -> Self {
        self.warning = Some(warning);
        self
    }
}
