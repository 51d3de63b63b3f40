use std::collections::VecDeque;

use anyhow::Result;

use crate::chars;
use crate::reader::SequentialReader;
use crate::span::Span;
use crate::token::{ObjIdent, Token, TokenKind};
use crate::warn::Warning;
use crate::xref::{XrefSubsection, XrefTable, XrefTableEntry};

/// Byte stream to token stream. Tokens come out lazily, in strict source
/// order, each with its byte span; recoverable syntax trouble rides along
/// as a warning on the token instead of stopping the stream.
///
/// `obj` and `R` are not syntactically delimited from the two integers that
/// precede them, so the tokenizer holds back runs of integer/space/junk
/// tokens and rewrites the pair into the keyword's identifier payload when
/// one of those keywords arrives.
pub struct Tokenizer<R: SequentialReader> {
    reader: R,
    held: VecDeque<Token>,
    ready: VecDeque<Token>,
    finished: bool,
}

impl<R: SequentialReader> Tokenizer<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            held: VecDeque::new(),
            ready: VecDeque::new(),
            finished: false,
        }
    }

    /// Next token, or `None` once the reader is exhausted and all buffered
    /// tokens have been drained.
    pub fn next_token(&mut self) -> Result<Option<Token>> {
        loop {
            if let Some(t) = self.ready.pop_front() {
                return Ok(Some(t));
            }
            if self.finished {
                return Ok(self.held.pop_front());
            }
            match self.scan_raw()? {
                Some(tok) => self.compose(tok),
                None => {
                    self.finished = true;
                    while let Some(t) = self.held.pop_front() {
                        self.ready.push_back(t);
                    }
                }
            }
        }
    }

    /// Lookahead composition: integers, spaces and junk are buffered; any
    /// other token flushes the buffer. `obj`/`R` steal the two most recent
    /// buffered integers as `{num, gen}`.
    fn compose(&mut self, tok: Token) {
        match tok.kind {
            TokenKind::Integer(_) | TokenKind::Space | TokenKind::Junk(_) => {
                self.held.push_back(tok);
            }
            TokenKind::IndirectStart(_) | TokenKind::Ref(_) => {
                let mut tok = tok;
                let ints: Vec<usize> = self
                    .held
                    .iter()
                    .enumerate()
                    .filter(|(_, t)| matches!(t.kind, TokenKind::Integer(_)))
                    .map(|(i, _)| i)
                    .collect();
                if ints.len() >= 2 {
                    let gen_tok = self.held.remove(ints[ints.len() - 1]).expect("gen int");
                    let num_tok = self.held.remove(ints[ints.len() - 2]).expect("num int");
                    let num = match num_tok.kind {
                        TokenKind::Integer(v) => v,
                        _ => -1,
                    };
                    let gen = match gen_tok.kind {
                        TokenKind::Integer(v) => v,
                        _ => -1,
                    };
                    let ident = ObjIdent::new(num, gen);
                    tok.kind = match tok.kind {
                        TokenKind::IndirectStart(_) => TokenKind::IndirectStart(ident),
                        _ => TokenKind::Ref(ident),
                    };
                } else {
                    let tag = tok.kind.tag();
                    tok.warning = Some(
                        Warning::new(
                            format!("pdf:tokenizer:invalid_token:{tag}:missing_identifier"),
                            format!("`{tag}` keyword without two preceding integers"),
                        )
                        .with_span(tok.span),
                    );
                }
                self.flush_held();
                self.ready.push_back(tok);
            }
            _ => {
                self.flush_held();
                self.ready.push_back(tok);
            }
        }
    }

    fn flush_held(&mut self) {
        while let Some(t) = self.held.pop_front() {
            self.ready.push_back(t);
        }
    }

    fn make(&self, start: u64, kind: TokenKind) -> Token {
        Token::new(Span::new(start, self.reader.offset()), kind)
    }

    fn scan_raw(&mut self) -> Result<Option<Token>> {
        let start = self.reader.offset();
        let Some(b) = self.reader.read_byte(false)? else {
            return Ok(None);
        };
        if chars::is_space(b) {
            self.reader.read_array_while(chars::is_space)?;
            return Ok(Some(self.make(start, TokenKind::Space)));
        }
        let token = match b {
            b'%' => self.scan_comment(start)?,
            b'[' => {
                self.reader.consume(1)?;
                self.make(start, TokenKind::ArrayStart)
            }
            b']' => {
                self.reader.consume(1)?;
                self.make(start, TokenKind::ArrayEnd)
            }
            b'<' => self.scan_angle_open(start)?,
            b'>' => {
                self.reader.consume(1)?;
                if self.reader.read_byte(false)? == Some(b'>') {
                    self.reader.consume(1)?;
                    self.make(start, TokenKind::DictEnd)
                } else {
                    self.make(start, TokenKind::Junk(">".into()))
                }
            }
            b'/' => self.scan_name(start)?,
            b'(' => self.scan_literal_string(start)?,
            _ if chars::is_number(b) => self.scan_number(start)?,
            _ if chars::is_keyword(b) => self.scan_keyword(start)?,
            _ => {
                self.reader.consume(1)?;
                self.make(start, TokenKind::Junk((b as char).to_string()))
            }
        };
        Ok(Some(token))
    }

    /// Consumes one line break: `\n`, `\r\n` or a lone `\r`.
    fn consume_eol(&mut self) -> Result<()> {
        match self.reader.read_byte(false)? {
            Some(b'\r') => {
                self.reader.consume(1)?;
                if self.reader.read_byte(false)? == Some(b'\n') {
                    self.reader.consume(1)?;
                }
            }
            Some(b'\n') => {
                self.reader.consume(1)?;
            }
            _ => {}
        }
        Ok(())
    }

    /// Skips trailing blanks on the current line, then one line break.
    fn consume_line_end(&mut self) -> Result<()> {
        self.reader
            .read_array_while(|c| c == b' ' || c == b'\t')?;
        self.consume_eol()
    }

    fn scan_comment(&mut self, start: u64) -> Result<Token> {
        self.reader.consume(1)?;
        let content = self.reader.read_string_until(chars::is_eol, false)?;
        let mut warning = None;
        if self.reader.eof() {
            warning = Some(
                Warning::new(
                    "pdf:tokenizer:unexpected_eof:comment",
                    "comment runs to end of input without a line break",
                )
                .with_span(Span::new(start, self.reader.offset())),
            );
        } else {
            self.consume_eol()?;
        }
        let mut tok = self.make(start, TokenKind::Comment(content));
        tok.warning = warning;
        Ok(tok)
    }

    fn scan_angle_open(&mut self, start: u64) -> Result<Token> {
        self.reader.consume(1)?;
        if self.reader.read_byte(false)? == Some(b'<') {
            self.reader.consume(1)?;
            return Ok(self.make(start, TokenKind::DictStart));
        }
        // Hex string: hex digits up to `>`, whitespace ignored, odd final
        // digit padded with zero.
        let mut digits = Vec::new();
        let mut terminated = false;
        let mut invalid = false;
        while let Some(b) = self.reader.read_byte(true)? {
            if b == b'>' {
                terminated = true;
                break;
            }
            if chars::is_space(b) {
                continue;
            }
            if b.is_ascii_hexdigit() {
                digits.push(b);
            } else {
                invalid = true;
            }
        }
        let mut out = Vec::with_capacity(digits.len() / 2 + 1);
        let mut i = 0;
        while i < digits.len() {
            let hi = hex_val(digits[i]);
            let lo = if i + 1 < digits.len() {
                hex_val(digits[i + 1])
            } else {
                0
            };
            out.push((hi << 4) | lo);
            i += 2;
        }
        let mut tok = self.make(start, TokenKind::HexStr(out));
        if !terminated {
            tok.warning = Some(
                Warning::new(
                    "pdf:tokenizer:unexpected_eof:hexstring",
                    "hex string missing `>` terminator",
                )
                .with_span(tok.span),
            );
        } else if invalid {
            tok.warning = Some(
                Warning::new(
                    "pdf:tokenizer:invalid_token:hexstring",
                    "hex string contains non-hex bytes",
                )
                .with_span(tok.span),
            );
        }
        Ok(tok)
    }

    fn scan_name(&mut self, start: u64) -> Result<Token> {
        self.reader.consume(1)?;
        let raw = self.reader.read_array_while(chars::is_name)?;
        let mut out = Vec::with_capacity(raw.len());
        let mut i = 0;
        while i < raw.len() {
            if raw[i] == b'#' && i + 2 < raw.len() {
                let hi = raw[i + 1];
                let lo = raw[i + 2];
                if hi.is_ascii_hexdigit() && lo.is_ascii_hexdigit() {
                    out.push((hex_val(hi) << 4) | hex_val(lo));
                    i += 3;
                    continue;
                }
            }
            out.push(raw[i]);
            i += 1;
        }
        Ok(self.make(start, TokenKind::Name(chars::latin1(&out))))
    }

    fn scan_literal_string(&mut self, start: u64) -> Result<Token> {
        self.reader.consume(1)?;
        let mut depth = 1u32;
        let mut out = Vec::new();
        let mut terminated = false;
        while let Some(b) = self.reader.read_byte(true)? {
            match b {
                b'(' => {
                    depth += 1;
                    out.push(b);
                }
                b')' => {
                    depth -= 1;
                    if depth == 0 {
                        terminated = true;
                        break;
                    }
                    out.push(b);
                }
                b'\\' => {
                    let Some(esc) = self.reader.read_byte(true)? else {
                        break;
                    };
                    match esc {
                        b'n' => out.push(b'\n'),
                        b'r' => out.push(b'\r'),
                        b't' => out.push(b'\t'),
                        b'b' => out.push(0x08),
                        b'f' => out.push(0x0C),
                        b'(' | b')' | b'\\' => out.push(esc),
                        b'0'..=b'7' => {
                            let mut val = (esc - b'0') as u32;
                            for _ in 0..2 {
                                match self.reader.read_byte(false)? {
                                    Some(d @ b'0'..=b'7') => {
                                        val = val * 8 + (d - b'0') as u32;
                                        self.reader.consume(1)?;
                                    }
                                    _ => break,
                                }
                            }
                            out.push(val as u8);
                        }
                        b'\r' => {
                            // line continuation; swallow a following \n
                            if self.reader.read_byte(false)? == Some(b'\n') {
                                self.reader.consume(1)?;
                            }
                        }
                        b'\n' => {}
                        _ => {} // unknown escape maps to nothing
                    }
                }
                _ => out.push(b),
            }
        }
        let mut tok = self.make(start, TokenKind::Str(out));
        if !terminated {
            tok.warning = Some(
                Warning::new(
                    "pdf:tokenizer:unexpected_eof:string",
                    "literal string still open at end of input",
                )
                .with_span(tok.span),
            );
        }
        Ok(tok)
    }

    fn scan_number(&mut self, start: u64) -> Result<Token> {
        let run = self.reader.read_string_while(chars::is_number)?;
        let (kind, warning) = if run.contains('.') {
            match run.parse::<f64>() {
                Ok(v) => (TokenKind::Real(v), None),
                Err(_) => (
                    TokenKind::Real(0.0),
                    Some(Warning::new(
                        "pdf:tokenizer:invalid_token:real",
                        format!("unparseable real `{run}`"),
                    )),
                ),
            }
        } else {
            match run.parse::<i64>() {
                Ok(v) => (TokenKind::Integer(v), None),
                Err(_) => (
                    TokenKind::Integer(0),
                    Some(Warning::new(
                        "pdf:tokenizer:invalid_token:integer",
                        format!("unparseable integer `{run}`"),
                    )),
                ),
            }
        };
        let mut tok = self.make(start, kind);
        if let Some(w) = warning {
            let span = tok.span;
            tok.warning = Some(w.with_span(span));
        }
        Ok(tok)
    }

    fn scan_keyword(&mut self, start: u64) -> Result<Token> {
        let kw = self.reader.read_string_while(chars::is_keyword)?;
        match kw.as_str() {
            "null" => Ok(self.make(start, TokenKind::Null)),
            "true" => Ok(self.make(start, TokenKind::Boolean(true))),
            "false" => Ok(self.make(start, TokenKind::Boolean(false))),
            "obj" => Ok(self.make(start, TokenKind::IndirectStart(ObjIdent::new(-1, -1)))),
            "endobj" => Ok(self.make(start, TokenKind::IndirectEnd)),
            "R" => Ok(self.make(start, TokenKind::Ref(ObjIdent::new(-1, -1)))),
            "stream" => self.scan_stream_body(start),
            "xref" => self.scan_xref_section(start),
            "trailer" => {
                self.consume_line_end()?;
                Ok(self.make(start, TokenKind::Trailer))
            }
            "startxref" => self.scan_startxref(start),
            _ => Ok(self.make(start, TokenKind::Op(kw))),
        }
    }

    /// Scans past the raw stream body to `endstream`. The body span excludes
    /// the EOL after `stream` and one EOL directly before `endstream`; a
    /// lone `\r` before `endstream` is tolerated.
    fn scan_stream_body(&mut self, start: u64) -> Result<Token> {
        self.consume_eol()?;
        let body_start = self.reader.offset();
        let mut prev1: Option<u8> = None;
        let mut prev2: Option<u8> = None;
        let mut warning = None;
        let body_end;
        loop {
            let Some(b) = self.reader.read_byte(false)? else {
                body_end = self.reader.offset();
                warning = Some(
                    Warning::new(
                        "pdf:tokenizer:unexpected_eof:stream",
                        "stream body runs to end of input without `endstream`",
                    )
                    .with_span(Span::new(start, self.reader.offset())),
                );
                break;
            };
            if b == b'e' {
                let probe = self.reader.read_array(10, false)?;
                if probe.starts_with(b"endstream") {
                    let boundary = probe
                        .get(9)
                        .map_or(true, |&c| chars::is_space(c) || chars::is_delim(c));
                    if boundary {
                        let mut end = self.reader.offset();
                        if prev1 == Some(b'\n') {
                            end -= 1;
                            if prev2 == Some(b'\r') {
                                end -= 1;
                            }
                        } else if prev1 == Some(b'\r') {
                            end -= 1;
                        }
                        body_end = end.max(body_start);
                        self.reader.consume(9)?;
                        break;
                    }
                }
            }
            self.reader.consume(1)?;
            prev2 = prev1;
            prev1 = Some(b);
        }
        let mut tok = self.make(
            start,
            TokenKind::Stream {
                body: Span::new(body_start, body_end),
            },
        );
        tok.warning = warning;
        Ok(tok)
    }

    /// Classical cross-reference section: subsection headers `start count`
    /// followed by `count` fixed 20-byte entries.
    fn scan_xref_section(&mut self, start: u64) -> Result<Token> {
        self.consume_line_end()?;
        let mut table = XrefTable::default();
        let mut warning: Option<Warning> = None;
        loop {
            match self.reader.read_byte(false)? {
                Some(b) if chars::is_digit(b) => {}
                _ => break,
            }
            let m_str = self.reader.read_string_while(chars::is_digit)?;
            self.reader.read_array_while(|c| c == b' ' || c == b'\t')?;
            let n_str = self.reader.read_string_while(chars::is_digit)?;
            self.consume_line_end()?;
            let (m, n) = match (m_str.parse::<i64>(), n_str.parse::<i64>()) {
                (Ok(m), Ok(n)) => (m, n),
                _ => {
                    warning.get_or_insert(
                        Warning::new(
                            "pdf:tokenizer:invalid_token:xref",
                            "malformed xref subsection header",
                        )
                        .with_span(Span::at(self.reader.offset())),
                    );
                    break;
                }
            };
            table.subsections.push(XrefSubsection { start: m, count: n });
            for _ in 0..n {
                let line = self.reader.read_array(20, true)?;
                if line.len() < 18 {
                    warning.get_or_insert(
                        Warning::new(
                            "pdf:tokenizer:unexpected_eof:xref",
                            "xref section truncated mid-entry",
                        )
                        .with_span(Span::at(self.reader.offset())),
                    );
                    break;
                }
                match parse_xref_entry(&line) {
                    Some(entry) => table.entries.push(entry),
                    None => {
                        warning.get_or_insert(
                            Warning::new(
                                "pdf:tokenizer:invalid_token:xref",
                                "malformed xref entry line",
                            )
                            .with_span(Span::at(self.reader.offset())),
                        );
                    }
                }
            }
        }
        let mut tok = self.make(start, TokenKind::Xref(table));
        tok.warning = warning;
        Ok(tok)
    }

    fn scan_startxref(&mut self, start: u64) -> Result<Token> {
        self.consume_line_end()?;
        let digits = self.reader.read_string_while(chars::is_digit)?;
        let offset = digits.parse::<u64>().ok();
        let mut warning = if offset.is_none() {
            Some(
                Warning::new(
                    "pdf:tokenizer:invalid_token:startxref",
                    "startxref without a byte offset",
                )
                .with_span(Span::at(self.reader.offset())),
            )
        } else {
            None
        };
        self.consume_line_end()?;
        let probe = self.reader.read_array(5, false)?;
        if probe == b"%%EOF" {
            self.reader.consume(5)?;
        } else if warning.is_none() {
            warning = Some(
                Warning::new(
                    "pdf:tokenizer:invalid_token:eof",
                    "expected `%%EOF` after startxref offset",
                )
                .with_span(Span::at(self.reader.offset())),
            );
        }
        let mut tok = self.make(start, TokenKind::Eof { startxref: offset });
        tok.warning = warning;
        Ok(tok)
    }
}

fn hex_val(b: u8) -> u8 {
    match b {
        b'0'..=b'9' => b - b'0',
        b'a'..=b'f' => 10 + b - b'a',
        _ => 10 + b - b'A',
    }
}

/// `"oooooooooo ggggg n"` with `n` or `f` in the third column deciding the
/// entry type. Tolerant of EOL variations inside the fixed 20 bytes.
fn parse_xref_entry(line: &[u8]) -> Option<XrefTableEntry> {
    let text = chars::latin1(line);
    let mut parts = text.split_whitespace();
    let f1 = parts.next()?.parse::<u64>().ok()?;
    let f2 = parts.next()?.parse::<u64>().ok()?;
    let ty = parts.next()?.chars().next()?;
    match ty {
        'n' => Some(XrefTableEntry {
            field1: f1,
            field2: f2,
            free: false,
        }),
        'f' => Some(XrefTableEntry {
            field1: f1,
            field2: f2,
            free: true,
        }),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reader::MemoryReader;

    fn tokens(data: &[u8]) -> Vec<Token> {
        let mut tk = Tokenizer::new(MemoryReader::new(data));
        let mut out = Vec::new();
        while let Some(t) = tk.next_token().unwrap() {
            out.push(t);
        }
        out
    }

    fn kinds(data: &[u8]) -> Vec<TokenKind> {
        tokens(data).into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn spans_cover_input_in_order_without_overlap() {
        let data = b"1 0 obj\n<< /A (x) >>\nendobj\n";
        let toks = tokens(data);
        let mut pos = 0u64;
        for t in &toks {
            assert!(t.span.start >= pos, "token span regressed: {:?}", t);
            pos = t.span.end;
        }
        assert_eq!(pos, data.len() as u64);
    }

    #[test]
    fn composes_obj_identifier_from_preceding_integers() {
        let toks = tokens(b"12 3 obj");
        let ident = toks
            .iter()
            .find_map(|t| match t.kind {
                TokenKind::IndirectStart(id) => Some(id),
                _ => None,
            })
            .expect("indirect_start");
        assert_eq!((ident.num, ident.gen), (12, 3));
        // The stolen integers are not re-emitted.
        assert!(!toks
            .iter()
            .any(|t| matches!(t.kind, TokenKind::Integer(_))));
    }

    #[test]
    fn ref_keyword_without_integers_warns() {
        let toks = tokens(b"/Name R");
        let tok = toks
            .iter()
            .find(|t| matches!(t.kind, TokenKind::Ref(_)))
            .unwrap();
        let TokenKind::Ref(ident) = tok.kind else {
            unreachable!()
        };
        assert_eq!((ident.num, ident.gen), (-1, -1));
        assert!(tok.warning.is_some());
    }

    #[test]
    fn integers_not_followed_by_keyword_are_released() {
        let kinds = kinds(b"[1 2]");
        assert_eq!(
            kinds,
            vec![
                TokenKind::ArrayStart,
                TokenKind::Integer(1),
                TokenKind::Space,
                TokenKind::Integer(2),
                TokenKind::ArrayEnd,
            ]
        );
    }

    #[test]
    fn literal_string_escapes() {
        let toks = tokens(b"(Hi\\nWo\\162ld \\(ok\\))");
        let TokenKind::Str(bytes) = &toks[0].kind else {
            panic!("expected string")
        };
        assert_eq!(bytes, b"Hi\nWorld (ok)");
    }

    #[test]
    fn literal_string_nested_and_octal_lengths() {
        let toks = tokens(b"(a(b)c \\7 \\53)");
        let TokenKind::Str(bytes) = &toks[0].kind else {
            panic!("expected string")
        };
        assert_eq!(bytes, b"a(b)c \x07 \x2B");
    }

    #[test]
    fn unterminated_string_warns_but_still_yields() {
        let toks = tokens(b"(never closed");
        assert_eq!(toks.len(), 1);
        assert!(matches!(toks[0].kind, TokenKind::Str(_)));
        assert_eq!(
            toks[0].warning.as_ref().unwrap().code,
            "pdf:tokenizer:unexpected_eof:string"
        );
    }

    #[test]
    fn hex_string_pads_odd_digit() {
        let toks = tokens(b"<48 65 6C6C6F2>");
        let TokenKind::HexStr(bytes) = &toks[0].kind else {
            panic!("expected hexstring")
        };
        assert_eq!(bytes, b"Hello ");
        assert!(toks[0].warning.is_none());
    }

    #[test]
    fn name_hex_unescape() {
        let toks = tokens(b"/A#42C");
        assert_eq!(toks[0].kind, TokenKind::Name("ABC".into()));
    }

    #[test]
    fn stream_body_excludes_surrounding_eols() {
        let data = b"stream\r\nBODY\nendstream\n";
        let toks = tokens(data);
        let TokenKind::Stream { body } = toks[0].kind else {
            panic!("expected stream")
        };
        assert_eq!(body.start, 8);
        assert_eq!(body.end, 12);
        assert!(toks[0].warning.is_none());
    }

    #[test]
    fn stream_body_tolerates_lone_cr_before_endstream() {
        let data = b"stream\nBODY\rendstream\n";
        let toks = tokens(data);
        let TokenKind::Stream { body } = toks[0].kind else {
            panic!("expected stream")
        };
        assert_eq!(&data[body.start as usize..body.end as usize], b"BODY");
    }

    #[test]
    fn stream_without_endstream_warns_at_eof() {
        let toks = tokens(b"stream\nBODY");
        assert_eq!(
            toks[0].warning.as_ref().unwrap().code,
            "pdf:tokenizer:unexpected_eof:stream"
        );
    }

    #[test]
    fn xref_section_with_two_subsections() {
        let data = b"xref\n0 2\n0000000000 65535 f \n0000000015 00000 n \n4 1\n0000000099 00001 n \ntrailer";
        let toks = tokens(data);
        let TokenKind::Xref(table) = &toks[0].kind else {
            panic!("expected xref, got {:?}", toks[0].kind)
        };
        assert_eq!(table.subsections.len(), 2);
        assert_eq!(table.start_num(), 0);
        assert_eq!(table.entries.len(), 3);
        assert!(table.entries[0].free);
        assert!(!table.entries[1].free);
        assert_eq!(table.entries[1].field1, 15);
        assert_eq!(table.entries[2].field1, 99);
        assert_eq!(table.entries[2].field2, 1);
        assert!(matches!(toks[1].kind, TokenKind::Trailer));
    }

    #[test]
    fn startxref_and_eof_marker() {
        let toks = tokens(b"startxref\n1234\n%%EOF\n");
        let TokenKind::Eof { startxref } = toks[0].kind else {
            panic!("expected eof token")
        };
        assert_eq!(startxref, Some(1234));
        assert!(toks[0].warning.is_none());
    }

    #[test]
    fn startxref_with_wrong_marker_warns() {
        let toks = tokens(b"startxref\n1234\nnot-eof\n");
        let tok = &toks[0];
        assert!(matches!(tok.kind, TokenKind::Eof { startxref: Some(1234) }));
        assert_eq!(
            tok.warning.as_ref().unwrap().code,
            "pdf:tokenizer:invalid_token:eof"
        );
    }

    #[test]
    fn bad_number_becomes_zero_with_warning() {
        let toks = tokens(b"1.2.3 +");
        let TokenKind::Real(v) = toks[0].kind else {
            panic!("expected real")
        };
        assert_eq!(v, 0.0);
        assert_eq!(
            toks[0].warning.as_ref().unwrap().code,
            "pdf:tokenizer:invalid_token:real"
        );
        let plus = toks
            .iter()
            .find(|t| matches!(t.kind, TokenKind::Integer(0)))
            .expect("lone + becomes integer 0");
        assert_eq!(
            plus.warning.as_ref().unwrap().code,
            "pdf:tokenizer:invalid_token:integer"
        );
    }

    #[test]
    fn unknown_keyword_is_an_operator() {
        let kinds = kinds(b"BT ET");
        assert_eq!(
            kinds,
            vec![
                TokenKind::Op("BT".into()),
                TokenKind::Space,
                TokenKind::Op("ET".into()),
            ]
        );
    }

    #[test]
    fn comment_strips_line_break() {
        let toks = tokens(b"%hello\n42 ");
        assert_eq!(toks[0].kind, TokenKind::Comment("hello".into()));
        assert!(toks[0].warning.is_none());
        let toks = tokens(b"%tail");
        assert_eq!(
            toks[0].warning.as_ref().unwrap().code,
            "pdf:tokenizer:unexpected_eof:comment"
        );
    }
}
