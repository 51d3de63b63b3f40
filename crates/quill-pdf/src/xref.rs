use crate::span::Span;
use crate::warn::Warning;

/// One `start count` header inside a cross-reference section.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct XrefSubsection {
    pub start: i64,
    pub count: i64,
}

/// Entry of a classical 20-byte xref table line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct XrefTableEntry {
    pub field1: u64,
    pub field2: u64,
    /// Third column: `f` marks a free entry, `n` an in-use one.
    pub free: bool,
}

/// Payload of a classical `xref` section token: every subsection header plus
/// the flattened entry list in file order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct XrefTable {
    pub subsections: Vec<XrefSubsection>,
    pub entries: Vec<XrefTableEntry>,
}

impl XrefTable {
    /// First subsection start, the classical single-subsection shape.
    pub fn start_num(&self) -> i64 {
        self.subsections.first().map(|s| s.start).unwrap_or(0)
    }
}

/// Decoded record of an xref stream (`/Type /XRef`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum XrefStreamEntry {
    Free { next_free: u64, reuse_gen: u64 },
    InUse { offset: u64, gen: u64 },
    Compressed { stream_num: u64, index_in_stream: u64 },
    Unknown { kind: u64, fields: Vec<Option<u64>> },
}

/// Decoded xref stream: column widths, subsection headers, and one entry per
/// record in subsection order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct XrefData {
    pub widths: Vec<u8>,
    pub subsections: Vec<XrefSubsection>,
    pub entries: Vec<XrefStreamEntry>,
}

/// Decodes the packed big-endian records of an xref stream per its `W`
/// widths and `Index` subsections. Zero-width columns read as absent; an
/// absent type column defaults to 1 (in-use).
pub fn decode_xref_stream(
    widths: &[i64],
    subsections: &[XrefSubsection],
    data: &[u8],
    span: Span,
) -> (XrefData, Vec<Warning>) {
    let mut warnings = Vec::new();
    let mut out = XrefData {
        widths: Vec::new(),
        subsections: subsections.to_vec(),
        entries: Vec::new(),
    };
    for &w in widths {
        if !(0..=4).contains(&w) {
            warnings.push(
                Warning::new(
                    "pdf:parser:invalid_stream:xref:widths",
                    format!("xref stream column width {w} outside 0..=4"),
                )
                .with_span(span),
            );
            return (out, warnings);
        }
        out.widths.push(w as u8);
    }
    let record_len: usize = out.widths.iter().map(|&w| w as usize).sum();
    if record_len == 0 {
        warnings.push(
            Warning::new(
                "pdf:parser:invalid_stream:xref:widths",
                "xref stream declares zero-length records",
            )
            .with_span(span),
        );
        return (out, warnings);
    }
    let total: i64 = subsections.iter().map(|s| s.count.max(0)).sum();
    let mut pos = 0usize;
    for _ in 0..total {
        if pos + record_len > data.len() {
            warnings.push(
                Warning::new(
                    "pdf:parser:invalid_stream:xref:truncated",
                    format!(
                        "xref stream ends after {} of {} records",
                        out.entries.len(),
                        total
                    ),
                )
                .with_span(span),
            );
            break;
        }
        let mut fields: Vec<Option<u64>> = Vec::with_capacity(out.widths.len());
        for &w in &out.widths {
            if w == 0 {
                fields.push(None);
            } else {
                let mut v = 0u64;
                for _ in 0..w {
                    v = (v << 8) | data[pos] as u64;
                    pos += 1;
                }
                fields.push(Some(v));
            }
        }
        let kind = fields.first().copied().flatten().unwrap_or(1);
        let f1 = fields.get(1).copied().flatten().unwrap_or(0);
        let f2 = fields.get(2).copied().flatten().unwrap_or(0);
        out.entries.push(match kind {
            0 => XrefStreamEntry::Free {
                next_free: f1,
                reuse_gen: f2,
            },
            1 => XrefStreamEntry::InUse {
                offset: f1,
                gen: f2,
            },
            2 => XrefStreamEntry::Compressed {
                stream_num: f1,
                index_in_stream: f2,
            },
            other => XrefStreamEntry::Unknown {
                kind: other,
                fields,
            },
        });
    }
    (out, warnings)
}
