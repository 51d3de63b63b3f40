use tracing::{debug, warn};

use crate::object::{ObjId, ObjKind, ObjStore};
use crate::parser::sub_parse_into;
use crate::span::Span;
use crate::token::ObjIdent;
use crate::warn::Warning;

/// Outcome of expanding one `/Type /ObjStm` payload.
#[derive(Debug, Default)]
pub struct ObjStmExpansion {
    /// Indirects materialized from the packed objects, in header order.
    pub indirects: Vec<ObjId>,
    pub warnings: Vec<Warning>,
}

/// Expands a decoded object-stream payload. The prefix `[0..first)` holds
/// `n` whitespace-separated `(object number, relative offset)` pairs; each
/// pair becomes an `Indirect {num, gen: 0}` whose body is sub-parsed from
/// its payload slice. The new Indirects are collected under a wrapping
/// Array attached as the stream's direct child.
pub fn expand_object_stream(
    store: &mut ObjStore,
    stream_id: ObjId,
    payload: &[u8],
    n: usize,
    first: usize,
) -> ObjStmExpansion {
    let mut out = ObjStmExpansion::default();
    let span = store.get(stream_id).span;
    if first > payload.len() {
        out.warnings.push(
            Warning::new(
                "pdf:parser:invalid_stream:objstm:first",
                format!(
                    "object stream First={} beyond decoded payload of {} bytes",
                    first,
                    payload.len()
                ),
            )
            .with_span(span),
        );
        return out;
    }
    let header = parse_header_ints(&payload[..first], n * 2);
    let pair_count = header.len() / 2;
    if pair_count < n {
        out.warnings.push(
            Warning::new(
                "pdf:parser:invalid_stream:objstm:header",
                format!(
                    "object stream declares N={n} but header holds {pair_count} pairs"
                ),
            )
            .with_span(span),
        );
    }
    let wrapper = store.create(ObjKind::Array(Vec::new()), span);
    store.set_parent(wrapper, stream_id);
    if let ObjKind::Stream(s) = &mut store.get_mut(stream_id).kind {
        s.direct = Some(wrapper);
    }
    for i in 0..pair_count.min(n) {
        let num = header[i * 2];
        let rel = header[i * 2 + 1] as usize;
        let start = first.saturating_add(rel);
        if start >= payload.len() {
            out.warnings.push(
                Warning::new(
                    "pdf:parser:invalid_stream:objstm:offset",
                    format!("packed object {num} starts beyond the payload"),
                )
                .with_span(span),
            );
            continue;
        }
        let end = if i + 1 < pair_count.min(n) {
            let next = first.saturating_add(header[i * 2 + 3] as usize);
            if next > start && next <= payload.len() {
                next
            } else {
                payload.len()
            }
        } else {
            payload.len()
        };
        let ident = ObjIdent::new(num as i64, 0);
        let ind = store.create(
            ObjKind::Indirect {
                ident,
                direct: None,
            },
            Span::new(start as u64, end as u64),
        );
        store.register_indirect(ident, ind);
        if let ObjKind::Array(children) = &mut store.get_mut(wrapper).kind {
            children.push(ind);
        }
        store.set_parent(ind, wrapper);
        let ws = sub_parse_into(store, ind, &payload[start..end]);
        out.warnings.extend(ws);
        out.indirects.push(ind);
    }
    if out.indirects.is_empty() {
        warn!(
            domain = "pdf.object_stream",
            kind = "objstm_empty",
            "Object stream expansion produced no objects"
        );
    } else {
        debug!(
            domain = "pdf.object_stream",
            kind = "objstm_expanded",
            count = out.indirects.len(),
            "Expanded object stream"
        );
    }
    out
}

fn parse_header_ints(bytes: &[u8], max: usize) -> Vec<u64> {
    let mut out = Vec::new();
    let mut i = 0usize;
    while i < bytes.len() && out.len() < max {
        while i < bytes.len() && bytes[i].is_ascii_whitespace() {
            i += 1;
        }
        let start = i;
        while i < bytes.len() && bytes[i].is_ascii_digit() {
            i += 1;
        }
        if start == i {
            break;
        }
        match std::str::from_utf8(&bytes[start..i])
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
        {
            Some(v) => out.push(v),
            None => break,
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::StreamData;

    fn stream_fixture(store: &mut ObjStore) -> ObjId {
        store.create(ObjKind::Stream(StreamData::default()), Span::at(0))
    }

    #[test]
    fn expands_pairs_into_registered_indirects() {
        let mut store = ObjStore::new();
        let stream = stream_fixture(&mut store);
        let payload = b"3 0 4 10\n<< /A 1 >><< /B 2 >>";
        let out = expand_object_stream(&mut store, stream, payload, 2, 9);
        assert!(out.warnings.is_empty(), "{:?}", out.warnings);
        assert_eq!(out.indirects.len(), 2);
        let a = store.lookup_indirect(&ObjIdent::new(3, 0)).unwrap();
        let b = store.lookup_indirect(&ObjIdent::new(4, 0)).unwrap();
        assert_eq!((a, b), (out.indirects[0], out.indirects[1]));
        let ObjKind::Indirect {
            direct: Some(da), ..
        } = store.kind(a)
        else {
            panic!("expected populated indirect")
        };
        let ObjKind::Dictionary(d) = store.kind(*da) else {
            panic!("expected dictionary")
        };
        assert_eq!(store.int_value(d.get("A").unwrap()), Some(1));
        // The wrapper array under the stream holds both.
        let ObjKind::Stream(s) = store.kind(stream) else {
            panic!("stream")
        };
        let ObjKind::Array(items) = store.kind(s.direct.unwrap()) else {
            panic!("wrapper array")
        };
        assert_eq!(items.len(), 2);
    }

    #[test]
    fn produced_count_matches_header_pairs() {
        let mut store = ObjStore::new();
        let stream = stream_fixture(&mut store);
        let payload = b"1 0 2 5 3 10\nnull true 42";
        let out = expand_object_stream(&mut store, stream, payload, 3, 13);
        assert_eq!(out.indirects.len(), 3);
        for (ident_num, ind) in [(1i64, 0), (2, 1), (3, 2)].map(|(n, i)| (n, out.indirects[i])) {
            let ObjKind::Indirect { ident, direct } = store.kind(ind) else {
                panic!("indirect")
            };
            assert_eq!(ident.num, ident_num);
            assert_eq!(ident.gen, 0);
            assert!(direct.is_some());
        }
    }

    #[test]
    fn short_header_warns_and_expands_available_pairs() {
        let mut store = ObjStore::new();
        let stream = stream_fixture(&mut store);
        let payload = b"7 0\nnull";
        let out = expand_object_stream(&mut store, stream, payload, 2, 4);
        assert_eq!(out.indirects.len(), 1);
        assert!(out
            .warnings
            .iter()
            .any(|w| w.code == "pdf:parser:invalid_stream:objstm:header"));
    }

    #[test]
    fn first_beyond_payload_is_rejected() {
        let mut store = ObjStore::new();
        let stream = stream_fixture(&mut store);
        let out = expand_object_stream(&mut store, stream, b"abc", 1, 64);
        assert!(out.indirects.is_empty());
        assert_eq!(out.warnings[0].code, "pdf:parser:invalid_stream:objstm:first");
    }
}
