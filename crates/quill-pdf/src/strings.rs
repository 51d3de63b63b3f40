use chrono::{DateTime, FixedOffset, TimeZone};

use crate::chars::{self, DATE_PREFIX, DATE_REGEX, UTF16BE_BOM, UTF8_BOM};
use crate::object::{ObjKind, TextEncoding};

/// Turns raw string-token bytes into the typed object the lexer inserts.
/// Sniff order: `D:` date, UTF-8 BOM, UTF-16BE BOM, hex origin (bytes),
/// PDFDocEncoding text.
pub fn classify_string(bytes: &[u8], from_hex: bool) -> ObjKind {
    if bytes.starts_with(DATE_PREFIX) {
        if let Some(date) = parse_date(&chars::latin1(&bytes[DATE_PREFIX.len()..])) {
            return ObjKind::Date(date);
        }
    }
    if bytes.starts_with(UTF8_BOM) {
        return ObjKind::Text {
            value: String::from_utf8_lossy(&bytes[UTF8_BOM.len()..]).into_owned(),
            encoding: TextEncoding::Utf8,
            from_hex,
        };
    }
    if bytes.starts_with(UTF16BE_BOM) {
        let units: Vec<u16> = bytes[UTF16BE_BOM.len()..]
            .chunks_exact(2)
            .map(|c| u16::from_be_bytes([c[0], c[1]]))
            .collect();
        let value: String = char::decode_utf16(units)
            .map(|r| r.unwrap_or(char::REPLACEMENT_CHARACTER))
            .collect();
        return ObjKind::Text {
            value,
            encoding: TextEncoding::Utf16Be,
            from_hex,
        };
    }
    if from_hex {
        return ObjKind::Bytes(bytes.to_vec());
    }
    ObjKind::Text {
        value: bytes.iter().map(|&b| chars::pdfdoc_char(b)).collect(),
        encoding: TextEncoding::Pdf,
        from_hex,
    }
}

/// Parses the body of a `D:` date string. Missing fields default to
/// month 01, day 01, midnight; timezone `Z` or absent means UTC. Returns
/// `None` when the regex does not match or the fields do not form a real
/// calendar date, in which case the caller falls back to text.
pub fn parse_date(body: &str) -> Option<DateTime<FixedOffset>> {
    let caps = DATE_REGEX.captures(body)?;
    let field = |i: usize| caps.get(i).and_then(|m| m.as_str().parse::<u32>().ok());
    let year: i32 = caps.get(1)?.as_str().parse().ok()?;
    let month = field(2).unwrap_or(1);
    let day = field(3).unwrap_or(1);
    let hour = field(4).unwrap_or(0);
    let minute = field(5).unwrap_or(0);
    let second = field(6).unwrap_or(0);
    let tz_hour = field(8).unwrap_or(0) as i32;
    let tz_minute = field(9).unwrap_or(0) as i32;
    let offset_secs = match caps.get(7).map(|m| m.as_str()) {
        Some("+") => tz_hour * 3600 + tz_minute * 60,
        Some("-") => -(tz_hour * 3600 + tz_minute * 60),
        _ => 0,
    };
    let offset = FixedOffset::east_opt(offset_secs)?;
    offset
        .with_ymd_and_hms(year, month, day, hour, minute, second)
        .single()
}
