use once_cell::sync::Lazy;
use regex::Regex;

/// PDF whitespace: NUL, tab, LF, FF, CR, space.
pub fn is_space(b: u8) -> bool {
    matches!(b, 0 | 9 | 10 | 12 | 13 | 32)
}

pub fn is_eol(b: u8) -> bool {
    matches!(b, b'\n' | b'\r')
}

pub fn is_digit(b: u8) -> bool {
    b.is_ascii_digit()
}

/// Characters that may start or continue a numeric token.
pub fn is_number(b: u8) -> bool {
    b.is_ascii_digit() || matches!(b, b'+' | b'-' | b'.')
}

pub fn is_keyword(b: u8) -> bool {
    b.is_ascii_alphabetic()
}

/// Regular characters usable inside a name token: printable ASCII minus
/// the delimiters `%()/[]<>`.
pub fn is_name(b: u8) -> bool {
    (b'!'..=b'~').contains(&b)
        && !matches!(b, b'%' | b'(' | b')' | b'/' | b'[' | b']' | b'<' | b'>')
}

pub fn is_delim(b: u8) -> bool {
    matches!(b, b'(' | b')' | b'<' | b'>' | b'[' | b']' | b'{' | b'}' | b'/' | b'%')
}

pub const DATE_PREFIX: &[u8] = b"D:";
pub const UTF8_BOM: &[u8] = &[0xEF, 0xBB, 0xBF];
pub const UTF16BE_BOM: &[u8] = &[0xFE, 0xFF];

pub const SUPPORTED_VERSIONS: &[&str] = &[
    "1.0", "1.1", "1.2", "1.3", "1.4", "1.5", "1.6", "1.7", "2.0",
];

/// `D:`-stripped PDF date body: YYYY with every later field optional.
pub static DATE_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^(\d{4})(\d{2})?(\d{2})?(\d{2})?(\d{2})?(\d{2})?([+\-Z])?(\d{2})?'?(\d{2})?'?$",
    )
    .expect("date regex")
});

pub static HEADER_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^%PDF-(\d+\.\d+)[\r\n]+").expect("header regex"));

/// PDFDocEncoding, expressed as its deviations from Latin-1. Codes 0x7F,
/// 0x9F and 0xAD are undefined in PDFDocEncoding and map to U+FFFD.
pub fn pdfdoc_char(b: u8) -> char {
    match b {
        0x18 => '\u{02D8}', // breve
        0x19 => '\u{02C7}', // caron
        0x1A => '\u{02C6}', // circumflex
        0x1B => '\u{02D9}', // dot above
        0x1C => '\u{02DD}', // double acute
        0x1D => '\u{02DB}', // ogonek
        0x1E => '\u{02DA}', // ring above
        0x1F => '\u{02DC}', // small tilde
        0x7F => '\u{FFFD}',
        0x80 => '\u{2022}', // bullet
        0x81 => '\u{2020}', // dagger
        0x82 => '\u{2021}', // double dagger
        0x83 => '\u{2026}', // ellipsis
        0x84 => '\u{2014}', // em dash
        0x85 => '\u{2013}', // en dash
        0x86 => '\u{0192}', // florin
        0x87 => '\u{2044}', // fraction slash
        0x88 => '\u{2039}', // single left guillemet
        0x89 => '\u{203A}', // single right guillemet
        0x8A => '\u{2212}', // minus
        0x8B => '\u{2030}', // per mille
        0x8C => '\u{201E}', // low double quote
        0x8D => '\u{201C}',
        0x8E => '\u{201D}',
        0x8F => '\u{2018}',
        0x90 => '\u{2019}',
        0x91 => '\u{201A}', // low single quote
        0x92 => '\u{2122}', // trademark
        0x93 => '\u{FB01}', // fi ligature
        0x94 => '\u{FB02}', // fl ligature
        0x95 => '\u{0141}', // Lslash
        0x96 => '\u{0152}', // OE
        0x97 => '\u{0160}', // Scaron
        0x98 => '\u{0178}', // Ydieresis
        0x99 => '\u{017D}', // Zcaron
        0x9A => '\u{0131}', // dotless i
        0x9B => '\u{0142}', // lslash
        0x9C => '\u{0153}', // oe
        0x9D => '\u{0161}', // scaron
        0x9E => '\u{017E}', // zcaron
        0x9F => '\u{FFFD}',
        0xA0 => '\u{20AC}', // euro
        0xAD => '\u{FFFD}',
        other => other as char,
    }
}

/// Latin-1 view of a byte slice; every byte maps to the same code point.
pub fn latin1(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| b as char).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn name_class_excludes_delimiters() {
        assert!(is_name(b'A'));
        assert!(is_name(b'#'));
        assert!(!is_name(b'/'));
        assert!(!is_name(b'('));
        assert!(!is_name(b' '));
        assert!(!is_name(b'>'));
    }

    #[test]
    fn pdfdoc_deviations_and_identity() {
        assert_eq!(pdfdoc_char(0x80), '\u{2022}');
        assert_eq!(pdfdoc_char(0xA0), '\u{20AC}');
        assert_eq!(pdfdoc_char(0x7F), '\u{FFFD}');
        assert_eq!(pdfdoc_char(b'H'), 'H');
        assert_eq!(pdfdoc_char(0xE9), '\u{00E9}');
    }

    #[test]
    fn date_regex_accepts_partial_dates() {
        assert!(DATE_REGEX.is_match("2024"));
        assert!(DATE_REGEX.is_match("20240102"));
        assert!(DATE_REGEX.is_match("20240102150405+02'00'"));
        assert!(DATE_REGEX.is_match("20240102150405Z"));
        assert!(!DATE_REGEX.is_match("202"));
        assert!(!DATE_REGEX.is_match("hello"));
    }

    #[test]
    fn header_regex_requires_eol() {
        assert!(HEADER_REGEX.is_match("%PDF-1.4\nrest"));
        assert!(HEADER_REGEX.is_match("%PDF-2.0\r\nrest"));
        assert!(!HEADER_REGEX.is_match("%PDF-1.4"));
        assert!(!HEADER_REGEX.is_match("PDF-1.4\n"));
    }
}
