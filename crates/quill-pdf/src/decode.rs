use std::io::Read;

use thiserror::Error;
use tracing::warn;

/// Predictor parameters from a `/DecodeParms` dictionary.
#[derive(Debug, Clone, Copy)]
pub struct PredictorParms {
    pub predictor: u32,
    pub colors: u32,
    pub bits_per_component: u32,
    pub columns: u32,
}

impl Default for PredictorParms {
    fn default() -> Self {
        Self {
            predictor: 1,
            colors: 1,
            bits_per_component: 8,
            columns: 1,
        }
    }
}

/// One step of a stream's filter chain.
#[derive(Debug, Clone)]
pub struct FilterSpec {
    pub name: String,
    pub parms: Option<PredictorParms>,
}

impl FilterSpec {
    pub fn plain(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            parms: None,
        }
    }
}

#[derive(Debug, Error)]
pub enum FilterError {
    #[error("pdf:decoder:not_implemented:stream_filter:{filter}")]
    Unsupported { filter: String },
    #[error("pdf:decoder:error:stream_filter:{filter}: {reason}")]
    Failed { filter: String, reason: String },
}

const MAX_PREDICTOR_COLUMNS: u32 = 100_000;
const MAX_PREDICTOR_COLORS: u32 = 64;

/// Runs `data` through the ordered filter chain. Output beyond `max_out`
/// is truncated with a structured log warning rather than an error.
pub fn decode_chain(
    data: &[u8],
    filters: &[FilterSpec],
    max_out: usize,
) -> Result<Vec<u8>, FilterError> {
    let mut data = data.to_vec();
    for spec in filters {
        data = decode_filter(&data, spec, max_out)?;
    }
    Ok(data)
}

fn decode_filter(data: &[u8], spec: &FilterSpec, max_out: usize) -> Result<Vec<u8>, FilterError> {
    let mut out = match spec.name.as_str() {
        "FlateDecode" | "Fl" => decode_flate(data, max_out)?,
        "ASCIIHexDecode" | "AHx" => decode_ascii_hex(data),
        "ASCII85Decode" | "A85" => {
            decode_ascii85(data).map_err(|reason| FilterError::Failed {
                filter: spec.name.clone(),
                reason,
            })?
        }
        "RunLengthDecode" | "RL" => decode_run_length(data),
        "LZWDecode" | "LZW" => decode_lzw(data)?,
        other => {
            return Err(FilterError::Unsupported {
                filter: other.to_string(),
            })
        }
    };
    if let Some(parms) = spec.parms {
        if parms.predictor > 1 {
            out = apply_predictor(&out, parms).map_err(|reason| FilterError::Failed {
                filter: spec.name.clone(),
                reason,
            })?;
        }
    }
    if out.len() > max_out {
        warn!(
            domain = "pdf.decode",
            kind = "output_truncated",
            filter = spec.name.as_str(),
            max_out = max_out,
            "Decoded stream truncated at output budget"
        );
        out.truncate(max_out);
    }
    Ok(out)
}

/// Flate: zlib first, raw deflate as a recovery fallback for streams whose
/// zlib header was stripped or mangled.
fn decode_flate(data: &[u8], max_out: usize) -> Result<Vec<u8>, FilterError> {
    let primary = read_capped(flate2::read::ZlibDecoder::new(data), max_out);
    match primary {
        Ok(out) => Ok(out),
        Err(zlib_err) => {
            match read_capped(flate2::read::DeflateDecoder::new(data), max_out) {
                Ok(out) => {
                    warn!(
                        domain = "pdf.decode",
                        kind = "flate_recovery",
                        "Recovered Flate stream using raw deflate fallback"
                    );
                    Ok(out)
                }
                Err(deflate_err) => Err(FilterError::Failed {
                    filter: "FlateDecode".into(),
                    reason: format!("zlib: {zlib_err}; deflate: {deflate_err}"),
                }),
            }
        }
    }
}

fn read_capped<R: Read>(mut reader: R, max_out: usize) -> std::io::Result<Vec<u8>> {
    let mut out = Vec::new();
    let mut buf = [0u8; 64 * 1024];
    loop {
        let n = reader.read(&mut buf)?;
        if n == 0 {
            break;
        }
        out.extend_from_slice(&buf[..n]);
        if out.len() > max_out {
            out.truncate(max_out);
            break;
        }
    }
    Ok(out)
}

fn decode_ascii_hex(data: &[u8]) -> Vec<u8> {
    let end = memchr::memchr(b'>', data).unwrap_or(data.len());
    let mut digits = Vec::new();
    for &b in &data[..end] {
        if b.is_ascii_hexdigit() {
            digits.push(b);
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
    out
}

fn hex_val(b: u8) -> u8 {
    match b {
        b'0'..=b'9' => b - b'0',
        b'a'..=b'f' => 10 + b - b'a',
        _ => 10 + b - b'A',
    }
}

fn decode_ascii85(data: &[u8]) -> Result<Vec<u8>, String> {
    let end = memchr::memchr(b'~', data).unwrap_or(data.len());
    let mut out = Vec::new();
    let mut group = [0u8; 5];
    let mut filled = 0usize;
    for &b in &data[..end] {
        if b.is_ascii_whitespace() {
            continue;
        }
        if b == b'z' && filled == 0 {
            out.extend_from_slice(&[0, 0, 0, 0]);
            continue;
        }
        if !(b'!'..=b'u').contains(&b) {
            return Err(format!("invalid ascii85 byte 0x{b:02x}"));
        }
        group[filled] = b - b'!';
        filled += 1;
        if filled == 5 {
            push_ascii85_group(&mut out, &group, 4);
            filled = 0;
        }
    }
    if filled == 1 {
        return Err("dangling single ascii85 digit".into());
    }
    if filled > 1 {
        let produced = filled - 1;
        for slot in group.iter_mut().skip(filled) {
            *slot = 84; // pad with 'u'
        }
        push_ascii85_group(&mut out, &group, produced);
    }
    Ok(out)
}

fn push_ascii85_group(out: &mut Vec<u8>, group: &[u8; 5], take: usize) {
    let mut value = 0u32;
    for &d in group {
        value = value.wrapping_mul(85).wrapping_add(d as u32);
    }
    out.extend_from_slice(&value.to_be_bytes()[..take]);
}

fn decode_run_length(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::new();
    let mut i = 0usize;
    while i < data.len() {
        let l = data[i] as usize;
        i += 1;
        match l {
            0..=127 => {
                let end = (i + l + 1).min(data.len());
                out.extend_from_slice(&data[i..end]);
                i = end;
            }
            128 => break, // EOD
            _ => {
                if i >= data.len() {
                    break;
                }
                out.extend(std::iter::repeat(data[i]).take(257 - l));
                i += 1;
            }
        }
    }
    out
}

/// LZW: MSB-first 8-bit symbols, delegated to weezl.
fn decode_lzw(data: &[u8]) -> Result<Vec<u8>, FilterError> {
    weezl::decode::Decoder::new(weezl::BitOrder::Msb, 8)
        .decode(data)
        .map_err(|err| FilterError::Failed {
            filter: "LZWDecode".into(),
            reason: err.to_string(),
        })
}

fn apply_predictor(data: &[u8], parms: PredictorParms) -> Result<Vec<u8>, String> {
    if parms.columns == 0 || parms.colors == 0 {
        return Ok(data.to_vec());
    }
    if parms.columns > MAX_PREDICTOR_COLUMNS || parms.colors > MAX_PREDICTOR_COLORS {
        return Err("predictor parameters out of range".into());
    }
    if parms.bits_per_component != 8 {
        return Ok(data.to_vec());
    }
    let bpp = parms.colors as usize;
    let row_len = parms.columns as usize * bpp;
    if parms.predictor == 2 {
        Ok(apply_tiff_predictor(data, bpp, row_len))
    } else if (10..=15).contains(&parms.predictor) {
        Ok(apply_png_predictor(data, bpp, row_len))
    } else {
        Ok(data.to_vec())
    }
}

fn apply_tiff_predictor(data: &[u8], bpp: usize, row_len: usize) -> Vec<u8> {
    let mut out = Vec::with_capacity(data.len());
    for chunk in data.chunks(row_len) {
        let mut row = chunk.to_vec();
        for i in bpp..row.len() {
            row[i] = row[i].wrapping_add(row[i - bpp]);
        }
        out.extend_from_slice(&row);
    }
    out
}

fn apply_png_predictor(data: &[u8], bpp: usize, row_len: usize) -> Vec<u8> {
    let mut out = Vec::new();
    let mut prev_row = vec![0u8; row_len];
    let mut i = 0usize;
    while i < data.len() {
        let filter = data[i];
        i += 1;
        if i + row_len > data.len() {
            break;
        }
        let mut row = data[i..i + row_len].to_vec();
        i += row_len;
        match filter {
            0 => {}
            1 => {
                for j in bpp..row_len {
                    row[j] = row[j].wrapping_add(row[j - bpp]);
                }
            }
            2 => {
                for j in 0..row_len {
                    row[j] = row[j].wrapping_add(prev_row[j]);
                }
            }
            3 => {
                for j in 0..row_len {
                    let left = if j >= bpp { row[j - bpp] as u16 } else { 0 };
                    let up = prev_row[j] as u16;
                    row[j] = row[j].wrapping_add(((left + up) / 2) as u8);
                }
            }
            4 => {
                for j in 0..row_len {
                    let left = if j >= bpp { row[j - bpp] as i16 } else { 0 };
                    let up = prev_row[j] as i16;
                    let up_left = if j >= bpp { prev_row[j - bpp] as i16 } else { 0 };
                    let p = left + up - up_left;
                    let (dl, du, dul) = ((p - left).abs(), (p - up).abs(), (p - up_left).abs());
                    let paeth = if dl <= du && dl <= dul {
                        left
                    } else if du <= dul {
                        up
                    } else {
                        up_left
                    };
                    row[j] = row[j].wrapping_add(paeth as u8);
                }
            }
            _ => {}
        }
        out.extend_from_slice(&row);
        prev_row = row;
    }
    out
}
