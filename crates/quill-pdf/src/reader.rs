use std::cell::RefCell;
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;

use anyhow::{Context, Result};

use crate::chars::latin1;

/// Rollback margin the windowed file reader always keeps behind the cursor,
/// so short non-consuming lookahead never falls off the window.
pub const ROLLBACK_BYTES: usize = 1024;

/// Default rolling window for file-backed reading.
pub const DEFAULT_WINDOW_BYTES: usize = 128 * 1024 * 1024;

/// Cursor-based byte source. All reads are blocking; the engine is
/// single-threaded and owns the reader exclusively for the duration of a
/// token stream.
pub trait SequentialReader {
    fn len(&self) -> u64;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn offset(&self) -> u64;

    fn eof(&self) -> bool {
        self.offset() >= self.len()
    }

    /// Byte at the cursor, or `None` at end of input. `consume` advances.
    fn read_byte(&mut self, consume: bool) -> Result<Option<u8>>;

    /// Up to `len` bytes from the cursor; shorter at end of input.
    fn read_array(&mut self, len: usize, consume: bool) -> Result<Vec<u8>>;

    fn consume(&mut self, len: usize) -> Result<()>;

    fn read_char(&mut self, consume: bool) -> Result<Option<char>> {
        Ok(self.read_byte(consume)?.map(|b| b as char))
    }

    /// Latin-1 view of the next `len` bytes.
    fn read_string(&mut self, len: usize, consume: bool) -> Result<String> {
        Ok(latin1(&self.read_array(len, consume)?))
    }

    fn read_array_while<F: Fn(u8) -> bool>(&mut self, pred: F) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        while let Some(b) = self.read_byte(false)? {
            if !pred(b) {
                break;
            }
            out.push(b);
            self.consume(1)?;
        }
        Ok(out)
    }

    fn read_string_while<F: Fn(u8) -> bool>(&mut self, pred: F) -> Result<String> {
        Ok(latin1(&self.read_array_while(pred)?))
    }

    /// Reads until a byte matching `terminator` (or end of input). The
    /// terminator byte itself is consumed only when `consume_terminator`.
    fn read_array_until<F: Fn(u8) -> bool>(
        &mut self,
        terminator: F,
        consume_terminator: bool,
    ) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        while let Some(b) = self.read_byte(false)? {
            if terminator(b) {
                if consume_terminator {
                    self.consume(1)?;
                }
                break;
            }
            out.push(b);
            self.consume(1)?;
        }
        Ok(out)
    }

    fn read_string_until<F: Fn(u8) -> bool>(
        &mut self,
        terminator: F,
        consume_terminator: bool,
    ) -> Result<String> {
        Ok(latin1(&self.read_array_until(terminator, consume_terminator)?))
    }
}

impl<R: SequentialReader + ?Sized> SequentialReader for &mut R {
    fn len(&self) -> u64 {
        (**self).len()
    }

    fn offset(&self) -> u64 {
        (**self).offset()
    }

    fn read_byte(&mut self, consume: bool) -> Result<Option<u8>> {
        (**self).read_byte(consume)
    }

    fn read_array(&mut self, len: usize, consume: bool) -> Result<Vec<u8>> {
        (**self).read_array(len, consume)
    }

    fn consume(&mut self, len: usize) -> Result<()> {
        (**self).consume(len)
    }
}

/// Random-access byte source. No cursor; reads are idempotent.
pub trait OffsetReader {
    /// Bytes in `[start, end)`, clamped to the source length.
    fn read_range(&self, start: u64, end: u64) -> Result<Vec<u8>>;
}

/// In-memory reader; implements both capabilities.
#[derive(Debug, Clone)]
pub struct MemoryReader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> MemoryReader<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }
}

impl SequentialReader for MemoryReader<'_> {
    fn len(&self) -> u64 {
        self.bytes.len() as u64
    }

    fn offset(&self) -> u64 {
        self.pos as u64
    }

    fn read_byte(&mut self, consume: bool) -> Result<Option<u8>> {
        let b = self.bytes.get(self.pos).copied();
        if consume && b.is_some() {
            self.pos += 1;
        }
        Ok(b)
    }

    fn read_array(&mut self, len: usize, consume: bool) -> Result<Vec<u8>> {
        let end = self.pos.saturating_add(len).min(self.bytes.len());
        let out = self.bytes[self.pos..end].to_vec();
        if consume {
            self.pos = end;
        }
        Ok(out)
    }

    fn consume(&mut self, len: usize) -> Result<()> {
        self.pos = self.pos.saturating_add(len).min(self.bytes.len());
        Ok(())
    }
}

impl OffsetReader for MemoryReader<'_> {
    fn read_range(&self, start: u64, end: u64) -> Result<Vec<u8>> {
        let len = self.bytes.len() as u64;
        let start = start.min(len) as usize;
        let end = end.min(len) as usize;
        if start >= end {
            return Ok(Vec::new());
        }
        Ok(self.bytes[start..end].to_vec())
    }
}

/// Chunk-buffered sequential reader over a file. Keeps a rolling window
/// with at least [`ROLLBACK_BYTES`] behind the cursor so the tokenizer's
/// short lookahead never needs a backward seek it cannot satisfy.
pub struct FileReader {
    file: File,
    file_len: u64,
    window: Vec<u8>,
    window_start: u64,
    window_size: usize,
    pos: u64,
}

impl FileReader {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::with_window(path, DEFAULT_WINDOW_BYTES)
    }

    pub fn with_window(path: impl AsRef<Path>, window_size: usize) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).with_context(|| format!("open {}", path.display()))?;
        Self::from_file(file, window_size)
    }

    pub fn from_file(file: File, window_size: usize) -> Result<Self> {
        let file_len = file.metadata().context("stat input file")?.len();
        Ok(Self {
            file,
            file_len,
            window: Vec::new(),
            window_start: 0,
            window_size: window_size.max(ROLLBACK_BYTES * 2),
            pos: 0,
        })
    }

    /// Makes `[pos, pos+len)` addressable in the window (clamped to EOF).
    fn ensure(&mut self, len: usize) -> Result<()> {
        let want_end = self.pos.saturating_add(len as u64).min(self.file_len);
        let have = self.pos >= self.window_start
            && want_end <= self.window_start + self.window.len() as u64;
        if have {
            return Ok(());
        }
        let new_start = self.pos.saturating_sub(ROLLBACK_BYTES as u64);
        let max_read = (self.file_len - new_start).min(self.window_size as u64) as usize;
        let mut buf = vec![0u8; max_read];
        self.file
            .seek(SeekFrom::Start(new_start))
            .context("seek window")?;
        self.file.read_exact(&mut buf).context("fill window")?;
        self.window = buf;
        self.window_start = new_start;
        Ok(())
    }

    fn window_byte(&self, pos: u64) -> Option<u8> {
        if pos < self.window_start {
            return None;
        }
        self.window.get((pos - self.window_start) as usize).copied()
    }
}

impl SequentialReader for FileReader {
    fn len(&self) -> u64 {
        self.file_len
    }

    fn offset(&self) -> u64 {
        self.pos
    }

    fn read_byte(&mut self, consume: bool) -> Result<Option<u8>> {
        if self.pos >= self.file_len {
            return Ok(None);
        }
        self.ensure(1)?;
        let b = self.window_byte(self.pos);
        if consume && b.is_some() {
            self.pos += 1;
        }
        Ok(b)
    }

    fn read_array(&mut self, len: usize, consume: bool) -> Result<Vec<u8>> {
        let avail = (self.file_len - self.pos.min(self.file_len)) as usize;
        let take = len.min(avail);
        if take == 0 {
            return Ok(Vec::new());
        }
        // A request larger than the window is read through in window-sized
        // pieces; rollback past the request start is then not guaranteed.
        let mut out = Vec::with_capacity(take);
        let saved = self.pos;
        while out.len() < take {
            let chunk = (take - out.len()).min(self.window_size - ROLLBACK_BYTES);
            self.ensure(chunk)?;
            let from = (self.pos - self.window_start) as usize;
            let to = (from + chunk).min(self.window.len());
            out.extend_from_slice(&self.window[from..to]);
            self.pos += (to - from) as u64;
            if to == from {
                break;
            }
        }
        if !consume {
            self.pos = saved;
        }
        Ok(out)
    }

    fn consume(&mut self, len: usize) -> Result<()> {
        self.pos = self.pos.saturating_add(len as u64).min(self.file_len);
        Ok(())
    }
}

/// Random-access companion to [`FileReader`]; every read seeks first, so a
/// shared file description is safe.
pub struct FileOffsetReader {
    file: RefCell<File>,
    file_len: u64,
}

impl FileOffsetReader {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).with_context(|| format!("open {}", path.display()))?;
        Self::from_file(file)
    }

    pub fn from_file(file: File) -> Result<Self> {
        let file_len = file.metadata().context("stat input file")?.len();
        Ok(Self {
            file: RefCell::new(file),
            file_len,
        })
    }
}

impl OffsetReader for FileOffsetReader {
    fn read_range(&self, start: u64, end: u64) -> Result<Vec<u8>> {
        let start = start.min(self.file_len);
        let end = end.min(self.file_len);
        if start >= end {
            return Ok(Vec::new());
        }
        let mut file = self.file.borrow_mut();
        file.seek(SeekFrom::Start(start)).context("seek range")?;
        let mut buf = vec![0u8; (end - start) as usize];
        file.read_exact(&mut buf).context("read range")?;
        Ok(buf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn memory_reader_peek_does_not_advance() {
        let data = b"abc";
        let mut r = MemoryReader::new(data);
        assert_eq!(r.read_byte(false).unwrap(), Some(b'a'));
        assert_eq!(r.offset(), 0);
        assert_eq!(r.read_byte(true).unwrap(), Some(b'a'));
        assert_eq!(r.offset(), 1);
        assert_eq!(r.read_string(2, true).unwrap(), "bc");
        assert!(r.eof());
        assert_eq!(r.read_byte(true).unwrap(), None);
    }

    #[test]
    fn read_until_stops_before_terminator() {
        let data = b"abc>def";
        let mut r = MemoryReader::new(data);
        let got = r.read_array_until(|b| b == b'>', false).unwrap();
        assert_eq!(got, b"abc");
        assert_eq!(r.read_byte(false).unwrap(), Some(b'>'));
        let mut r = MemoryReader::new(data);
        let got = r.read_string_until(|b| b == b'>', true).unwrap();
        assert_eq!(got, "abc");
        assert_eq!(r.read_byte(false).unwrap(), Some(b'd'));
    }

    #[test]
    fn file_reader_windows_and_rolls_back() {
        let mut tmp = std::env::temp_dir();
        tmp.push(format!("quill-reader-{}.bin", std::process::id()));
        let payload: Vec<u8> = (0..200_000u32).map(|i| (i % 251) as u8).collect();
        {
            let mut f = File::create(&tmp).unwrap();
            f.write_all(&payload).unwrap();
        }
        // A window much smaller than the file forces refills.
        let mut r = FileReader::with_window(&tmp, 8 * 1024).unwrap();
        assert_eq!(r.len(), payload.len() as u64);
        let head = r.read_array(16, true).unwrap();
        assert_eq!(head, &payload[..16]);
        r.consume(100_000).unwrap();
        let mid = r.read_array(32, false).unwrap();
        assert_eq!(mid, &payload[100_016..100_048]);
        // Non-consuming read above did not move the cursor.
        assert_eq!(r.offset(), 100_016);
        std::fs::remove_file(&tmp).ok();
    }

    #[test]
    fn file_offset_reader_clamps() {
        let mut tmp = std::env::temp_dir();
        tmp.push(format!("quill-offset-{}.bin", std::process::id()));
        std::fs::write(&tmp, b"0123456789").unwrap();
        let r = FileOffsetReader::open(&tmp).unwrap();
        assert_eq!(r.read_range(2, 6).unwrap(), b"2345");
        assert_eq!(r.read_range(8, 100).unwrap(), b"89");
        assert!(r.read_range(20, 30).unwrap().is_empty());
        std::fs::remove_file(&tmp).ok();
    }
}
