use std::fs::File;
use std::path::Path;

use anyhow::Context;

use crate::object::ObjStore;
use crate::parser::{self, EngineError, ParseHooks, ParseOptions};
use crate::reader::{
    FileOffsetReader, FileReader, MemoryReader, OffsetReader, SequentialReader,
    DEFAULT_WINDOW_BYTES,
};
use crate::warn::Warning;

/// A parsed document: the populated object store plus everything the
/// parser had to complain about along the way.
#[derive(Debug)]
pub struct Document {
    pub store: ObjStore,
    pub parser_warnings: Vec<Warning>,
}

pub fn load_document_from_bytes(
    bytes: &[u8],
    options: &ParseOptions,
) -> Result<Document, EngineError> {
    let seq = MemoryReader::new(bytes);
    let off = MemoryReader::new(bytes);
    load_document_from_reader(seq, &off, options)
}

pub fn load_document_from_reader<R: SequentialReader, O: OffsetReader + ?Sized>(
    reader: R,
    offsets: &O,
    options: &ParseOptions,
) -> Result<Document, EngineError> {
    let mut hooks = ParseHooks::default();
    let outcome = parser::run(reader, offsets, options, &mut hooks)?;
    Ok(Document {
        store: outcome.store,
        parser_warnings: outcome.warnings,
    })
}

/// Opens `path` once and pairs a windowed sequential reader with an offset
/// reader over a cloned handle. Both handles close on drop, on success and
/// error paths alike.
pub fn load_document_from_file(
    path: impl AsRef<Path>,
    options: &ParseOptions,
) -> Result<Document, EngineError> {
    let path = path.as_ref();
    let file = File::open(path)
        .with_context(|| format!("open {}", path.display()))
        .map_err(EngineError::Io)?;
    let offset_file = file
        .try_clone()
        .context("clone file handle for offset reads")
        .map_err(EngineError::Io)?;
    let seq = FileReader::from_file(file, DEFAULT_WINDOW_BYTES).map_err(EngineError::Io)?;
    let off = FileOffsetReader::from_file(offset_file).map_err(EngineError::Io)?;
    load_document_from_reader(seq, &off, options)
}
