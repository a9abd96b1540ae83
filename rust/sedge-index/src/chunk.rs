//! On-disk chunk files: sorted runs of postings records.
//!
//! A chunk is a raw little-endian sequence of records, each encoded as
//! `term: u64`, `entry_count: u32`, then `entry_count` pairs of
//! `(doc: u64, count: u64)`. End-of-file is the only terminator; access is
//! purely sequential, so no header, index or footer is needed. The layout
//! only has to support sorted streaming reads for the merge pass.
//!
//! [`ChunkWriter`] enforces strictly ascending terms on the way out and
//! silently drops empty records. [`ChunkReader`] verifies the same
//! invariant on the way back in and reports a violation as corruption
//! rather than repairing it, since reordering here would mask an upstream
//! aggregation bug.

use std::{
    fs::File,
    io::{BufReader, BufWriter, Read, Write},
    path::{Path, PathBuf},
};

use sedge_common::{Result, error::Error, try_or_ret_some_err};

use crate::{
    keys::{DocId, TermId},
    postings::{PostingsEntry, PostingsRecord},
};

/// Handle to an on-disk chunk: a path plus a cached byte size.
///
/// The size is refreshed after every mutating operation and serves only as
/// the merge-ordering heuristic; correctness never depends on it.
///
/// A chunk is created by a spill or by a merge, and is deleted once it has
/// been folded into another chunk. The survivor of a merge keeps its path
/// while its contents and size are replaced.
#[derive(Debug)]
pub struct ChunkFile {
    path: PathBuf,
    size: u64,
}

impl ChunkFile {
    /// Opens the chunk at `path`, creating an empty file if none exists.
    /// The cached size is taken from the current file length.
    pub fn create(path: impl Into<PathBuf>) -> Result<ChunkFile> {
        let path = path.into();
        File::options()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| Error::io(path.display().to_string(), e))?;
        let mut chunk = ChunkFile { path, size: 0 };
        chunk.refresh_size()?;
        Ok(chunk)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Cached byte length of the backing file.
    pub fn size(&self) -> u64 {
        self.size
    }

    pub(crate) fn refresh_size(&mut self) -> Result<()> {
        self.size = std::fs::metadata(&self.path)
            .map_err(|e| Error::io(self.path.display().to_string(), e))?
            .len();
        Ok(())
    }

    /// Opens a streaming cursor over the records, from the start. A fresh
    /// call restarts the stream; an open cursor must be fully consumed or
    /// dropped before the chunk is mutated.
    pub fn reader(&self) -> Result<ChunkReader> {
        ChunkReader::open(&self.path)
    }

    /// Removes the backing file. Called once the chunk has been folded into
    /// another and is no longer needed.
    pub fn delete(self) -> Result<()> {
        std::fs::remove_file(&self.path).map_err(|e| Error::io(self.path.display().to_string(), e))
    }
}

/// Sequential writer producing a well-formed chunk.
pub struct ChunkWriter {
    out: BufWriter<File>,
    path: PathBuf,
    last_term: Option<TermId>,
    records: u64,
}

impl ChunkWriter {
    /// Creates (truncating) the file at `path` for writing.
    pub fn create(path: impl Into<PathBuf>) -> Result<ChunkWriter> {
        let path = path.into();
        let file = File::create(&path).map_err(|e| Error::io(path.display().to_string(), e))?;
        Ok(ChunkWriter {
            out: BufWriter::new(file),
            path,
            last_term: None,
            records: 0,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn record_count(&self) -> u64 {
        self.records
    }

    /// Appends a record. Empty records are skipped; a term that does not
    /// strictly exceed the previously written one is rejected as corrupt
    /// input, as is an entry list too long for the encoding.
    pub fn write_record(&mut self, record: &PostingsRecord) -> Result<()> {
        if record.is_empty() {
            return Ok(());
        }
        if let Some(last) = self.last_term
            && record.term() <= last
        {
            return Err(Error::invalid_format(
                self.path.display().to_string(),
                format!("record {} not ascending after {last}", record.term()),
            ));
        }
        let entries = record.entries();
        let entry_count = encodable_entry_count(record.term(), entries.len())?;
        self.last_term = Some(record.term());

        let mut buf = Vec::with_capacity(record.encoded_len());
        buf.extend_from_slice(&record.term().as_u64().to_le_bytes());
        buf.extend_from_slice(&entry_count.to_le_bytes());
        for entry in entries {
            buf.extend_from_slice(&entry.doc.as_u64().to_le_bytes());
            buf.extend_from_slice(&entry.count.to_le_bytes());
        }
        self.out
            .write_all(&buf)
            .map_err(|e| Error::io(self.path.display().to_string(), e))?;
        self.records += 1;
        Ok(())
    }

    /// Flushes and returns the finished chunk with its size refreshed.
    /// The chunk becomes visible to the pool only after this succeeds.
    pub fn finish(mut self) -> Result<ChunkFile> {
        self.out
            .flush()
            .map_err(|e| Error::io(self.path.display().to_string(), e))?;
        drop(self.out);
        let mut chunk = ChunkFile {
            path: self.path,
            size: 0,
        };
        chunk.refresh_size()?;
        Ok(chunk)
    }

    /// Abandons the write and removes the partial output, so a cancelled or
    /// failed merge never publishes a half-written chunk.
    pub fn discard(self) -> Result<()> {
        drop(self.out);
        std::fs::remove_file(&self.path).map_err(|e| Error::io(self.path.display().to_string(), e))
    }
}

// The entry count is stored as a u32; a longer list must be rejected up
// front, since writing a wrapped count alongside the full entry list would
// corrupt the chunk.
fn encodable_entry_count(term: TermId, len: usize) -> Result<u32> {
    u32::try_from(len).map_err(|_| {
        Error::invalid_arg(
            "record",
            format!("record {term} has {len} entries, too many to encode"),
        )
    })
}

/// Streaming cursor over a chunk's records, in ascending term order.
///
/// The cursor exposes `peek` and `advance` so a merge can inspect the head
/// record on each side without consuming it. One record per side is the
/// peak memory cost of a merge, independent of chunk size.
#[derive(Debug)]
pub struct ChunkReader {
    input: BufReader<File>,
    element: String,
    next: Option<PostingsRecord>,
    last_term: Option<TermId>,
}

impl ChunkReader {
    fn open(path: &Path) -> Result<ChunkReader> {
        let element = path.display().to_string();
        let file = File::open(path).map_err(|e| Error::io(element.clone(), e))?;
        let mut reader = ChunkReader {
            input: BufReader::with_capacity(64 * 1024, file),
            element,
            next: None,
            last_term: None,
        };
        reader.fetch()?;
        Ok(reader)
    }

    /// The head record, if the stream is not exhausted.
    pub fn peek(&self) -> Option<&PostingsRecord> {
        self.next.as_ref()
    }

    /// Consumes and returns the head record, fetching the next one.
    pub fn advance(&mut self) -> Result<Option<PostingsRecord>> {
        let current = self.next.take();
        if current.is_some() {
            self.fetch()?;
        }
        Ok(current)
    }

    /// Adapts the cursor into an iterator of fallible records.
    pub fn records(self) -> Records {
        Records { reader: self }
    }

    fn fetch(&mut self) -> Result<()> {
        let Some(term) = self.read_u64_opt()? else {
            self.next = None;
            return Ok(());
        };
        let term = TermId::new(term);

        if let Some(last) = self.last_term
            && term <= last
        {
            return Err(Error::invalid_format(
                self.element.clone(),
                format!("record {term} not ascending after {last}"),
            ));
        }
        self.last_term = Some(term);

        let entry_count = self.read_u32()? as usize;
        if entry_count == 0 {
            return Err(Error::invalid_format(
                self.element.clone(),
                format!("record {term} has no entries"),
            ));
        }

        let mut entries = Vec::with_capacity(entry_count);
        let mut last_doc: Option<DocId> = None;
        for _ in 0..entry_count {
            let doc = DocId::new(self.read_u64()?);
            let count = self.read_u64()?;
            if last_doc.is_some_and(|last| doc <= last) {
                return Err(Error::invalid_format(
                    self.element.clone(),
                    format!("record {term} has out-of-order entry {doc}"),
                ));
            }
            last_doc = Some(doc);
            entries.push(PostingsEntry { doc, count });
        }

        self.next = Some(PostingsRecord::from_entries(term, entries));
        Ok(())
    }

    /// Reads a u64, distinguishing clean EOF at a record boundary
    /// (`Ok(None)`) from a mid-record truncation (corruption).
    fn read_u64_opt(&mut self) -> Result<Option<u64>> {
        let mut buf = [0u8; 8];
        let mut filled = 0;
        while filled < buf.len() {
            let n = self
                .input
                .read(&mut buf[filled..])
                .map_err(|e| Error::io(self.element.clone(), e))?;
            if n == 0 {
                if filled == 0 {
                    return Ok(None);
                }
                return Err(Error::invalid_format(
                    self.element.clone(),
                    "truncated record",
                ));
            }
            filled += n;
        }
        Ok(Some(u64::from_le_bytes(buf)))
    }

    fn read_u64(&mut self) -> Result<u64> {
        let mut buf = [0u8; 8];
        self.read_exact(&mut buf)?;
        Ok(u64::from_le_bytes(buf))
    }

    fn read_u32(&mut self) -> Result<u32> {
        let mut buf = [0u8; 4];
        self.read_exact(&mut buf)?;
        Ok(u32::from_le_bytes(buf))
    }

    fn read_exact(&mut self, buf: &mut [u8]) -> Result<()> {
        self.input.read_exact(buf).map_err(|e| {
            if e.kind() == std::io::ErrorKind::UnexpectedEof {
                Error::invalid_format(self.element.clone(), "truncated record")
            } else {
                Error::io(self.element.clone(), e)
            }
        })
    }
}

/// Iterator adapter over a [`ChunkReader`].
pub struct Records {
    reader: ChunkReader,
}

impl Iterator for Records {
    type Item = Result<PostingsRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        try_or_ret_some_err!(self.reader.advance()).map(Ok)
    }
}
