//! Streaming two-way merge of sorted postings runs.
//!
//! Both entry points perform the same linear two-pointer pass: compare the
//! head terms of the two sides, emit the smaller record unchanged, and
//! combine records with equal terms via [`PostingsRecord::merge_in`]. The
//! output is streamed to a fresh file, so peak memory is one record per
//! side regardless of input size. An empty side degrades to a copy of the
//! other, and disjoint term ranges degrade to a concatenation; both remain
//! O(n + m).
//!
//! The merged output is written to a sibling scratch path and only renamed
//! over the surviving input once the write has fully completed, so a failed
//! or cancelled merge leaves both inputs intact and never publishes partial
//! output.

use std::cmp::Ordering;

use sedge_common::{Result, error::Error};

use crate::{
    chunk::{ChunkFile, ChunkReader, ChunkWriter},
    postings::PostingsRecord,
};

/// A sorted record stream with one-record lookahead, so the merge can
/// compare heads without consuming them.
trait RecordSource {
    fn peek(&mut self) -> Option<&PostingsRecord>;
    fn advance(&mut self) -> Result<Option<PostingsRecord>>;
}

impl RecordSource for ChunkReader {
    fn peek(&mut self) -> Option<&PostingsRecord> {
        ChunkReader::peek(self)
    }

    fn advance(&mut self) -> Result<Option<PostingsRecord>> {
        ChunkReader::advance(self)
    }
}

/// An already-sorted in-memory buffer as a merge side.
struct MemorySource {
    records: std::iter::Peekable<std::vec::IntoIter<PostingsRecord>>,
}

impl MemorySource {
    fn new(records: Vec<PostingsRecord>) -> MemorySource {
        debug_assert!(records.windows(2).all(|w| w[0].term() < w[1].term()));
        MemorySource {
            records: records.into_iter().peekable(),
        }
    }
}

impl RecordSource for MemorySource {
    fn peek(&mut self) -> Option<&PostingsRecord> {
        self.records.peek()
    }

    fn advance(&mut self) -> Result<Option<PostingsRecord>> {
        Ok(self.records.next())
    }
}

/// Merges two on-disk chunks into one sorted, duplicate-free chunk.
///
/// `a` is the survivor: after a successful merge its path refers to the
/// combined contents and its size is refreshed, while `b`'s backing file is
/// deleted. Records sharing a term are combined with the `min_count` floor
/// applied to the summed counts (a floor of zero keeps everything).
pub fn merge_chunks(mut a: ChunkFile, b: ChunkFile, min_count: u64) -> Result<ChunkFile> {
    log::debug!(
        "merging {} ({} B) + {} ({} B)",
        a.path().display(),
        a.size(),
        b.path().display(),
        b.size()
    );

    let out_path = scratch_path(&a);
    let mut writer = ChunkWriter::create(&out_path)?;
    let merged = (|| -> Result<()> {
        let lhs = a.reader()?;
        let rhs = b.reader()?;
        merge_sources(&mut writer, lhs, rhs, min_count)
    })();
    if let Err(err) = merged {
        let _ = writer.discard();
        return Err(err);
    }

    let out = match writer.finish() {
        Ok(out) => out,
        Err(err) => {
            let _ = std::fs::remove_file(&out_path);
            return Err(err);
        }
    };

    // Publish: replace a's contents, then drop b. Inputs stay untouched
    // until the output write has fully succeeded.
    if let Err(e) = std::fs::rename(out.path(), a.path()) {
        let _ = std::fs::remove_file(out.path());
        return Err(Error::io(a.path().display().to_string(), e));
    }
    b.delete()?;
    a.refresh_size()?;
    Ok(a)
}

/// Merges an already-sorted in-memory buffer into `chunk`. The buffer is
/// drained up front; after a successful merge its contents are durably
/// represented in the chunk.
pub fn merge_memory(
    mut chunk: ChunkFile,
    buffer: &mut Vec<PostingsRecord>,
    min_count: u64,
) -> Result<ChunkFile> {
    log::debug!(
        "merging {} buffered records into {} ({} B)",
        buffer.len(),
        chunk.path().display(),
        chunk.size()
    );

    let out_path = scratch_path(&chunk);
    let mut writer = ChunkWriter::create(&out_path)?;
    let merged = (|| -> Result<()> {
        let lhs = chunk.reader()?;
        let rhs = MemorySource::new(std::mem::take(buffer));
        merge_sources(&mut writer, lhs, rhs, min_count)
    })();
    if let Err(err) = merged {
        let _ = writer.discard();
        return Err(err);
    }

    let out = match writer.finish() {
        Ok(out) => out,
        Err(err) => {
            let _ = std::fs::remove_file(&out_path);
            return Err(err);
        }
    };

    if let Err(e) = std::fs::rename(out.path(), chunk.path()) {
        let _ = std::fs::remove_file(out.path());
        return Err(Error::io(chunk.path().display().to_string(), e));
    }
    chunk.refresh_size()?;
    Ok(chunk)
}

/// Rewrites a chunk keeping only entries whose count reaches `min_count`.
/// Records left empty by the filter are removed. A floor of zero or one
/// returns the chunk unchanged.
pub fn apply_count_floor(mut chunk: ChunkFile, min_count: u64) -> Result<ChunkFile> {
    if min_count <= 1 {
        return Ok(chunk);
    }

    let out_path = scratch_path(&chunk);
    let mut writer = ChunkWriter::create(&out_path)?;
    let filtered = (|| -> Result<()> {
        let mut reader = chunk.reader()?;
        while let Some(mut record) = reader.advance()? {
            record.retain_at_least(min_count);
            writer.write_record(&record)?;
        }
        Ok(())
    })();
    if let Err(err) = filtered {
        let _ = writer.discard();
        return Err(err);
    }

    let out = writer.finish()?;
    if let Err(e) = std::fs::rename(out.path(), chunk.path()) {
        let _ = std::fs::remove_file(out.path());
        return Err(Error::io(chunk.path().display().to_string(), e));
    }
    chunk.refresh_size()?;
    Ok(chunk)
}

fn scratch_path(survivor: &ChunkFile) -> std::path::PathBuf {
    let mut os = survivor.path().as_os_str().to_os_string();
    os.push(".merging");
    os.into()
}

fn merge_sources<L, R>(
    writer: &mut ChunkWriter,
    mut lhs: L,
    mut rhs: R,
    min_count: u64,
) -> Result<()>
where
    L: RecordSource,
    R: RecordSource,
{
    loop {
        let ord = match (lhs.peek(), rhs.peek()) {
            (Some(a), Some(b)) => a.term().cmp(&b.term()),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => return Ok(()),
        };
        match ord {
            Ordering::Less => {
                let mut record = lhs.advance()?.expect("peeked record");
                record.retain_at_least(min_count);
                writer.write_record(&record)?;
            }
            Ordering::Greater => {
                let mut record = rhs.advance()?.expect("peeked record");
                record.retain_at_least(min_count);
                writer.write_record(&record)?;
            }
            Ordering::Equal => {
                let mut record = lhs.advance()?.expect("peeked record");
                let other = rhs.advance()?.expect("peeked record");
                record.merge_in(other, min_count);
                writer.write_record(&record)?;
            }
        }
    }
}
