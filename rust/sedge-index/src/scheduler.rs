//! Merge-order orchestration for the chunk pool.
//!
//! The scheduler owns the multiset of live chunks produced by spills and
//! consolidates them pairwise until exactly one remains, which is the
//! finished postings file. Whenever two or more chunks are live, the two
//! smallest by byte size are removed and merged; the survivor is pushed
//! back with its new size. Merging the two smallest chunks first
//! approximates the minimum total I/O volume over the whole merge
//! sequence, for the same reason the greedy rule builds optimal prefix
//! codes: a record that starts in a small chunk participates in fewer
//! merge passes than one folded early into a large chunk.
//!
//! Merge workers run in the background from construction on, so
//! consolidation overlaps with upstream aggregation. Only the pop/push of
//! pool entries happens under the lock; the streaming merge itself runs
//! outside it, letting several merges proceed concurrently. A chunk is
//! owned by at most one in-flight merge. Ties on size break by insertion
//! order, which keeps pair selection deterministic; the final content is
//! deterministic regardless, since record merging is associative and
//! commutative.

use std::{
    cmp::{Ordering, Reverse},
    collections::BinaryHeap,
    sync::{Arc, Condvar, Mutex},
    thread::JoinHandle,
};

use sedge_common::{Result, error::Error};

use crate::{chunk::ChunkFile, merge};

/// Lifecycle of one index build.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildState {
    /// Chunks are still being produced upstream; merging runs opportunistically.
    Collecting,
    /// Intake is closed; only consolidation remains.
    Merging,
    /// Exactly one chunk remains (or the build failed); no further input.
    Done,
}

struct PoolEntry {
    size: u64,
    seq: u64,
    chunk: ChunkFile,
}

impl PartialEq for PoolEntry {
    fn eq(&self, other: &PoolEntry) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for PoolEntry {}

impl Ord for PoolEntry {
    fn cmp(&self, other: &PoolEntry) -> Ordering {
        (self.size, self.seq).cmp(&(other.size, other.seq))
    }
}

impl PartialOrd for PoolEntry {
    fn partial_cmp(&self, other: &PoolEntry) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

struct Pool {
    heap: BinaryHeap<Reverse<PoolEntry>>,
    state: BuildState,
    in_flight: usize,
    next_seq: u64,
    merges: u64,
    failure: Option<Error>,
}

struct Shared {
    pool: Mutex<Pool>,
    available: Condvar,
}

/// Orchestrates chunk consolidation over an explicit, lock-protected pool.
///
/// Producers register freshly spilled chunks with [`add_chunk`]
/// (accepted only while collecting); [`finish`](MergeScheduler::finish)
/// closes intake, drains the merge workers, and yields the single
/// surviving chunk.
///
/// The minimum-count floor, when configured, is applied once to the final
/// chunk rather than during intermediate merges, so the surviving entry
/// set does not depend on the order in which chunks happened to meet.
pub struct MergeScheduler {
    shared: Arc<Shared>,
    workers: Vec<JoinHandle<()>>,
    min_count: u64,
}

impl MergeScheduler {
    /// Creates a scheduler with `merge_workers` background merge threads
    /// and no count floor.
    pub fn new(merge_workers: usize) -> MergeScheduler {
        Self::with_count_floor(merge_workers, 0)
    }

    /// Creates a scheduler that drops entries below `min_count` from the
    /// finished index.
    ///
    /// # Panics
    ///
    /// Panics if `merge_workers` is zero.
    pub fn with_count_floor(merge_workers: usize, min_count: u64) -> MergeScheduler {
        assert_ne!(merge_workers, 0);

        let shared = Arc::new(Shared {
            pool: Mutex::new(Pool {
                heap: BinaryHeap::new(),
                state: BuildState::Collecting,
                in_flight: 0,
                next_seq: 0,
                merges: 0,
                failure: None,
            }),
            available: Condvar::new(),
        });

        let workers = (0..merge_workers)
            .map(|i| {
                let shared = Arc::clone(&shared);
                std::thread::Builder::new()
                    .name(format!("sedge-merge-{i}"))
                    .spawn(move || merge_worker(&shared))
                    .expect("spawn merge worker")
            })
            .collect();

        MergeScheduler {
            shared,
            workers,
            min_count,
        }
    }

    /// Current number of chunks awaiting a merge (excluding those owned by
    /// in-flight merges).
    pub fn pending_chunks(&self) -> usize {
        self.shared.pool.lock().expect("chunk pool lock").heap.len()
    }

    pub fn state(&self) -> BuildState {
        self.shared.pool.lock().expect("chunk pool lock").state
    }

    /// Registers a freshly spilled chunk with the pool. Only complete,
    /// flushed chunks may be registered; rejected once intake has closed.
    pub fn add_chunk(&self, chunk: ChunkFile) -> Result<()> {
        let mut pool = self.shared.pool.lock().expect("chunk pool lock");
        if pool.state != BuildState::Collecting {
            return Err(Error::invalid_operation("chunk pool intake is closed"));
        }
        log::debug!(
            "registering chunk {} ({} B)",
            chunk.path().display(),
            chunk.size()
        );
        let seq = pool.next_seq;
        pool.next_seq += 1;
        pool.heap.push(Reverse(PoolEntry {
            size: chunk.size(),
            seq,
            chunk,
        }));
        drop(pool);
        self.shared.available.notify_all();
        Ok(())
    }

    /// Closes intake, waits for the remaining merges, and returns the one
    /// surviving chunk: the finished postings file. `None` when no chunk
    /// was ever registered. A pool of N chunks completes after exactly
    /// N − 1 merges.
    ///
    /// The first merge failure aborts the build and is returned here; the
    /// chunks of the failed merge are left on disk, untouched, for
    /// inspection.
    pub fn finish(mut self) -> Result<Option<ChunkFile>> {
        {
            let mut pool = self.shared.pool.lock().expect("chunk pool lock");
            if pool.state == BuildState::Collecting {
                pool.state = BuildState::Merging;
            }
        }
        self.shared.available.notify_all();
        for worker in self.workers.drain(..) {
            worker.join().expect("merge worker panicked");
        }

        let mut pool = self.shared.pool.lock().expect("chunk pool lock");
        pool.state = BuildState::Done;
        if let Some(err) = pool.failure.take() {
            return Err(err);
        }

        assert!(pool.heap.len() <= 1);
        let merges = pool.merges;
        let Some(Reverse(entry)) = pool.heap.pop() else {
            return Ok(None);
        };
        drop(pool);

        let chunk = merge::apply_count_floor(entry.chunk, self.min_count)?;
        log::info!(
            "merge schedule complete: {merges} merges, final chunk {} ({} B)",
            chunk.path().display(),
            chunk.size()
        );
        Ok(Some(chunk))
    }
}

impl Drop for MergeScheduler {
    // Never panics: drop may run during unwinding, and a poisoned lock or
    // panicked worker must not escalate into an abort.
    fn drop(&mut self) {
        if let Ok(mut pool) = self.shared.pool.lock()
            && pool.state == BuildState::Collecting
        {
            pool.state = BuildState::Merging;
        }
        self.shared.available.notify_all();
        for worker in self.workers.drain(..) {
            if worker.join().is_err() {
                log::error!("merge worker panicked");
            }
        }
    }
}

fn merge_worker(shared: &Shared) {
    loop {
        let (a, b) = {
            let mut pool = shared.pool.lock().expect("chunk pool lock");
            loop {
                if pool.failure.is_some() {
                    return;
                }
                if pool.heap.len() >= 2 {
                    break;
                }
                if pool.state == BuildState::Merging && pool.in_flight == 0 {
                    return;
                }
                pool = shared.available.wait(pool).expect("chunk pool lock");
            }
            let Reverse(a) = pool.heap.pop().expect("two chunks available");
            let Reverse(b) = pool.heap.pop().expect("two chunks available");
            pool.in_flight += 1;
            (a.chunk, b.chunk)
        };

        // The streaming merge runs outside the lock; intermediate merges
        // never apply the count floor.
        match merge::merge_chunks(a, b, 0) {
            Ok(chunk) => {
                let mut pool = shared.pool.lock().expect("chunk pool lock");
                pool.in_flight -= 1;
                pool.merges += 1;
                let seq = pool.next_seq;
                pool.next_seq += 1;
                pool.heap.push(Reverse(PoolEntry {
                    size: chunk.size(),
                    seq,
                    chunk,
                }));
                drop(pool);
                shared.available.notify_all();
            }
            Err(err) => {
                let mut pool = shared.pool.lock().expect("chunk pool lock");
                pool.in_flight -= 1;
                pool.failure.get_or_insert(err);
                drop(pool);
                shared.available.notify_all();
                return;
            }
        }
    }
}
