//! External-memory inverted index construction.
//!
//! The crate builds a postings file — a mapping from terms to sorted lists
//! of `(document, count)` pairs — for corpora too large to index in memory.
//! Incoming term occurrences are accumulated in a memory-bounded
//! [`Aggregator`](aggregator::Aggregator); when the budget is exceeded the
//! buffer is spilled to disk as an independently sorted chunk. Chunks are
//! then consolidated by a [`MergeScheduler`](scheduler::MergeScheduler) that
//! repeatedly streams the two smallest chunks through a linear two-pointer
//! merge until a single sorted postings file remains.
//!
//! [`IndexBuilder`](builder::IndexBuilder) is the high-level entry point:
//! it tokenizes documents, feeds the aggregator, and drives the merge
//! schedule to completion. The finished index is exposed as a lazy,
//! ascending-by-term record stream.
//!
//! The in-memory [`ranker`] and the [`shuffle`] utilities are independent
//! of the external-memory pipeline.

pub mod aggregator;
pub mod builder;
pub mod chunk;
pub mod keys;
pub mod merge;
pub mod postings;
pub mod ranker;
pub mod scheduler;
pub mod shuffle;
pub mod tokenizers;

pub use builder::{IndexBuilder, IndexBuilderConfig, PostingsFile};
pub use chunk::{ChunkFile, ChunkReader, ChunkWriter};
pub use keys::{DocId, TermId};
pub use postings::{PostingsEntry, PostingsRecord};
