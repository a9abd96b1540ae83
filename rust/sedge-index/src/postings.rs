//! The atomic unit of the index: one term together with its document list.

use crate::keys::{DocId, TermId};

/// One `(document, count)` pair within a postings record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PostingsEntry {
    pub doc: DocId,
    pub count: u64,
}

impl PostingsEntry {
    pub fn new(doc: impl Into<DocId>, count: u64) -> PostingsEntry {
        PostingsEntry {
            doc: doc.into(),
            count,
        }
    }
}

/// A term and its ordered document list.
///
/// Entries are strictly ascending by document id, with each document
/// appearing at most once. A record with no entries is never stored in a
/// chunk; empty records are discarded by the chunk writer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostingsRecord {
    term: TermId,
    entries: Vec<PostingsEntry>,
}

impl PostingsRecord {
    pub fn new(term: impl Into<TermId>) -> PostingsRecord {
        PostingsRecord {
            term: term.into(),
            entries: vec![],
        }
    }

    /// Builds a record from an entry list that is already strictly
    /// ascending by document id.
    pub fn from_entries(term: impl Into<TermId>, entries: Vec<PostingsEntry>) -> PostingsRecord {
        debug_assert!(entries.windows(2).all(|w| w[0].doc < w[1].doc));
        PostingsRecord {
            term: term.into(),
            entries,
        }
    }

    pub fn term(&self) -> TermId {
        self.term
    }

    pub fn entries(&self) -> &[PostingsEntry] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Total occurrence count across all documents in this record.
    pub fn total_count(&self) -> u64 {
        self.entries.iter().map(|e| e.count).sum()
    }

    /// Appends an entry; the document id must exceed the current maximum.
    pub fn push(&mut self, entry: PostingsEntry) {
        debug_assert!(self.entries.last().is_none_or(|last| last.doc < entry.doc));
        self.entries.push(entry);
    }

    /// Combines `other` into this record by a linear merge of the two sorted
    /// entry lists, summing counts where the document matches. Entries whose
    /// combined count falls below `min_count` are dropped; a floor of zero
    /// keeps everything.
    ///
    /// Runs in O(|self| + |other|). The result stays sorted and
    /// duplicate-free.
    ///
    /// # Panics
    ///
    /// Panics if the records carry different terms. Callers are expected to
    /// route only same-term records here; anything else is a bug upstream,
    /// not a recoverable condition.
    pub fn merge_in(&mut self, other: PostingsRecord, min_count: u64) {
        assert_eq!(
            self.term, other.term,
            "postings merge requires matching terms"
        );

        let mut merged = Vec::with_capacity(self.entries.len() + other.entries.len());
        let mut lhs = std::mem::take(&mut self.entries).into_iter().peekable();
        let mut rhs = other.entries.into_iter().peekable();

        loop {
            let entry = match (lhs.peek(), rhs.peek()) {
                (Some(a), Some(b)) => {
                    if a.doc < b.doc {
                        lhs.next().unwrap()
                    } else if b.doc < a.doc {
                        rhs.next().unwrap()
                    } else {
                        let a = lhs.next().unwrap();
                        let b = rhs.next().unwrap();
                        PostingsEntry::new(a.doc, a.count + b.count)
                    }
                }
                (Some(_), None) => lhs.next().unwrap(),
                (None, Some(_)) => rhs.next().unwrap(),
                (None, None) => break,
            };
            if entry.count >= min_count {
                merged.push(entry);
            }
        }

        self.entries = merged;
    }

    /// Drops entries whose count falls below `min_count`.
    pub fn retain_at_least(&mut self, min_count: u64) {
        if min_count > 1 {
            self.entries.retain(|e| e.count >= min_count);
        }
    }

    /// Encoded byte length of this record in the on-disk chunk layout.
    pub(crate) fn encoded_len(&self) -> usize {
        8 + 4 + self.entries.len() * 16
    }
}
