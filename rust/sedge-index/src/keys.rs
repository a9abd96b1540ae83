//! Concrete key types of the postings mapping.
//!
//! All ordering in the index is defined over [`TermId`] ascending; document
//! lists within a record are ordered by [`DocId`] ascending. Both are opaque
//! integer codes: the mapping from strings to `TermId` lives in the term
//! dictionary, document identity is assigned by the caller.

use std::fmt;

/// Primary key of the postings mapping: an integer-coded term.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct TermId(u64);

impl TermId {
    pub const fn new(id: u64) -> TermId {
        TermId(id)
    }

    pub const fn as_u64(&self) -> u64 {
        self.0
    }
}

impl From<u64> for TermId {
    fn from(id: u64) -> TermId {
        TermId(id)
    }
}

impl fmt::Display for TermId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "t{}", self.0)
    }
}

/// Secondary key of the postings mapping: a document identifier, paired with
/// an occurrence count in each postings entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct DocId(u64);

impl DocId {
    pub const fn new(id: u64) -> DocId {
        DocId(id)
    }

    pub const fn as_u64(&self) -> u64 {
        self.0
    }
}

impl From<u64> for DocId {
    fn from(id: u64) -> DocId {
        DocId(id)
    }
}

impl fmt::Display for DocId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "d{}", self.0)
    }
}
