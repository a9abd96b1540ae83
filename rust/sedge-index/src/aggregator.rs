//! Memory-bounded accumulation of term occurrences.

use ahash::AHashMap;

use crate::{
    keys::{DocId, TermId},
    postings::{PostingsEntry, PostingsRecord},
};

// Rough per-element heap cost of the nested hash maps, counting the key,
// the value and amortized table overhead. Spill sizing only needs to be
// stable, not exact.
const TERM_COST: usize = 96;
const ENTRY_COST: usize = 32;

/// Accumulates `(term, doc) -> count` in memory up to a configured budget.
///
/// Lookups and increments are hash-based and order-free; ordering is
/// established only when the buffer is drained for a spill, which yields
/// records sorted by term with entries sorted by document id. After a
/// drain the aggregator is empty and starts over.
///
/// The memory estimate is maintained incrementally as occurrences arrive,
/// so the budget check is O(1). The budget is advisory: the element that
/// crosses it is still accepted, and the caller is expected to spill
/// promptly once [`is_over_budget`](Aggregator::is_over_budget) reports
/// true.
pub struct Aggregator {
    terms: AHashMap<TermId, AHashMap<DocId, u64>>,
    memory_budget: usize,
    estimated_size: usize,
}

impl Aggregator {
    pub fn new(memory_budget: usize) -> Aggregator {
        Aggregator {
            terms: AHashMap::new(),
            memory_budget,
            estimated_size: 0,
        }
    }

    /// Records `count` occurrences of `term` in `doc`. Counts for a pair
    /// seen multiple times are summed.
    pub fn record(&mut self, term: TermId, doc: DocId, count: u64) {
        let estimated = &mut self.estimated_size;
        let docs = self.terms.entry(term).or_insert_with(|| {
            *estimated += TERM_COST;
            AHashMap::new()
        });
        *docs.entry(doc).or_insert_with(|| {
            *estimated += ENTRY_COST;
            0
        }) += count;
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    pub fn term_count(&self) -> usize {
        self.terms.len()
    }

    /// Estimated heap footprint of the buffered occurrences, in bytes.
    pub fn estimated_size(&self) -> usize {
        self.estimated_size
    }

    pub fn is_over_budget(&self) -> bool {
        self.estimated_size > self.memory_budget
    }

    /// Drains the buffer into records sorted by term, each with its entry
    /// list sorted by document id. The aggregator is empty afterwards.
    pub fn drain_sorted(&mut self) -> Vec<PostingsRecord> {
        self.estimated_size = 0;
        let mut records: Vec<PostingsRecord> = self
            .terms
            .drain()
            .map(|(term, docs)| {
                let mut entries: Vec<PostingsEntry> = docs
                    .into_iter()
                    .map(|(doc, count)| PostingsEntry::new(doc, count))
                    .collect();
                entries.sort_unstable_by_key(|e| e.doc);
                PostingsRecord::from_entries(term, entries)
            })
            .collect();
        records.sort_unstable_by_key(|r| r.term());
        records
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counts_are_summed() {
        let mut agg = Aggregator::new(1 << 20);
        agg.record(TermId::new(5), DocId::new(1), 1);
        agg.record(TermId::new(5), DocId::new(1), 1);
        agg.record(TermId::new(5), DocId::new(2), 3);

        let records = agg.drain_sorted();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].term(), TermId::new(5));
        assert_eq!(
            records[0].entries(),
            &[
                PostingsEntry::new(1u64, 2),
                PostingsEntry::new(2u64, 3),
            ]
        );
        assert!(agg.is_empty());
    }

    #[test]
    fn test_drain_is_fully_sorted() {
        let mut agg = Aggregator::new(1 << 20);
        // Insertion order deliberately scrambled.
        for (t, d) in [(9u64, 4u64), (2, 7), (9, 1), (5, 3), (2, 2), (5, 9)] {
            agg.record(TermId::new(t), DocId::new(d), 1);
        }

        let records = agg.drain_sorted();
        let terms: Vec<u64> = records.iter().map(|r| r.term().as_u64()).collect();
        assert_eq!(terms, vec![2, 5, 9]);
        for record in &records {
            assert!(record.entries().windows(2).all(|w| w[0].doc < w[1].doc));
        }
    }

    #[test]
    fn test_budget_tracking() {
        let mut agg = Aggregator::new(TERM_COST + 2 * ENTRY_COST);
        assert!(!agg.is_over_budget());

        agg.record(TermId::new(1), DocId::new(1), 1);
        agg.record(TermId::new(1), DocId::new(2), 1);
        assert!(!agg.is_over_budget());

        // Repeated occurrences of an existing pair do not grow the estimate.
        agg.record(TermId::new(1), DocId::new(2), 4);
        assert!(!agg.is_over_budget());

        agg.record(TermId::new(2), DocId::new(1), 1);
        assert!(agg.is_over_budget());

        agg.drain_sorted();
        assert_eq!(agg.estimated_size(), 0);
        assert!(!agg.is_over_budget());
    }
}
