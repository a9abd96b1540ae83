//! In-memory ranked retrieval over small, fully resident corpora.
//!
//! Complements the external-memory pipeline: where [`IndexBuilder`] trades
//! latency for scale, [`RamIndex`] holds every document's term frequencies
//! in memory and scores them directly, which is convenient for corpora that
//! fit and for labelled nearest-neighbor classification.
//!
//! [`IndexBuilder`]: crate::builder::IndexBuilder

use ahash::AHashMap;

use crate::keys::TermId;

// Okapi BM25 parameters.
const K1: f64 = 1.5;
const B: f64 = 0.75;
const K3: f64 = 500.0;

/// A document's bag-of-terms representation plus an optional label used by
/// [`RamIndex::classify_knn`].
#[derive(Debug, Clone, Default)]
pub struct Document {
    name: String,
    label: String,
    freqs: AHashMap<TermId, u64>,
    length: u64,
}

impl Document {
    pub fn new(name: impl Into<String>, label: impl Into<String>) -> Document {
        Document {
            name: name.into(),
            label: label.into(),
            freqs: AHashMap::new(),
            length: 0,
        }
    }

    /// Records `count` occurrences of `term`, growing the document length.
    pub fn record(&mut self, term: TermId, count: u64) {
        *self.freqs.entry(term).or_insert(0) += count;
        self.length += count;
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// Total number of term occurrences.
    pub fn length(&self) -> u64 {
        self.length
    }

    pub fn frequency(&self, term: TermId) -> u64 {
        self.freqs.get(&term).copied().unwrap_or(0)
    }

    pub fn frequencies(&self) -> &AHashMap<TermId, u64> {
        &self.freqs
    }
}

/// A fully in-memory index scored with Okapi BM25.
///
/// Document frequency counts each document containing a term once,
/// regardless of how often the term occurs within it.
pub struct RamIndex {
    documents: Vec<Document>,
    doc_freqs: AHashMap<TermId, u64>,
    avg_doc_length: f64,
}

impl RamIndex {
    pub fn new(documents: Vec<Document>) -> RamIndex {
        let mut doc_freqs = AHashMap::new();
        let mut total_length = 0u64;
        for doc in &documents {
            total_length += doc.length;
            for &term in doc.freqs.keys() {
                *doc_freqs.entry(term).or_insert(0) += 1;
            }
        }
        let avg_doc_length = if documents.is_empty() {
            0.0
        } else {
            total_length as f64 / documents.len() as f64
        };
        RamIndex {
            documents,
            doc_freqs,
            avg_doc_length,
        }
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    pub fn avg_doc_length(&self) -> f64 {
        self.avg_doc_length
    }

    /// BM25 score of `document` against `query`, summed over the query's
    /// terms. Terms absent from the document contribute nothing, so a
    /// document sharing no terms with the query scores zero.
    pub fn score(&self, document: &Document, query: &Document) -> f64 {
        let num_docs = self.documents.len() as f64;
        let doc_length = document.length as f64;

        let mut score = 0.0;
        for (&term, &qf) in &query.freqs {
            let term_freq = document.frequency(term) as f64;
            if term_freq == 0.0 {
                continue;
            }
            let doc_freq = self.doc_freqs.get(&term).copied().unwrap_or(0) as f64;
            let query_term_freq = qf as f64;

            let idf = ((num_docs - doc_freq + 0.5) / (doc_freq + 0.5)).ln();
            let tf = ((K1 + 1.0) * term_freq)
                / (K1 * ((1.0 - B) + B * doc_length / self.avg_doc_length) + term_freq);
            let qtf = ((K3 + 1.0) * query_term_freq) / (K3 + query_term_freq);

            score += idf * tf * qtf;
        }
        score
    }

    /// Scores every document against the query and returns the nonzero
    /// results ordered from best to worst.
    pub fn search(&self, query: &Document) -> Vec<(f64, &Document)> {
        let mut ranks: Vec<(f64, &Document)> = self
            .documents
            .iter()
            .filter_map(|doc| {
                let score = self.score(doc, query);
                (score != 0.0).then_some((score, doc))
            })
            .collect();
        ranks.sort_by(|a, b| b.0.total_cmp(&a.0));
        ranks
    }

    /// Labels the query by majority vote among its `k` highest-scoring
    /// neighbors. `None` when nothing scores against the query.
    pub fn classify_knn(&self, query: &Document, k: usize) -> Option<&str> {
        let ranking = self.search(query);
        let mut counts: AHashMap<&str, usize> = AHashMap::new();
        for (_, doc) in ranking.iter().take(k) {
            *counts.entry(doc.label()).or_insert(0) += 1;
        }
        counts
            .into_iter()
            .max_by_key(|&(_, count)| count)
            .map(|(label, _)| label)
    }
}
