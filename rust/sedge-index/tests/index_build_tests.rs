//! End-to-end tests of the spill-and-merge index construction pipeline.

use std::collections::BTreeMap;

use sedge_common::Result;
use sedge_index::{
    IndexBuilder, IndexBuilderConfig, PostingsFile,
    builder::TermDictionary,
    tokenizers::{Tokenizer, WordTokenizer},
};

fn read_postings(file: &PostingsFile) -> BTreeMap<u64, Vec<(u64, u64)>> {
    let Some(reader) = file.reader().unwrap() else {
        return BTreeMap::new();
    };
    reader
        .records()
        .collect::<Result<Vec<_>>>()
        .unwrap()
        .into_iter()
        .map(|r| {
            (
                r.term().as_u64(),
                r.entries()
                    .iter()
                    .map(|e| (e.doc.as_u64(), e.count))
                    .collect(),
            )
        })
        .collect()
}

/// Reference counts computed with a plain nested map.
fn naive_counts(docs: &[(u64, String)], terms: &TermDictionary) -> BTreeMap<u64, Vec<(u64, u64)>> {
    let tokenizer = WordTokenizer::new();
    let mut counts: BTreeMap<u64, BTreeMap<u64, u64>> = BTreeMap::new();
    for (doc, text) in docs {
        for token in tokenizer.tokenize(text) {
            let term = terms.get(token).expect("indexed term");
            *counts
                .entry(term.as_u64())
                .or_default()
                .entry(*doc)
                .or_default() += 1;
        }
    }
    counts
        .into_iter()
        .map(|(term, docs)| (term, docs.into_iter().collect()))
        .collect()
}

fn corpus(num_docs: u64) -> Vec<(u64, String)> {
    // Overlapping vocabulary across documents so merges combine records,
    // plus per-document terms so every spill carries something unique.
    (0..num_docs)
        .map(|doc| {
            let text = format!(
                "shared vocab item{} item{} item{} doc{doc} doc{doc} shared",
                doc % 13,
                doc % 7,
                doc % 29
            );
            (doc, text)
        })
        .collect()
}

#[test]
fn test_build_matches_naive_counts_with_many_spills() {
    let docs = corpus(300);
    let config = IndexBuilderConfig {
        // A budget this small spills after nearly every document.
        memory_budget: 512,
        merge_workers: 4,
        ..Default::default()
    };
    let mut builder = IndexBuilder::new(config).unwrap();
    for (doc, text) in &docs {
        builder.add_document(*doc, text).unwrap();
    }
    assert_eq!(builder.docs_indexed(), 300);

    let file = builder.finish().unwrap();
    let got = read_postings(&file);
    let expected = naive_counts(&docs, file.terms());
    assert_eq!(got, expected);
}

#[test]
fn test_single_spill_and_many_spills_agree() {
    let docs = corpus(120);

    let mut large = IndexBuilder::new(IndexBuilderConfig::default()).unwrap();
    let mut tiny = IndexBuilder::new(IndexBuilderConfig {
        memory_budget: 256,
        merge_workers: 2,
        ..Default::default()
    })
    .unwrap();
    for (doc, text) in &docs {
        large.add_document(*doc, text).unwrap();
        tiny.add_document(*doc, text).unwrap();
    }

    let large = large.finish().unwrap();
    let tiny = tiny.finish().unwrap();

    // Term ids are assigned in first-seen order by each builder, which is
    // identical here, so the postings must match exactly.
    assert_eq!(read_postings(&large), read_postings(&tiny));
}

#[test]
fn test_output_is_sorted_and_duplicate_free() {
    let docs = corpus(150);
    let mut builder = IndexBuilder::new(IndexBuilderConfig {
        memory_budget: 384,
        ..Default::default()
    })
    .unwrap();
    for (doc, text) in &docs {
        builder.add_document(*doc, text).unwrap();
    }
    let file = builder.finish().unwrap();

    let records: Vec<_> = file
        .reader()
        .unwrap()
        .unwrap()
        .records()
        .collect::<Result<Vec<_>>>()
        .unwrap();
    assert!(!records.is_empty());
    assert!(records.windows(2).all(|w| w[0].term() < w[1].term()));
    for record in &records {
        assert!(!record.is_empty());
        assert!(record.entries().windows(2).all(|w| w[0].doc < w[1].doc));
    }
}

#[test]
fn test_count_floor_drops_rare_terms_across_spills() {
    // "anchor" appears once per document; the per-document unique term
    // appears three times in one document only.
    let config = IndexBuilderConfig {
        memory_budget: 128,
        min_count: 3,
        ..Default::default()
    };
    let mut builder = IndexBuilder::new(config).unwrap();
    for doc in 0..40u64 {
        builder
            .add_document(doc, &format!("anchor only{doc} only{doc} only{doc}"))
            .unwrap();
    }
    let file = builder.finish().unwrap();
    let got = read_postings(&file);

    // Each (anchor, doc) count is 1: below the floor everywhere even
    // though the term is frequent corpus-wide.
    let anchor = file.terms().get("anchor").unwrap();
    assert!(!got.contains_key(&anchor.as_u64()));

    let only5 = file.terms().get("only5").unwrap();
    assert_eq!(got[&only5.as_u64()], vec![(5, 3)]);
}

#[test]
fn test_empty_and_token_free_documents() {
    let mut builder = IndexBuilder::new(IndexBuilderConfig::default()).unwrap();
    builder.add_document(1u64, "").unwrap();
    builder.add_document(2u64, "... !!! ???").unwrap();
    let file = builder.finish().unwrap();
    assert!(file.is_empty());
    assert_eq!(file.size(), 0);
}

#[test]
fn test_persisted_index_is_readable() {
    let dir = tempfile::tempdir().unwrap();
    let mut builder = IndexBuilder::new(IndexBuilderConfig {
        memory_budget: 256,
        ..Default::default()
    })
    .unwrap();
    for (doc, text) in corpus(60) {
        builder.add_document(doc, &text).unwrap();
    }
    let mut file = builder.finish().unwrap();
    let expected = read_postings(&file);

    let dest = file.persist(dir.path().join("index.chunk")).unwrap();
    let chunk = sedge_index::ChunkFile::create(&dest).unwrap();
    let got: BTreeMap<u64, Vec<(u64, u64)>> = chunk
        .reader()
        .unwrap()
        .records()
        .collect::<Result<Vec<_>>>()
        .unwrap()
        .into_iter()
        .map(|r| {
            (
                r.term().as_u64(),
                r.entries()
                    .iter()
                    .map(|e| (e.doc.as_u64(), e.count))
                    .collect(),
            )
        })
        .collect();
    assert_eq!(got, expected);
}
