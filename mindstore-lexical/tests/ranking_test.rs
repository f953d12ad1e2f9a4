//! Integration test: ranking behavior across a small corpus of mixed
//! code and prose documents, plus a serialize/deserialize round trip.

use mindstore_lexical::{LexicalIndex, Scope};

fn code_corpus() -> Vec<(i64, String)> {
    vec![
        (1, "pub fn retryWithBackoff(attempts: u32) {}".to_string()),
        (2, "pub fn shutdownGracefully() {}".to_string()),
        (3, "struct RetryPolicy { max_attempts: u32 }".to_string()),
    ]
}

#[test]
fn ranks_exact_identifier_above_substring_match() {
    let index = LexicalIndex::new();
    index.build(Scope::ProjectCode, &code_corpus());

    let hits = index.search(Scope::ProjectCode, "retryWithBackoff", 10);
    assert_eq!(hits.first().map(|(id, _)| *id), Some(1));
}

#[test]
fn unrelated_query_returns_no_hits() {
    let index = LexicalIndex::new();
    index.build(Scope::ProjectCode, &code_corpus());

    assert!(index
        .search(Scope::ProjectCode, "nonexistentTermZZZ", 10)
        .is_empty());
}

#[test]
fn k_limits_result_count() {
    let index = LexicalIndex::new();
    index.build(
        Scope::ProjectDocs,
        &[
            (1, "retry policy documentation".to_string()),
            (2, "retry budget documentation".to_string()),
            (3, "retry backoff documentation".to_string()),
        ],
    );

    let hits = index.search(Scope::ProjectDocs, "retry documentation", 2);
    assert_eq!(hits.len(), 2);
}

#[test]
fn serialize_deserialize_round_trip_preserves_ranking() {
    let index = LexicalIndex::new();
    index.build(Scope::ProjectCode, &code_corpus());

    let bytes = index.serialize(Scope::ProjectCode).unwrap();
    let restored = LexicalIndex::new();
    restored
        .deserialize_into(Scope::ProjectCode, &bytes)
        .unwrap();

    assert_eq!(
        index.search(Scope::ProjectCode, "retry", 10),
        restored.search(Scope::ProjectCode, "retry", 10)
    );
}
