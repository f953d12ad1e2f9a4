use std::collections::{HashMap, HashSet};

use mindstore_core::errors::{MindstoreError, MindstoreResult, StorageError};
use mindstore_tokens::{tokenize, Variant};
use serde::{Deserialize, Serialize};

use crate::bm25::{idf, term_score};

/// One scope's inverted index: token -> set of document ids, per-document
/// length, a raw lowercased content cache for exact-phrase fallback, and
/// a running total length used to compute the corpus average (spec.md
/// §4.2).
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ScopeIndex {
    variant: Option<Variant>,
    postings: HashMap<String, HashSet<i64>>,
    doc_lengths: HashMap<i64, usize>,
    raw_content: HashMap<i64, String>,
    total_length: usize,
    #[serde(skip)]
    dirty: bool,
}

impl ScopeIndex {
    pub fn build(docs: &[(i64, String)], variant: Variant) -> Self {
        let mut index = Self {
            variant: Some(variant),
            ..Default::default()
        };
        for (id, text) in docs {
            index.add(*id, text, variant);
        }
        index
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    pub fn total_docs(&self) -> usize {
        self.doc_lengths.len()
    }

    fn avg_doc_len(&self) -> f64 {
        if self.doc_lengths.is_empty() {
            0.0
        } else {
            self.total_length as f64 / self.doc_lengths.len() as f64
        }
    }

    /// Insert or replace a document. An id that already exists has its
    /// old tokens decremented before the new tokens are counted, so
    /// postings and length totals never drift (spec.md §4.2).
    pub fn add(&mut self, id: i64, text: &str, variant: Variant) {
        if self.doc_lengths.contains_key(&id) {
            self.remove(id);
        }
        self.variant = Some(variant);
        let tokens = tokenize(text, variant);
        self.doc_lengths.insert(id, tokens.len());
        self.total_length += tokens.len();
        self.raw_content.insert(id, text.to_lowercase());
        for token in tokens {
            self.postings.entry(token).or_default().insert(id);
        }
    }

    pub fn remove(&mut self, id: i64) {
        if let Some(len) = self.doc_lengths.remove(&id) {
            self.total_length = self.total_length.saturating_sub(len);
        }
        self.raw_content.remove(&id);
        self.postings.retain(|_, ids| {
            ids.remove(&id);
            !ids.is_empty()
        });
    }

    /// Top-`k` `(id, score)` pairs for `query`, BM25-ranked. Exact
    /// identifier matches (the whole, untokenized query string appears
    /// verbatim in a document's lowercased content and as one of the
    /// query's own tokens) receive a bonus equal to one IDF unit for
    /// that term.
    pub fn search(&self, query: &str, k: usize) -> Vec<(i64, f64)> {
        let variant = self.variant.unwrap_or(Variant::Prose);
        let query_tokens = tokenize(query, variant);
        if query_tokens.is_empty() {
            return Vec::new();
        }

        let total_docs = self.total_docs();
        if total_docs == 0 {
            return Vec::new();
        }
        let avg_len = self.avg_doc_len();
        let exact_needle = query.trim().to_lowercase();

        let mut distinct_terms: Vec<&String> = Vec::new();
        for t in &query_tokens {
            if !distinct_terms.iter().any(|existing| *existing == t) {
                distinct_terms.push(t);
            }
        }

        let mut scores: HashMap<i64, f64> = HashMap::new();
        for term in &distinct_terms {
            let Some(doc_ids) = self.postings.get(*term) else {
                continue;
            };
            let doc_freq = doc_ids.len();
            let term_idf = idf(total_docs, doc_freq);
            for &id in doc_ids {
                let doc_len = *self.doc_lengths.get(&id).unwrap_or(&0);
                // Term frequency within a document isn't tracked per-term
                // (only membership), so treat presence as a single
                // occurrence — adequate for short identifiers/memories.
                let contribution = term_score(term_idf, 1, doc_len, avg_len);
                *scores.entry(id).or_insert(0.0) += contribution;

                let is_exact_identifier =
                    **term == exact_needle && self.raw_content.get(&id).map_or(false, |c| c.contains(&exact_needle));
                if is_exact_identifier {
                    *scores.entry(id).or_insert(0.0) += term_idf;
                }
            }
        }

        let mut ranked: Vec<(i64, f64)> = scores.into_iter().collect();
        ranked.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        ranked.truncate(k);
        ranked
    }

    pub fn serialize(&self) -> MindstoreResult<Vec<u8>> {
        serde_json::to_vec(self).map_err(|e| {
            MindstoreError::Storage(StorageError::Serialization {
                reason: e.to_string(),
            })
        })
    }

    pub fn deserialize(bytes: &[u8]) -> MindstoreResult<Self> {
        serde_json::from_slice(bytes).map_err(|e| {
            MindstoreError::Storage(StorageError::Serialization {
                reason: e.to_string(),
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn docs() -> Vec<(i64, String)> {
        vec![
            (1, "fn useGlobalHooks() { connect() }".to_string()),
            (2, "fn disconnect() { cleanup() }".to_string()),
            (3, "useGlobalHooks is the entry point".to_string()),
        ]
    }

    #[test]
    fn build_then_search_finds_matching_docs() {
        let idx = ScopeIndex::build(&docs(), Variant::Code);
        let hits = idx.search("connect", 10);
        assert!(hits.iter().any(|(id, _)| *id == 1));
    }

    #[test]
    fn exact_identifier_match_outranks_partial() {
        let idx = ScopeIndex::build(&docs(), Variant::Code);
        let hits = idx.search("useGlobalHooks", 10);
        let top = hits.first().map(|(id, _)| *id);
        assert!(top == Some(1) || top == Some(3));
        assert!(hits.len() >= 2);
    }

    #[test]
    fn remove_decrements_postings_and_length() {
        let mut idx = ScopeIndex::build(&docs(), Variant::Code);
        idx.remove(1);
        assert_eq!(idx.total_docs(), 2);
        let hits = idx.search("connect", 10);
        assert!(!hits.iter().any(|(id, _)| *id == 1));
    }

    #[test]
    fn add_replacing_existing_id_does_not_double_count() {
        let mut idx = ScopeIndex::build(&docs(), Variant::Code);
        let before = idx.total_docs();
        idx.add(1, "fn totallyDifferent() {}", Variant::Code);
        assert_eq!(idx.total_docs(), before);
        let hits = idx.search("connect", 10);
        assert!(!hits.iter().any(|(id, _)| *id == 1));
    }

    #[test]
    fn serialize_round_trips_exactly() {
        let idx = ScopeIndex::build(&docs(), Variant::Code);
        let bytes = idx.serialize().unwrap();
        let restored = ScopeIndex::deserialize(&bytes).unwrap();
        assert_eq!(idx.total_docs(), restored.total_docs());
        let a = idx.search("useGlobalHooks", 10);
        let b = restored.search("useGlobalHooks", 10);
        assert_eq!(a, b);
    }

    #[test]
    fn empty_index_search_returns_nothing() {
        let idx = ScopeIndex::default();
        assert!(idx.search("anything", 10).is_empty());
    }
}
