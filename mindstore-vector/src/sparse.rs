//! A lightweight term-hashing sparse vector, standing in for a managed
//! server-side lexical model (spec.md §4.4 "the sparse vector is a
//! server-side lexical model"). Qdrant's managed text-embedding
//! integrations require inference infrastructure this workspace doesn't
//! carry; hashing terms into a fixed-width sparse vector gets the same
//! two-lane dense+sparse shape without it, at the cost of true BM25-grade
//! relevance. Index collisions are accepted as the tradeoff for staying
//! dependency-free.

const DIMS: u32 = 1 << 16;

fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(|t| t.to_lowercase())
        .collect()
}

fn term_index(term: &str) -> u32 {
    (blake3::hash(term.as_bytes()).as_bytes()[0] as u32
        | (blake3::hash(term.as_bytes()).as_bytes()[1] as u32) << 8)
        % DIMS
}

/// `(indices, values)` pair ready for a Qdrant named sparse vector.
pub fn encode(text: &str) -> (Vec<u32>, Vec<f32>) {
    use std::collections::HashMap;
    let mut counts: HashMap<u32, f32> = HashMap::new();
    for term in tokenize(text) {
        *counts.entry(term_index(&term)).or_insert(0.0) += 1.0;
    }
    let total: f32 = counts.values().sum::<f32>().max(1.0);
    let mut indices: Vec<u32> = counts.keys().copied().collect();
    indices.sort_unstable();
    let values = indices.iter().map(|i| counts[i] / total).collect();
    (indices, values)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_text_encodes_identically() {
        let (i1, v1) = encode("race condition in flush path");
        let (i2, v2) = encode("race condition in flush path");
        assert_eq!(i1, i2);
        assert_eq!(v1, v2);
    }

    #[test]
    fn empty_text_has_no_nonzero_dims() {
        let (indices, _) = encode("");
        assert!(indices.is_empty());
    }
}
