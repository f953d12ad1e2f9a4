use mindstore_core::constants::{BM25_B, BM25_K1};

/// Robertson/Sparck-Jones inverse document frequency with a `+1` inside
/// the log so it never goes negative for common terms (matches the
/// convention used by most production BM25 implementations).
pub fn idf(total_docs: usize, doc_freq: usize) -> f64 {
    let n = total_docs as f64;
    let df = doc_freq as f64;
    ((n - df + 0.5) / (df + 0.5) + 1.0).ln()
}

/// Per-term BM25 contribution for one document.
pub fn term_score(idf: f64, term_freq: usize, doc_len: usize, avg_doc_len: f64) -> f64 {
    if avg_doc_len <= 0.0 {
        return 0.0;
    }
    let tf = term_freq as f64;
    let numerator = tf * (BM25_K1 + 1.0);
    let denominator = tf + BM25_K1 * (1.0 - BM25_B + BM25_B * (doc_len as f64 / avg_doc_len));
    idf * (numerator / denominator)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn idf_decreases_as_doc_freq_grows() {
        let rare = idf(1000, 1);
        let common = idf(1000, 500);
        assert!(rare > common);
    }

    #[test]
    fn idf_never_negative_for_small_corpora() {
        assert!(idf(2, 2) >= 0.0);
        assert!(idf(1, 1) >= 0.0);
    }

    #[test]
    fn term_score_rewards_higher_term_frequency() {
        let low = term_score(1.0, 1, 100, 100.0);
        let high = term_score(1.0, 5, 100, 100.0);
        assert!(high > low);
    }

    #[test]
    fn term_score_penalizes_longer_documents() {
        let short = term_score(1.0, 2, 50, 100.0);
        let long = term_score(1.0, 2, 300, 100.0);
        assert!(short > long);
    }
}
