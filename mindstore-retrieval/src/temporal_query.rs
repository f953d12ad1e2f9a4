//! Temporal query decomposition (spec.md §4.6 step 2): a fixed set of
//! English and Russian phrasal patterns extracted into sub-queries that
//! each get their own candidate pass, unioned back in by the caller.

/// A sub-query extracted from a temporal phrase, to be issued as its own
/// candidate retrieval pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemporalSubQuery {
    pub text: String,
}

fn patterns() -> Vec<regex::Regex> {
    const RAW: &[&str] = &[
        r"(?i)between\s+(.+?)\s+and\s+(.+)",
        r"(?i)from\s+(.+?)\s+to\s+(.+)",
        r"(?i)after\s+(.+?)\s*(?:,|\s)\s*before\s+(.+)",
        r"(?i)first time\s+(.+?)\s*(?:,|\s)\s*last time\s+(.+)",
        r"(?i)между\s+(.+?)\s+и\s+(.+)",
        r"(?i)с\s+(.+?)\s+по\s+(.+)",
        r"(?i)после\s+(.+?)\s*(?:,|\s)\s*до\s+(.+)",
    ];
    RAW.iter()
        .map(|p| regex::Regex::new(p).expect("static temporal pattern is valid"))
        .collect()
}

/// Extracts the two halves of a recognized temporal phrase (e.g. "between
/// the outage and the rollback" → `["the outage", "the rollback"]`) as
/// independent sub-queries. Returns an empty vec if nothing matches.
pub fn decompose(query: &str) -> Vec<TemporalSubQuery> {
    for re in patterns() {
        if let Some(caps) = re.captures(query) {
            let mut subs = Vec::new();
            for i in 1..caps.len() {
                if let Some(m) = caps.get(i) {
                    let text = m.as_str().trim();
                    if !text.is_empty() {
                        subs.push(TemporalSubQuery {
                            text: text.to_string(),
                        });
                    }
                }
            }
            if !subs.is_empty() {
                return subs;
            }
        }
    }
    Vec::new()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn between_and_splits_into_two_subqueries() {
        let subs = decompose("between the outage and the rollback");
        assert_eq!(
            subs,
            vec![
                TemporalSubQuery {
                    text: "the outage".into()
                },
                TemporalSubQuery {
                    text: "the rollback".into()
                },
            ]
        );
    }

    #[test]
    fn from_to_is_recognized() {
        let subs = decompose("from the deploy to the incident review");
        assert_eq!(subs.len(), 2);
    }

    #[test]
    fn russian_mezhdu_i_is_recognized() {
        let subs = decompose("между релизом и откатом");
        assert_eq!(subs.len(), 2);
    }

    #[test]
    fn non_temporal_query_decomposes_to_nothing() {
        assert!(decompose("how does the retry budget work").is_empty());
    }
}
