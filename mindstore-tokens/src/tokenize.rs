//! Deterministic tokenization (spec.md §4.1). Both variants lowercase and
//! produce a finite `Vec<String>` — restartable in the sense that calling
//! `tokenize` twice on the same input always yields the same sequence.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Variant {
    Code,
    Prose,
}

pub fn tokenize(text: &str, variant: Variant) -> Vec<String> {
    match variant {
        Variant::Code => tokenize_code(text),
        Variant::Prose => tokenize_prose(text),
    }
}

/// Split on non-alphanumeric, then decompose each identifier run by
/// camelCase/PascalCase (preserving acronyms), emitting both the
/// decomposed parts and the whole run lowercased — the whole-run token is
/// what lets an exact identifier search (`useGlobalHooks`) outrank a
/// looser match in the lexical index (spec.md §4.2, S4).
pub fn tokenize_code(text: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    for run in alnum_runs(text) {
        let whole = run.to_lowercase();
        let words = split_camel_case(&run);
        if words.len() > 1 {
            for w in &words {
                tokens.push(w.to_lowercase());
            }
        }
        tokens.push(whole);
    }
    tokens
}

fn alnum_runs(text: &str) -> Vec<String> {
    let mut runs = Vec::new();
    let mut current = String::new();
    for c in text.chars() {
        if c.is_alphanumeric() {
            current.push(c);
        } else if !current.is_empty() {
            runs.push(std::mem::take(&mut current));
        }
    }
    if !current.is_empty() {
        runs.push(current);
    }
    runs
}

/// Split `s` at camelCase/PascalCase boundaries, keeping runs of uppercase
/// letters (acronyms) together: `HTMLParser` -> `["HTML", "Parser"]`.
fn split_camel_case(s: &str) -> Vec<String> {
    let chars: Vec<char> = s.chars().collect();
    let mut words = Vec::new();
    let mut current = String::new();

    for i in 0..chars.len() {
        let c = chars[i];
        if i > 0 {
            let prev = chars[i - 1];
            let next = chars.get(i + 1);
            let lower_to_upper = prev.is_lowercase() && c.is_uppercase();
            let acronym_to_word = prev.is_uppercase()
                && c.is_uppercase()
                && next.map(|n| n.is_lowercase()).unwrap_or(false);
            let letter_to_digit = prev.is_alphabetic() && c.is_numeric();
            let digit_to_letter = prev.is_numeric() && c.is_alphabetic();
            if lower_to_upper || acronym_to_word || letter_to_digit || digit_to_letter {
                words.push(std::mem::take(&mut current));
            }
        }
        current.push(c);
    }
    if !current.is_empty() {
        words.push(current);
    }
    words
}

fn markdown_link_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\[([^\]]*)\]\([^)]*\)").unwrap())
}

fn markdown_syntax_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    // Bold/italic markers, inline code fences, header/quote/list markers.
    RE.get_or_init(|| Regex::new(r"[*_`#>]+|^[-+]\s+").unwrap())
}

/// Strip Markdown formatting, keeping link *labels* but dropping URLs.
fn strip_markdown(text: &str) -> String {
    let delinked = markdown_link_re().replace_all(text, "$1");
    markdown_syntax_re().replace_all(&delinked, " ").into_owned()
}

/// Suffixes tried longest-first so e.g. "question" stems on `-tion`, not
/// a spurious shorter match.
const STEM_SUFFIXES: [&str; 5] = ["tion", "ing", "ed", "ly", "s"];

/// Remove one trailing suffix if the remaining stem is at least 3 chars.
/// Returns `None` when no suffix applies (caller then only emits the
/// original form).
fn light_stem(word: &str) -> Option<String> {
    for suffix in STEM_SUFFIXES {
        if word.len() > suffix.len() && word.ends_with(suffix) {
            let stem_len = word.len() - suffix.len();
            if stem_len >= 3 {
                return Some(word[..stem_len].to_string());
            }
        }
    }
    None
}

/// Strip Markdown, extract link labels, apply the light suffix stemmer,
/// and keep tokens longer than 2 chars — emitting both the stemmed and
/// original form (spec.md §4.1).
pub fn tokenize_prose(text: &str) -> Vec<String> {
    let cleaned = strip_markdown(text);
    let mut tokens = Vec::new();
    for word in cleaned.split(|c: char| !c.is_alphanumeric()) {
        if word.chars().count() <= 2 {
            continue;
        }
        let lower = word.to_lowercase();
        tokens.push(lower.clone());
        if let Some(stem) = light_stem(&lower) {
            if stem != lower {
                tokens.push(stem);
            }
        }
    }
    tokens
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn camel_case_preserves_acronyms() {
        assert_eq!(
            tokenize_code("HTMLParser"),
            vec!["html", "parser", "htmlparser"]
        );
    }

    #[test]
    fn snake_and_kebab_split_on_non_alnum() {
        let toks = tokenize_code("my_function-name");
        assert_eq!(toks, vec!["my", "function", "name"]);
    }

    #[test]
    fn exact_identifier_token_present_for_phrase_match() {
        let toks = tokenize_code("useGlobalHooks()");
        assert!(toks.contains(&"useglobalhooks".to_string()));
        assert!(toks.contains(&"use".to_string()));
        assert!(toks.contains(&"global".to_string()));
        assert!(toks.contains(&"hooks".to_string()));
    }

    #[test]
    fn prose_drops_urls_keeps_labels() {
        let toks = tokenize_prose("See the [rate limiter](https://example.com/docs) guide.");
        assert!(toks.contains(&"rate".to_string()));
        assert!(toks.contains(&"limiter".to_string()));
        assert!(!toks.iter().any(|t| t.contains("example")));
    }

    #[test]
    fn prose_emits_stem_and_original() {
        let toks = tokenize_prose("Running tests quickly");
        assert!(toks.contains(&"running".to_string()));
        assert!(toks.contains(&"runn".to_string()));
        assert!(toks.contains(&"quickly".to_string()));
        assert!(toks.contains(&"quick".to_string()));
    }

    #[test]
    fn prose_drops_short_tokens() {
        let toks = tokenize_prose("a an of it is");
        assert!(toks.is_empty());
    }

    #[test]
    fn both_variants_lowercase_and_deterministic() {
        let a = tokenize("FooBar Baz", Variant::Code);
        let b = tokenize("FooBar Baz", Variant::Code);
        assert_eq!(a, b);
        assert!(a.iter().all(|t| t.chars().all(|c| !c.is_uppercase())));
    }
}
