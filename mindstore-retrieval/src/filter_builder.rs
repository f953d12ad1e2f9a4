//! Builds the [`Filter`] clause hybrid search pushes down to the vector
//! engine (spec.md §4.6 step 1): project-id-or-global, `invalidated_by`
//! is null, validity-at-`as_of`, and `since`. Tag inclusion is applied
//! afterward against resolved `Memory` rows — the `Filter` DSL has no
//! array-contains variant, only scalar equality and range, so it isn't
//! the right tool for an array field.

use chrono::{DateTime, Utc};

use mindstore_core::traits::filter::{Filter, FilterValue};
use mindstore_core::traits::Scope;

pub fn build(scope: &Scope, since: Option<DateTime<Utc>>, as_of: DateTime<Utc>) -> Filter {
    let mut must = vec![
        Filter::is_null("invalidated_by"),
        Filter::null_or_lte("valid_from", as_of),
        Filter::null_or_gt("valid_until", as_of),
    ];

    if let Scope::Project(id) = scope {
        must.push(Filter::should([
            Filter::eq_text("project_id", id.clone()),
            Filter::is_null("project_id"),
        ]));
    }

    if let Some(since) = since {
        must.push(Filter::Range {
            field: "created_at".to_string(),
            gte: Some(FilterValue::Timestamp(since)),
            lte: None,
            lt: None,
            gt: None,
        });
    }

    Filter::must(must)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn project_scope_adds_should_clause() {
        let filter = build(&Scope::Project("acme".into()), None, Utc::now());
        match filter {
            Filter::Must(clauses) => assert!(clauses.len() >= 4),
            _ => panic!("expected Must"),
        }
    }

    #[test]
    fn global_scope_has_no_project_clause() {
        let filter = build(&Scope::Global, None, Utc::now());
        match filter {
            Filter::Must(clauses) => assert_eq!(clauses.len(), 3),
            _ => panic!("expected Must"),
        }
    }
}
