//! In-process evaluator for the tagged-variant [`Filter`] DSL, used by the
//! built-in vector mode: since the relational engine's brute-force search
//! has no query planner to push filters into, clauses are evaluated
//! against each candidate's JSON payload after scoring.

use chrono::{DateTime, Utc};
use mindstore_core::traits::filter::{Filter, FilterValue};
use serde_json::Value;

pub fn matches(filter: &Filter, payload: &Value) -> bool {
    match filter {
        Filter::Must(clauses) => clauses.iter().all(|c| matches(c, payload)),
        Filter::Should(clauses) => {
            clauses.is_empty() || clauses.iter().any(|c| matches(c, payload))
        }
        Filter::IsNull { field } => payload.get(field).map(Value::is_null).unwrap_or(true),
        Filter::MatchValue { field, value } => payload
            .get(field)
            .map(|actual| value_eq(actual, value))
            .unwrap_or(false),
        Filter::Range {
            field,
            lte,
            gte,
            lt,
            gt,
        } => {
            let Some(actual) = payload.get(field).filter(|v| !v.is_null()) else {
                return false;
            };
            in_range(actual, lte.as_ref(), gte.as_ref(), lt.as_ref(), gt.as_ref())
        }
    }
}

fn value_eq(actual: &Value, expected: &FilterValue) -> bool {
    match expected {
        FilterValue::Text(s) => actual.as_str() == Some(s.as_str()),
        FilterValue::Integer(i) => actual.as_i64() == Some(*i),
        FilterValue::Float(f) => actual.as_f64() == Some(*f),
        FilterValue::Timestamp(ts) => as_timestamp(actual) == Some(*ts),
    }
}

fn as_timestamp(v: &Value) -> Option<DateTime<Utc>> {
    v.as_str()
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&Utc))
}

fn as_f64(v: &Value) -> Option<f64> {
    v.as_f64().or_else(|| as_timestamp(v).map(|dt| dt.timestamp() as f64))
}

fn bound_f64(bound: Option<&FilterValue>) -> Option<f64> {
    bound.and_then(|b| match b {
        FilterValue::Text(_) => None,
        FilterValue::Integer(i) => Some(*i as f64),
        FilterValue::Float(f) => Some(*f),
        FilterValue::Timestamp(ts) => Some(ts.timestamp() as f64),
    })
}

fn in_range(
    actual: &Value,
    lte: Option<&FilterValue>,
    gte: Option<&FilterValue>,
    lt: Option<&FilterValue>,
    gt: Option<&FilterValue>,
) -> bool {
    let Some(actual) = as_f64(actual) else {
        return false;
    };
    if let Some(b) = bound_f64(lte) {
        if actual > b {
            return false;
        }
    }
    if let Some(b) = bound_f64(gte) {
        if actual < b {
            return false;
        }
    }
    if let Some(b) = bound_f64(lt) {
        if actual >= b {
            return false;
        }
    }
    if let Some(b) = bound_f64(gt) {
        if actual <= b {
            return false;
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn is_null_matches_missing_and_null_fields() {
        let payload = json!({"a": null});
        assert!(matches(&Filter::is_null("a"), &payload));
        assert!(matches(&Filter::is_null("b"), &payload));
    }

    #[test]
    fn should_with_no_clauses_matches_everything() {
        assert!(matches(&Filter::Should(vec![]), &json!({})));
    }

    #[test]
    fn match_value_rejects_wrong_type() {
        let payload = json!({"tag": "dead-end"});
        assert!(!matches(&Filter::eq_int("tag", 1), &payload));
        assert!(matches(&Filter::eq_text("tag", "dead-end"), &payload));
    }
}
