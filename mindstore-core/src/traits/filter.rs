use serde::{Deserialize, Serialize};

/// Tagged-variant filter DSL (spec.md §4.4, §9 "Filter DSL passed as
/// untyped objects"). Both the built-in relational backend and the
/// external vector engine translate this at their own boundary instead of
/// accepting an untyped query object.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum Filter {
    /// All of these must hold.
    Must(Vec<Filter>),
    /// At least one of these must hold.
    Should(Vec<Filter>),
    /// The field is absent or JSON null.
    IsNull { field: String },
    /// The field equals this value exactly.
    MatchValue { field: String, value: FilterValue },
    /// The field falls within this numeric/temporal range.
    Range {
        field: String,
        lte: Option<FilterValue>,
        gte: Option<FilterValue>,
        lt: Option<FilterValue>,
        gt: Option<FilterValue>,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum FilterValue {
    Text(String),
    Integer(i64),
    Float(f64),
    Timestamp(chrono::DateTime<chrono::Utc>),
}

impl Filter {
    pub fn must(clauses: impl IntoIterator<Item = Filter>) -> Self {
        Self::Must(clauses.into_iter().collect())
    }

    pub fn should(clauses: impl IntoIterator<Item = Filter>) -> Self {
        Self::Should(clauses.into_iter().collect())
    }

    pub fn eq_text(field: impl Into<String>, value: impl Into<String>) -> Self {
        Self::MatchValue {
            field: field.into(),
            value: FilterValue::Text(value.into()),
        }
    }

    pub fn eq_int(field: impl Into<String>, value: i64) -> Self {
        Self::MatchValue {
            field: field.into(),
            value: FilterValue::Integer(value),
        }
    }

    pub fn is_null(field: impl Into<String>) -> Self {
        Self::IsNull { field: field.into() }
    }

    /// `field is null OR field <= at` — the "one side of validity" clause
    /// used twice per temporal predicate (spec.md §4.4).
    pub fn null_or_lte(field: impl Into<String>, at: chrono::DateTime<chrono::Utc>) -> Self {
        let field = field.into();
        Self::should([
            Self::is_null(field.clone()),
            Self::Range {
                field,
                lte: Some(FilterValue::Timestamp(at)),
                gte: None,
                lt: None,
                gt: None,
            },
        ])
    }

    /// `field is null OR field > at`.
    pub fn null_or_gt(field: impl Into<String>, at: chrono::DateTime<chrono::Utc>) -> Self {
        let field = field.into();
        Self::should([
            Self::is_null(field.clone()),
            Self::Range {
                field,
                lte: None,
                gte: None,
                lt: None,
                gt: Some(FilterValue::Timestamp(at)),
            },
        ])
    }
}
