//! Match predicates evaluated against stored documents.
//!
//! A [`Filter`] is the `match` half of every view pipeline and of the
//! bulk-delete calls issued by the integrity orchestrator. Store adapters
//! evaluate it in process with [`Filter::matches`].

pub mod normalizers;

pub use normalizers::*;

use regex::Regex;
use serde_json::Value;

use crate::{id::EntityId, types::Document};

#[derive(Debug, Clone)]
pub enum Filter {
    /// Matches every document.
    All,
    Equals {
        field: String,
        value: Value,
    },
    /// Field equals any of the given values.
    In {
        field: String,
        values: Vec<Value>,
    },
    /// Field is present and not null.
    Exists {
        field: String,
    },
    /// Array field contains the value.
    ArrayContains {
        field: String,
        value: Value,
    },
    /// Array field holds at least one element.
    NonEmpty {
        field: String,
    },
    /// String field matches the (already escaped, case-insensitive) pattern.
    Text {
        field: String,
        pattern: Regex,
    },
    And(Vec<Filter>),
    Or(Vec<Filter>),
}

impl Filter {
    #[inline]
    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::Equals {
            field: field.into(),
            value: value.into(),
        }
    }

    #[inline]
    pub fn id_eq(field: impl Into<String>, id: &EntityId) -> Self {
        Self::eq(field, id)
    }

    #[inline]
    pub fn ids_in<'a>(field: impl Into<String>, ids: impl IntoIterator<Item = &'a EntityId>) -> Self {
        Self::In {
            field: field.into(),
            values: ids.into_iter().map(Value::from).collect(),
        }
    }

    #[inline]
    pub fn exists(field: impl Into<String>) -> Self {
        Self::Exists { field: field.into() }
    }

    #[inline]
    pub fn array_contains(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::ArrayContains {
            field: field.into(),
            value: value.into(),
        }
    }

    #[inline]
    pub fn non_empty(field: impl Into<String>) -> Self {
        Self::NonEmpty { field: field.into() }
    }

    #[inline]
    pub fn text(field: impl Into<String>, pattern: Regex) -> Self {
        Self::Text {
            field: field.into(),
            pattern,
        }
    }

    /// Combine conditions with AND logic.
    #[inline]
    pub fn and(conditions: impl IntoIterator<Item = Filter>) -> Self {
        Self::And(conditions.into_iter().collect())
    }

    /// Combine conditions with OR logic.
    #[inline]
    pub fn or(conditions: impl IntoIterator<Item = Filter>) -> Self {
        Self::Or(conditions.into_iter().collect())
    }

    pub fn matches(&self, document: &Document) -> bool {
        match self {
            Self::All => true,
            Self::Equals { field, value } => value_at(document, field) == Some(value),
            Self::In { field, values } => value_at(document, field).is_some_and(|found| values.contains(found)),
            Self::Exists { field } => value_at(document, field).is_some_and(|found| !found.is_null()),
            Self::ArrayContains { field, value } => value_at(document, field)
                .and_then(Value::as_array)
                .is_some_and(|items| items.contains(value)),
            Self::NonEmpty { field } => value_at(document, field)
                .and_then(Value::as_array)
                .is_some_and(|items| !items.is_empty()),
            Self::Text { field, pattern } => value_at(document, field)
                .and_then(Value::as_str)
                .is_some_and(|text| pattern.is_match(text)),
            Self::And(conditions) => conditions.iter().all(|condition| condition.matches(document)),
            // Empty OR matches nothing.
            Self::Or(conditions) => conditions.iter().any(|condition| condition.matches(document)),
        }
    }
}

/// Resolves a dotted path (`owner.username`) inside a document.
pub fn value_at<'a>(document: &'a Document, path: &str) -> Option<&'a Value> {
    let mut segments = path.split('.');
    let first = segments.next()?;
    let mut current = document.get(first)?;
    for segment in segments {
        current = current.as_object()?.get(segment)?;
    }
    Some(current)
}
