//! Declarative read pipelines.
//!
//! A [`Pipeline`] is an ordered list of [`Stage`]s evaluated against one
//! collection. Views describe their joins, counts and projections as data and
//! [`evaluate`] runs them against any [`EntityStore`]. A leading `Match` is
//! pushed down into [`EntityStore::find`]; every lookup stage issues one
//! batched `find` for all rows it joins, never one per row.
//!
//! Nested lookup pipelines run once over the union of joined rows, so only
//! row-local stages (match, lookup, first, size, any, project, unset) are
//! meaningful inside them.

use std::cmp::Ordering;

use chrono::{DateTime, Utc};
use futures::future::{FutureExt, LocalBoxFuture};
use serde_json::{Map, Value};

use crate::{
    errors::StoreError,
    filters::{Filter, value_at},
    search::{PageRequest, SortOrder, SortSpec, ValueKind},
    store::EntityStore,
    types::{Collection, Document, ID_FIELD},
};

/// Field holding the page slice in a facet output row.
pub const FACET_ITEMS: &str = "items";
/// Field holding the pre-pagination row count in a facet output row.
pub const FACET_TOTAL: &str = "total";

#[derive(Debug, Clone)]
pub struct Lookup {
    pub from: Collection,
    pub local_field: String,
    pub foreign_field: String,
    pub as_field: String,
    pub pipeline: Pipeline,
}

#[derive(Debug, Clone)]
pub struct Facet {
    pub page: PageRequest,
    /// Stages applied to the page slice only.
    pub items: Pipeline,
}

#[derive(Debug, Clone)]
pub enum Stage {
    Match(Filter),
    /// Left join: `as_field` becomes the array of foreign rows whose
    /// `foreign_field` equals the local value (or any element of a local array,
    /// preserving the local order).
    Lookup(Box<Lookup>),
    /// Replaces an array field with its first element, or null.
    First(String),
    Size { field: String, into: String },
    Any { field: String, into: String },
    /// Keeps `_id` and the listed fields.
    Project(Vec<String>),
    Unset(Vec<String>),
    Sort(SortSpec),
    Skip(u64),
    Limit(u64),
    /// Collapses the stream into one `{items, total}` row.
    Facet(Box<Facet>),
}

#[derive(Debug, Clone, Default)]
pub struct Pipeline {
    stages: Vec<Stage>,
}

impl Pipeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    fn push(mut self, stage: Stage) -> Self {
        self.stages.push(stage);
        self
    }

    pub fn matching(self, filter: Filter) -> Self {
        self.push(Stage::Match(filter))
    }

    pub fn lookup(
        self,
        from: Collection,
        local_field: impl Into<String>,
        foreign_field: impl Into<String>,
        as_field: impl Into<String>,
    ) -> Self {
        self.lookup_with(from, local_field, foreign_field, as_field, Pipeline::new())
    }

    pub fn lookup_with(
        self,
        from: Collection,
        local_field: impl Into<String>,
        foreign_field: impl Into<String>,
        as_field: impl Into<String>,
        pipeline: Pipeline,
    ) -> Self {
        self.push(Stage::Lookup(Box::new(Lookup {
            from,
            local_field: local_field.into(),
            foreign_field: foreign_field.into(),
            as_field: as_field.into(),
            pipeline,
        })))
    }

    pub fn first(self, field: impl Into<String>) -> Self {
        self.push(Stage::First(field.into()))
    }

    pub fn size(self, field: impl Into<String>, into: impl Into<String>) -> Self {
        self.push(Stage::Size {
            field: field.into(),
            into: into.into(),
        })
    }

    pub fn any(self, field: impl Into<String>, into: impl Into<String>) -> Self {
        self.push(Stage::Any {
            field: field.into(),
            into: into.into(),
        })
    }

    pub fn project<I, F>(self, fields: I) -> Self
    where
        I: IntoIterator<Item = F>,
        F: Into<String>,
    {
        self.push(Stage::Project(fields.into_iter().map(Into::into).collect()))
    }

    pub fn unset<I, F>(self, fields: I) -> Self
    where
        I: IntoIterator<Item = F>,
        F: Into<String>,
    {
        self.push(Stage::Unset(fields.into_iter().map(Into::into).collect()))
    }

    pub fn sort(self, spec: SortSpec) -> Self {
        self.push(Stage::Sort(spec))
    }

    pub fn skip(self, count: u64) -> Self {
        self.push(Stage::Skip(count))
    }

    pub fn limit(self, count: u64) -> Self {
        self.push(Stage::Limit(count))
    }

    pub fn facet(self, page: PageRequest, items: Pipeline) -> Self {
        self.push(Stage::Facet(Box::new(Facet { page, items })))
    }

    pub fn extend(mut self, other: Pipeline) -> Self {
        self.stages.extend(other.stages);
        self
    }

    /// Splits off the leading match stages so they can be pushed into `find`.
    fn split_leading_match(&self) -> (Filter, &[Stage]) {
        let leading = self
            .stages
            .iter()
            .take_while(|stage| matches!(stage, Stage::Match(_)))
            .count();
        let mut filters: Vec<Filter> = self.stages[..leading]
            .iter()
            .filter_map(|stage| match stage {
                Stage::Match(filter) => Some(filter.clone()),
                _ => None,
            })
            .collect();
        let filter = match filters.len() {
            0 => Filter::All,
            1 => filters.remove(0),
            _ => Filter::And(filters),
        };
        (filter, &self.stages[leading..])
    }
}

/// Runs `pipeline` over `collection`.
pub async fn evaluate<S>(store: &S, collection: Collection, pipeline: &Pipeline) -> Result<Vec<Document>, StoreError>
where
    S: EntityStore + ?Sized,
{
    let (filter, rest) = pipeline.split_leading_match();
    let rows = store.find(collection, &filter).await?;
    apply(store, rows, rest).await
}

fn apply<'a, S>(
    store: &'a S,
    rows: Vec<Document>,
    stages: &'a [Stage],
) -> LocalBoxFuture<'a, Result<Vec<Document>, StoreError>>
where
    S: EntityStore + ?Sized,
{
    async move {
        let mut rows = rows;
        for stage in stages {
            rows = match stage {
                Stage::Match(filter) => rows.into_iter().filter(|row| filter.matches(row)).collect(),
                Stage::Lookup(lookup) => join(store, rows, lookup).await?,
                Stage::First(field) => {
                    for row in &mut rows {
                        let first = row
                            .get(field)
                            .and_then(Value::as_array)
                            .and_then(|items| items.first().cloned())
                            .unwrap_or(Value::Null);
                        row.insert(field.clone(), first);
                    }
                    rows
                }
                Stage::Size { field, into } => {
                    for row in &mut rows {
                        let size = row.get(field).and_then(Value::as_array).map_or(0, Vec::len);
                        row.insert(into.clone(), Value::from(size as u64));
                    }
                    rows
                }
                Stage::Any { field, into } => {
                    for row in &mut rows {
                        let any = row
                            .get(field)
                            .and_then(Value::as_array)
                            .is_some_and(|items| !items.is_empty());
                        row.insert(into.clone(), Value::Bool(any));
                    }
                    rows
                }
                Stage::Project(fields) => rows
                    .into_iter()
                    .map(|mut row| {
                        row.retain(|key, _| key == ID_FIELD || fields.iter().any(|field| field == key));
                        row
                    })
                    .collect(),
                Stage::Unset(fields) => {
                    for row in &mut rows {
                        for field in fields {
                            row.remove(field);
                        }
                    }
                    rows
                }
                Stage::Sort(spec) => {
                    // Stable: ties keep insertion order.
                    rows.sort_by(|left, right| compare_rows(left, right, spec));
                    rows
                }
                Stage::Skip(count) => rows.into_iter().skip(clamp(*count)).collect(),
                Stage::Limit(count) => rows.into_iter().take(clamp(*count)).collect(),
                Stage::Facet(facet) => {
                    let total = rows.len() as u64;
                    let slice: Vec<Document> = rows
                        .into_iter()
                        .skip(clamp(facet.page.offset()))
                        .take(clamp(facet.page.limit))
                        .collect();
                    let items = apply(store, slice, facet.items.stages()).await?;
                    let mut out = Map::new();
                    out.insert(
                        FACET_ITEMS.to_string(),
                        Value::Array(items.into_iter().map(Value::Object).collect()),
                    );
                    out.insert(FACET_TOTAL.to_string(), Value::from(total));
                    vec![out]
                }
            };
        }
        Ok(rows)
    }
    .boxed_local()
}

async fn join<S>(store: &S, mut rows: Vec<Document>, lookup: &Lookup) -> Result<Vec<Document>, StoreError>
where
    S: EntityStore + ?Sized,
{
    let mut keys: Vec<Value> = Vec::new();
    for row in &rows {
        match value_at(row, &lookup.local_field) {
            Some(Value::Array(items)) => {
                for item in items {
                    if !item.is_null() && !keys.contains(item) {
                        keys.push(item.clone());
                    }
                }
            }
            Some(Value::Null) | None => {}
            Some(value) => {
                if !keys.contains(value) {
                    keys.push(value.clone());
                }
            }
        }
    }

    let foreign = if keys.is_empty() {
        Vec::new()
    } else {
        let filter = Filter::In {
            field: lookup.foreign_field.clone(),
            values: keys,
        };
        let found = store.find(lookup.from, &filter).await?;
        apply(store, found, lookup.pipeline.stages()).await?
    };

    let matching = |key: &Value| {
        foreign
            .iter()
            .filter(|candidate| value_at(candidate, &lookup.foreign_field) == Some(key))
            .map(|candidate| Value::Object(candidate.clone()))
            .collect::<Vec<_>>()
    };

    for row in &mut rows {
        let joined: Vec<Value> = match value_at(row, &lookup.local_field) {
            Some(Value::Array(items)) => items.iter().flat_map(|item| matching(item)).collect(),
            Some(Value::Null) | None => Vec::new(),
            Some(value) => matching(value),
        };
        row.insert(lookup.as_field.clone(), Value::Array(joined));
    }
    Ok(rows)
}

fn clamp(count: u64) -> usize {
    usize::try_from(count).unwrap_or(usize::MAX)
}

fn compare_rows(left: &Document, right: &Document, spec: &SortSpec) -> Ordering {
    let ordering = compare_values(value_at(left, spec.path), value_at(right, spec.path), spec.kind);
    match spec.order {
        SortOrder::Asc => ordering,
        SortOrder::Desc => ordering.reverse(),
    }
}

/// Total order over JSON scalars: missing and null first, then booleans,
/// numbers and strings.
///
/// Under [`ValueKind::Timestamp`] strings that parse as RFC 3339 compare
/// chronologically and sort before strings that do not parse.
pub fn compare_values(left: Option<&Value>, right: Option<&Value>, kind: ValueKind) -> Ordering {
    fn rank(value: Option<&Value>) -> u8 {
        match value {
            None | Some(Value::Null) => 0,
            Some(Value::Bool(_)) => 1,
            Some(Value::Number(_)) => 2,
            Some(Value::String(_)) => 3,
            Some(Value::Array(_)) => 4,
            Some(Value::Object(_)) => 5,
        }
    }

    match (left, right) {
        (Some(Value::Bool(a)), Some(Value::Bool(b))) => a.cmp(b),
        (Some(Value::Number(a)), Some(Value::Number(b))) => {
            let a = a.as_f64().unwrap_or(f64::NAN);
            let b = b.as_f64().unwrap_or(f64::NAN);
            a.partial_cmp(&b).unwrap_or(Ordering::Equal)
        }
        (Some(Value::String(a)), Some(Value::String(b))) => match kind {
            ValueKind::Text => a.cmp(b),
            ValueKind::Timestamp => match (a.parse::<DateTime<Utc>>(), b.parse::<DateTime<Utc>>()) {
                (Ok(a), Ok(b)) => a.cmp(&b),
                (Ok(_), Err(_)) => Ordering::Less,
                (Err(_), Ok(_)) => Ordering::Greater,
                (Err(_), Err(_)) => a.cmp(b),
            },
        },
        _ => rank(left).cmp(&rank(right)),
    }
}
