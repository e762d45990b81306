//! Sorting and pagination for composed views.
//!
//! Two pagination strategies are supported and intentionally behave
//! differently:
//!
//! | Strategy | Entry point | Input handling | Store round trips |
//! |----------|-------------|----------------|-------------------|
//! | offset   | [`PageRequest`] + [`Pipeline::facet`] | strict, rejects out-of-range input | one pipeline pass |
//! | library  | [`paginate`] | lenient, normalizes page and limit | count query + slice query |
//!
//! Sort keys are never passed through from the client. Each entity exposes an
//! enum of sortable fields; [`parse_sort`] maps a client name onto it and
//! rejects anything else.

use std::str::FromStr;

use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::Value;

#[cfg(feature = "utoipa")]
use utoipa::ToSchema;

use crate::{
    errors::{CoreError, StoreError, ValidationError},
    filters::Filter,
    pipeline::Pipeline,
    store::EntityStore,
    types::Collection,
};

pub const DEFAULT_PAGE: u64 = 1;
pub const DEFAULT_LIMIT: u64 = 10;
pub const MAX_LIMIT: u64 = 100;

#[cfg_attr(feature = "utoipa", derive(ToSchema))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

impl SortOrder {
    #[inline]
    pub const fn as_str(self) -> &'static str {
        match self {
            SortOrder::Asc => "asc",
            SortOrder::Desc => "desc",
        }
    }
}

impl FromStr for SortOrder {
    type Err = ValidationError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "asc" | "ascending" | "1" => Ok(SortOrder::Asc),
            "desc" | "descending" | "-1" => Ok(SortOrder::Desc),
            other => Err(ValidationError::single(
                "sortType",
                "validation.enum",
                format!("unsupported sort direction: {other}"),
            )),
        }
    }
}

/// How values of a sort key compare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ValueKind {
    /// Native JSON ordering; strings compare as text.
    #[default]
    Text,
    /// RFC 3339 strings compare chronologically.
    Timestamp,
}

/// A resolved sort: document path, direction and value kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortSpec {
    pub path: &'static str,
    pub order: SortOrder,
    pub kind: ValueKind,
}

/// Allow-listed sortable fields of one entity.
pub trait SortKey: Copy + Sized + 'static {
    const DEFAULT: Self;

    fn all() -> &'static [Self];

    /// Name accepted from clients.
    fn name(self) -> &'static str;

    /// Document path sorted on.
    fn path(self) -> &'static str;

    fn default_order(self) -> SortOrder;

    fn kind(self) -> ValueKind;

    fn spec(self, order: Option<SortOrder>) -> SortSpec {
        SortSpec {
            path: self.path(),
            order: order.unwrap_or_else(|| self.default_order()),
            kind: self.kind(),
        }
    }
}

macro_rules! sort_keys {
    (
        $(#[$meta:meta])*
        $name:ident default $default:ident {
            $($variant:ident => ($client:literal, $path:literal, $order:ident, $kind:ident)),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq)]
        pub enum $name {
            $($variant),+
        }

        impl SortKey for $name {
            const DEFAULT: Self = $name::$default;

            fn all() -> &'static [Self] {
                &[$($name::$variant),+]
            }

            fn name(self) -> &'static str {
                match self {
                    $($name::$variant => $client),+
                }
            }

            fn path(self) -> &'static str {
                match self {
                    $($name::$variant => $path),+
                }
            }

            fn default_order(self) -> SortOrder {
                match self {
                    $($name::$variant => SortOrder::$order),+
                }
            }

            fn kind(self) -> ValueKind {
                match self {
                    $($name::$variant => ValueKind::$kind),+
                }
            }
        }
    };
}

sort_keys! {
    /// Sortable video fields.
    VideoSort default CreatedAt {
        CreatedAt => ("createdAt", "createdAt", Desc, Timestamp),
        Views => ("views", "views", Desc, Text),
        Duration => ("duration", "duration", Asc, Text),
        Title => ("title", "title", Asc, Text),
    }
}

sort_keys! {
    CommentSort default CreatedAt {
        CreatedAt => ("createdAt", "createdAt", Desc, Timestamp),
    }
}

sort_keys! {
    TweetSort default CreatedAt {
        CreatedAt => ("createdAt", "createdAt", Desc, Timestamp),
    }
}

sort_keys! {
    PlaylistSort default CreatedAt {
        CreatedAt => ("createdAt", "createdAt", Desc, Timestamp),
        Name => ("name", "name", Asc, Text),
    }
}

/// Resolves a client-supplied sort name and direction against `K`'s allow-list.
pub fn parse_sort<K: SortKey>(sort_by: Option<&str>, sort_type: Option<&str>) -> Result<SortSpec, ValidationError> {
    let key = match sort_by.map(str::trim).filter(|name| !name.is_empty()) {
        Some(name) => K::all()
            .iter()
            .find(|key| key.name().eq_ignore_ascii_case(name))
            .copied()
            .ok_or_else(|| {
                ValidationError::single(
                    "sortBy",
                    "validation.enum",
                    format!("Unsupported sort field: {name}"),
                )
            })?,
        None => K::DEFAULT,
    };
    let order = sort_type
        .map(str::trim)
        .filter(|raw| !raw.is_empty())
        .map(SortOrder::from_str)
        .transpose()?;
    Ok(key.spec(order))
}

/// Limits applied by both pagination strategies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaginationSettings {
    #[serde(default = "default_limit")]
    pub default_limit: u64,
    #[serde(default = "max_limit")]
    pub max_limit: u64,
}

fn default_limit() -> u64 {
    DEFAULT_LIMIT
}

fn max_limit() -> u64 {
    MAX_LIMIT
}

impl Default for PaginationSettings {
    fn default() -> Self {
        Self {
            default_limit: DEFAULT_LIMIT,
            max_limit: MAX_LIMIT,
        }
    }
}

/// Rows skipped before `page`; saturates instead of overflowing.
#[inline]
fn page_offset(page: u64, limit: u64) -> u64 {
    page.saturating_sub(1).saturating_mul(limit)
}

/// Strict offset pagination request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: u64,
    pub limit: u64,
}

impl PageRequest {
    /// Validates `page >= 1` and `1 <= limit <= settings.max_limit`.
    pub fn new(page: u64, limit: u64, settings: &PaginationSettings) -> Result<Self, ValidationError> {
        let mut issues = Vec::new();
        if page == 0 {
            issues.push(crate::errors::ValidationIssue::new(
                "page",
                "validation.range",
                "page must be at least 1",
            ));
        }
        if limit == 0 || limit > settings.max_limit {
            issues.push(crate::errors::ValidationIssue::new(
                "limit",
                "validation.range",
                format!("limit must be between 1 and {}", settings.max_limit),
            ));
        } else if page.saturating_sub(1).checked_mul(limit).is_none() {
            issues.push(crate::errors::ValidationIssue::new(
                "page",
                "validation.range",
                "page is out of range",
            ));
        }
        if issues.is_empty() {
            Ok(Self { page, limit })
        } else {
            Err(ValidationError::new(issues))
        }
    }

    /// First page with the configured default limit.
    pub fn first(settings: &PaginationSettings) -> Self {
        Self {
            page: DEFAULT_PAGE,
            limit: settings.default_limit,
        }
    }

    #[inline]
    pub fn offset(&self) -> u64 {
        page_offset(self.page, self.limit)
    }
}

/// One page of an offset-paginated view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub page: u64,
    pub limit: u64,
}

impl<T> Page<T> {
    #[inline]
    pub fn has_more(&self) -> bool {
        self.page.saturating_mul(self.limit) < self.total
    }
}

/// Lenient options accepted by the library paginator.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub struct PaginateOptions {
    pub page: Option<u64>,
    pub limit: Option<u64>,
}

impl PaginateOptions {
    pub fn new(page: u64, limit: u64) -> Self {
        Self {
            page: Some(page),
            limit: Some(limit),
        }
    }

    /// Missing or zero page becomes 1; missing or zero limit becomes the
    /// default; oversize limits are clamped.
    pub fn normalize(&self, settings: &PaginationSettings) -> (u64, u64) {
        let page = self.page.filter(|page| *page > 0).unwrap_or(DEFAULT_PAGE);
        let limit = self
            .limit
            .filter(|limit| *limit > 0)
            .unwrap_or(settings.default_limit)
            .min(settings.max_limit);
        (page, limit)
    }
}

/// Result of the library paginator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaginatedDocs<T> {
    pub docs: Vec<T>,
    pub total: u64,
    pub page: u64,
    pub limit: u64,
}

/// Reusable count + skip + limit combinator.
///
/// Counts `matching` rows, then runs `matching → sort → skip → limit →
/// enrich` and decodes each row as `T`. Enrichment stages only see the slice.
pub async fn paginate<S, T>(
    store: &S,
    collection: Collection,
    matching: Filter,
    sort: Option<SortSpec>,
    enrich: Pipeline,
    options: PaginateOptions,
    settings: &PaginationSettings,
) -> Result<PaginatedDocs<T>, CoreError>
where
    S: EntityStore + ?Sized,
    T: DeserializeOwned,
{
    let (page, limit) = options.normalize(settings);
    let total = store.count(collection, &matching).await?;

    let mut pipeline = Pipeline::new().matching(matching);
    if let Some(sort) = sort {
        pipeline = pipeline.sort(sort);
    }
    let pipeline = pipeline
        .skip(page_offset(page, limit))
        .limit(limit)
        .extend(enrich);

    let rows = store.query(collection, &pipeline).await?;
    let docs = rows
        .into_iter()
        .map(|row| serde_json::from_value(Value::Object(row)))
        .collect::<Result<Vec<T>, _>>()
        .map_err(StoreError::from)?;

    Ok(PaginatedDocs {
        docs,
        total,
        page,
        limit,
    })
}
