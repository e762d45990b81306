use std::borrow::Cow;

use thiserror::Error;

use crate::integrity::CascadeReport;

/// Top-level error type returned by vidshare operations.
#[derive(Debug, Error)]
pub enum CoreError {
    /// A path parameter is not a well-formed entity identifier.
    #[error("invalid {field} id: {value:?}")]
    InvalidIdentifier { field: &'static str, value: String },

    /// Validation failed for one or more fields.
    #[error("validation failed: {0}")]
    Validation(#[from] ValidationError),

    /// Referenced entity does not exist.
    #[error("{entity} not found")]
    NotFound { entity: &'static str, id: Option<String> },

    /// The actor does not own the entity it tried to mutate.
    #[error("only the owner can modify this {entity}")]
    Forbidden { entity: &'static str },

    /// The requested state already holds (duplicate membership or unique value).
    #[error("{message}")]
    AlreadyExists { message: Cow<'static, str> },

    /// A relation changed underneath a toggle; retrying observes the committed state.
    #[error("relation {key} changed concurrently, retry the toggle")]
    StateConflict { key: String },

    /// The primary delete succeeded but dependent cleanup partially failed.
    #[error(transparent)]
    Cascade(#[from] CascadeError),

    /// Entity store or blob store fault.
    #[error("storage unavailable: {0}")]
    StorageUnavailable(#[from] StorageFault),
}

impl CoreError {
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: Some(id.to_string()),
        }
    }

    pub fn already_exists(message: impl Into<Cow<'static, str>>) -> Self {
        Self::AlreadyExists {
            message: message.into(),
        }
    }

    /// HTTP-style status code carried by the response envelope.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::InvalidIdentifier { .. } | Self::Validation(_) => 400,
            Self::Forbidden { .. } => 403,
            Self::NotFound { .. } => 404,
            Self::AlreadyExists { .. } | Self::StateConflict { .. } => 409,
            Self::Cascade(_) | Self::StorageUnavailable(_) => 500,
        }
    }
}

impl From<StoreError> for CoreError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Conflict { key } => Self::StateConflict { key },
            other => Self::StorageUnavailable(StorageFault::Store(other)),
        }
    }
}

impl From<BlobError> for CoreError {
    fn from(err: BlobError) -> Self {
        Self::StorageUnavailable(StorageFault::Blob(err))
    }
}

/// Infrastructure failure wrapped by [`CoreError::StorageUnavailable`].
#[derive(Debug, Error)]
pub enum StorageFault {
    #[error(transparent)]
    Store(StoreError),
    #[error(transparent)]
    Blob(BlobError),
}

/// Errors raised by [`crate::store::EntityStore`] adapters.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Underlying Redis command failed.
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),

    /// A stored document could not be encoded or decoded.
    #[error("document serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A uniqueness guard rejected the write.
    #[error("unique key {key} is held by another record")]
    Conflict { key: String },

    /// An in-process store lock was poisoned by a panicking writer.
    #[error("store lock poisoned")]
    Poisoned,

    #[error("{message}")]
    Other { message: Cow<'static, str> },
}

/// Errors raised by [`crate::blob::BlobStore`] adapters.
#[derive(Debug, Error)]
pub enum BlobError {
    #[error("blob io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("blob url {url} is not managed by this store")]
    ForeignUrl { url: String },

    #[error("upload rejected: {message}")]
    Rejected { message: String },
}

/// Aggregated failure of the dependent cleanup that follows a primary delete.
///
/// The primary record is already gone when this is returned; the report lists
/// every step and its outcome.
#[derive(Debug, Error)]
#[error(
    "{} {} deleted but {} dependent cleanup step(s) failed",
    report.collection.entity_name(),
    report.id,
    report.cleanup_failures().count()
)]
pub struct CascadeError {
    pub report: CascadeReport,
}

/// Collection of validation issues encountered while preparing a mutation.
#[derive(Debug, Error)]
#[error("{}", render_issues(&self.issues))]
pub struct ValidationError {
    pub issues: Vec<ValidationIssue>,
}

fn render_issues(issues: &[ValidationIssue]) -> String {
    issues
        .iter()
        .map(|issue| format!("{}: {}", issue.field, issue.message))
        .collect::<Vec<_>>()
        .join("; ")
}

impl ValidationError {
    pub fn new<I>(issues: I) -> Self
    where
        I: IntoIterator<Item = ValidationIssue>,
    {
        Self {
            issues: issues.into_iter().collect(),
        }
    }

    /// Convenience helper for constructing a single-field validation error.
    pub fn single(field: impl Into<String>, code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new([ValidationIssue::new(field, code, message)])
    }

    pub fn is_empty(&self) -> bool {
        self.issues.is_empty()
    }
}

/// Detailed validation failure for a single field or logical path.
#[derive(Debug, Clone)]
pub struct ValidationIssue {
    pub field: String,
    pub code: String,
    pub message: String,
}

impl ValidationIssue {
    pub fn new(field: impl Into<String>, code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            code: code.into(),
            message: message.into(),
        }
    }
}

pub type ValidationResult<T> = Result<T, ValidationError>;
