//! Entity store abstraction.
//!
//! Everything above this module talks to an [`EntityStore`]; the in-process
//! [`MemoryStore`] backs tests and the [`RedisStore`] backs deployments.

pub mod memory;
pub mod redis_store;

pub use memory::MemoryStore;
pub use redis_store::RedisStore;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{
    errors::StoreError,
    filters::Filter,
    id::EntityId,
    pipeline::{self, Pipeline},
    types::{Collection, Document, RelationKey},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToggleState {
    Added,
    Removed,
}

/// Result of an atomic relation toggle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToggleOutcome {
    pub state: ToggleState,
    /// Id of the row that was inserted or removed.
    pub id: EntityId,
}

/// Result of a set-style array mutation on one document.
#[derive(Debug, Clone, PartialEq)]
pub enum ArrayUpdate {
    /// The array changed; carries its new contents.
    Applied(Vec<Value>),
    /// The value was already present (add) or absent (pull).
    Unchanged(Vec<Value>),
    /// No document with that id.
    Missing,
}

#[allow(async_fn_in_trait)]
pub trait EntityStore {
    /// Inserts a new document. Relation collections reject a second row for
    /// the same relation with [`StoreError::Conflict`].
    async fn insert(&self, collection: Collection, document: Document) -> Result<(), StoreError>;

    async fn find_by_id(&self, collection: Collection, id: &EntityId) -> Result<Option<Document>, StoreError>;

    /// Shallow-merges `patch` into the stored document and returns the result.
    async fn update_by_id(
        &self,
        collection: Collection,
        id: &EntityId,
        patch: Document,
    ) -> Result<Option<Document>, StoreError>;

    /// Returns `false` when nothing was deleted.
    async fn delete_by_id(&self, collection: Collection, id: &EntityId) -> Result<bool, StoreError>;

    async fn delete_many(&self, collection: Collection, filter: &Filter) -> Result<u64, StoreError>;

    /// Matching documents in insertion order.
    async fn find(&self, collection: Collection, filter: &Filter) -> Result<Vec<Document>, StoreError>;

    async fn count(&self, collection: Collection, filter: &Filter) -> Result<u64, StoreError> {
        Ok(self.find(collection, filter).await?.len() as u64)
    }

    async fn query(&self, collection: Collection, pipeline: &Pipeline) -> Result<Vec<Document>, StoreError> {
        pipeline::evaluate(self, collection, pipeline).await
    }

    /// Removes the row holding `key` if one exists, otherwise inserts
    /// `document`. Check and write are a single atomic step.
    async fn toggle_relation(&self, key: &RelationKey, document: Document) -> Result<ToggleOutcome, StoreError>;

    /// Appends `value` to the array `field` unless already present.
    async fn add_to_set(
        &self,
        collection: Collection,
        id: &EntityId,
        field: &str,
        value: Value,
    ) -> Result<ArrayUpdate, StoreError>;

    /// Removes every occurrence of `value` from the array `field`.
    async fn pull(&self, collection: Collection, id: &EntityId, field: &str, value: Value)
    -> Result<ArrayUpdate, StoreError>;
}

pub(crate) fn document_id(document: &Document) -> Result<EntityId, StoreError> {
    let raw = document
        .get(crate::types::ID_FIELD)
        .and_then(Value::as_str)
        .ok_or(StoreError::Other {
            message: "document has no _id".into(),
        })?;
    EntityId::parse(raw).map_err(|err| StoreError::Other {
        message: err.to_string().into(),
    })
}
