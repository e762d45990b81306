use std::marker::PhantomData;

use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value;

use crate::{
    errors::{CoreError, StoreError},
    filters::Filter,
    id::EntityId,
    store::EntityStore,
    types::{Document, Entity, Owned},
};

/// Serializes a value into a stored document.
pub fn to_document<T: Serialize>(value: &T) -> Result<Document, StoreError> {
    match serde_json::to_value(value)? {
        Value::Object(map) => Ok(map),
        other => Err(StoreError::Other {
            message: format!("expected an object document, got {other}").into(),
        }),
    }
}

pub fn from_document<T: DeserializeOwned>(document: Document) -> Result<T, StoreError> {
    Ok(serde_json::from_value(Value::Object(document))?)
}

/// Fails with `Forbidden` unless `actor` owns `entity`.
pub fn ensure_owned_by<T>(entity: &T, actor: &EntityId) -> Result<(), CoreError>
where
    T: Entity + Owned,
{
    if entity.owner() == actor {
        Ok(())
    } else {
        Err(CoreError::Forbidden {
            entity: T::COLLECTION.entity_name(),
        })
    }
}

/// Typed access to one collection of an [`EntityStore`].
pub struct Repo<'s, S: ?Sized, T> {
    store: &'s S,
    _marker: PhantomData<T>,
}

impl<'s, S: ?Sized, T> Clone for Repo<'s, S, T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<'s, S: ?Sized, T> Copy for Repo<'s, S, T> {}

impl<'s, S, T> Repo<'s, S, T>
where
    S: EntityStore + ?Sized,
    T: Entity,
{
    pub fn new(store: &'s S) -> Self {
        Self {
            store,
            _marker: PhantomData,
        }
    }

    pub async fn get(&self, id: &EntityId) -> Result<Option<T>, CoreError> {
        match self.store.find_by_id(T::COLLECTION, id).await? {
            Some(document) => Ok(Some(from_document(document)?)),
            None => Ok(None),
        }
    }

    pub async fn get_or_not_found(&self, id: &EntityId) -> Result<T, CoreError> {
        self.get(id)
            .await?
            .ok_or_else(|| CoreError::not_found(T::COLLECTION.entity_name(), id))
    }

    /// Check if an entity with the given ID exists.
    pub async fn exists(&self, id: &EntityId) -> Result<bool, CoreError> {
        Ok(self.store.find_by_id(T::COLLECTION, id).await?.is_some())
    }

    pub async fn ensure_exists(&self, id: &EntityId) -> Result<(), CoreError> {
        if self.exists(id).await? {
            Ok(())
        } else {
            Err(CoreError::not_found(T::COLLECTION.entity_name(), id))
        }
    }

    pub async fn create(&self, entity: &T) -> Result<(), CoreError> {
        self.store.insert(T::COLLECTION, to_document(entity)?).await?;
        Ok(())
    }

    /// Applies a shallow patch; `None` when the entity is gone.
    pub async fn update(&self, id: &EntityId, patch: Document) -> Result<Option<T>, CoreError> {
        match self.store.update_by_id(T::COLLECTION, id, patch).await? {
            Some(document) => Ok(Some(from_document(document)?)),
            None => Ok(None),
        }
    }

    pub async fn delete(&self, id: &EntityId) -> Result<bool, CoreError> {
        Ok(self.store.delete_by_id(T::COLLECTION, id).await?)
    }

    pub async fn find(&self, filter: &Filter) -> Result<Vec<T>, CoreError> {
        self.store
            .find(T::COLLECTION, filter)
            .await?
            .into_iter()
            .map(|document| from_document(document).map_err(CoreError::from))
            .collect()
    }

    pub async fn count(&self, filter: &Filter) -> Result<u64, CoreError> {
        Ok(self.store.count(T::COLLECTION, filter).await?)
    }
}
