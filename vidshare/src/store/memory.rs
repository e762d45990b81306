use std::{
    collections::{HashMap, HashSet},
    sync::{Mutex, MutexGuard},
};

use serde_json::Value;

use crate::{
    errors::StoreError,
    filters::Filter,
    id::EntityId,
    types::{Collection, Document, ID_FIELD, RelationKey},
};

use super::{ArrayUpdate, EntityStore, ToggleOutcome, ToggleState, document_id};

#[derive(Debug, Default)]
struct State {
    collections: HashMap<Collection, Vec<Document>>,
    faults: HashSet<(Collection, Option<String>)>,
}

impl State {
    fn rows(&self, collection: Collection) -> &[Document] {
        self.collections.get(&collection).map(Vec::as_slice).unwrap_or_default()
    }

    fn rows_mut(&mut self, collection: Collection) -> &mut Vec<Document> {
        self.collections.entry(collection).or_default()
    }

    fn position(&self, collection: Collection, id: &EntityId) -> Option<usize> {
        self.rows(collection).iter().position(|row| has_id(row, id))
    }

    fn check_fault(&self, collection: Collection, id: Option<&EntityId>) -> Result<(), StoreError> {
        let blocked = self.faults.contains(&(collection, None))
            || id.is_some_and(|id| self.faults.contains(&(collection, Some(id.as_str().to_string()))));
        if blocked {
            return Err(StoreError::Other {
                message: format!("injected write fault on {}", collection.as_str()).into(),
            });
        }
        Ok(())
    }
}

fn has_id(row: &Document, id: &EntityId) -> bool {
    row.get(ID_FIELD).and_then(Value::as_str) == Some(id.as_str())
}

/// In-process [`EntityStore`] backed by insertion-ordered vectors.
///
/// A single mutex guards all collections, so every operation (toggles
/// included) is atomic with respect to every other. Write faults can be
/// injected per collection or per document to exercise failure paths.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, State>, StoreError> {
        self.state.lock().map_err(|_| StoreError::Poisoned)
    }

    /// Makes every subsequent write to `collection` fail.
    pub fn fail_writes_to(&self, collection: Collection) -> Result<(), StoreError> {
        self.lock()?.faults.insert((collection, None));
        Ok(())
    }

    /// Makes writes touching one document fail.
    pub fn fail_writes_to_id(&self, collection: Collection, id: &EntityId) -> Result<(), StoreError> {
        self.lock()?.faults.insert((collection, Some(id.as_str().to_string())));
        Ok(())
    }

    pub fn clear_faults(&self) -> Result<(), StoreError> {
        self.lock()?.faults.clear();
        Ok(())
    }
}

impl EntityStore for MemoryStore {
    async fn insert(&self, collection: Collection, document: Document) -> Result<(), StoreError> {
        let id = document_id(&document)?;
        let mut state = self.lock()?;
        state.check_fault(collection, Some(&id))?;
        if state.position(collection, &id).is_some() {
            return Err(StoreError::Conflict {
                key: format!("{}:{id}", collection.as_str()),
            });
        }
        if let Some(key) = RelationKey::from_document(collection, &document)
            && state.rows(collection).iter().any(|row| key.matches(row))
        {
            return Err(StoreError::Conflict { key: key.canonical() });
        }
        state.rows_mut(collection).push(document);
        Ok(())
    }

    async fn find_by_id(&self, collection: Collection, id: &EntityId) -> Result<Option<Document>, StoreError> {
        let state = self.lock()?;
        Ok(state.rows(collection).iter().find(|row| has_id(row, id)).cloned())
    }

    async fn update_by_id(
        &self,
        collection: Collection,
        id: &EntityId,
        patch: Document,
    ) -> Result<Option<Document>, StoreError> {
        let mut state = self.lock()?;
        state.check_fault(collection, Some(id))?;
        let Some(index) = state.position(collection, id) else {
            return Ok(None);
        };
        let row = &mut state.rows_mut(collection)[index];
        for (field, value) in patch {
            if field != ID_FIELD {
                row.insert(field, value);
            }
        }
        Ok(Some(row.clone()))
    }

    async fn delete_by_id(&self, collection: Collection, id: &EntityId) -> Result<bool, StoreError> {
        let mut state = self.lock()?;
        state.check_fault(collection, Some(id))?;
        match state.position(collection, id) {
            Some(index) => {
                state.rows_mut(collection).remove(index);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete_many(&self, collection: Collection, filter: &Filter) -> Result<u64, StoreError> {
        let mut state = self.lock()?;
        state.check_fault(collection, None)?;
        let rows = state.rows_mut(collection);
        let before = rows.len();
        rows.retain(|row| !filter.matches(row));
        Ok((before - rows.len()) as u64)
    }

    async fn find(&self, collection: Collection, filter: &Filter) -> Result<Vec<Document>, StoreError> {
        let state = self.lock()?;
        Ok(state
            .rows(collection)
            .iter()
            .filter(|row| filter.matches(row))
            .cloned()
            .collect())
    }

    async fn toggle_relation(&self, key: &RelationKey, document: Document) -> Result<ToggleOutcome, StoreError> {
        let collection = key.collection();
        let mut state = self.lock()?;
        state.check_fault(collection, None)?;
        let rows = state.rows_mut(collection);
        if let Some(index) = rows.iter().position(|row| key.matches(row)) {
            let removed = rows.remove(index);
            return Ok(ToggleOutcome {
                state: ToggleState::Removed,
                id: document_id(&removed)?,
            });
        }
        let id = document_id(&document)?;
        rows.push(document);
        Ok(ToggleOutcome {
            state: ToggleState::Added,
            id,
        })
    }

    async fn add_to_set(
        &self,
        collection: Collection,
        id: &EntityId,
        field: &str,
        value: Value,
    ) -> Result<ArrayUpdate, StoreError> {
        let mut state = self.lock()?;
        state.check_fault(collection, Some(id))?;
        let Some(index) = state.position(collection, id) else {
            return Ok(ArrayUpdate::Missing);
        };
        let row = &mut state.rows_mut(collection)[index];
        let mut items = take_array(row, field);
        let update = if items.contains(&value) {
            ArrayUpdate::Unchanged(items.clone())
        } else {
            items.push(value);
            ArrayUpdate::Applied(items.clone())
        };
        row.insert(field.to_string(), Value::Array(items));
        Ok(update)
    }

    async fn pull(
        &self,
        collection: Collection,
        id: &EntityId,
        field: &str,
        value: Value,
    ) -> Result<ArrayUpdate, StoreError> {
        let mut state = self.lock()?;
        state.check_fault(collection, Some(id))?;
        let Some(index) = state.position(collection, id) else {
            return Ok(ArrayUpdate::Missing);
        };
        let row = &mut state.rows_mut(collection)[index];
        let mut items = take_array(row, field);
        let before = items.len();
        items.retain(|item| item != &value);
        let update = if items.len() == before {
            ArrayUpdate::Unchanged(items.clone())
        } else {
            ArrayUpdate::Applied(items.clone())
        };
        row.insert(field.to_string(), Value::Array(items));
        Ok(update)
    }
}

/// Removes the array stored under `field`; a missing or non-array value reads as empty.
fn take_array(row: &mut Document, field: &str) -> Vec<Value> {
    match row.remove(field) {
        Some(Value::Array(items)) => items,
        _ => Vec::new(),
    }
}
