use redis::{aio::ConnectionManager, cmd};
use serde_json::Value;

use crate::{
    errors::StoreError,
    filters::Filter,
    id::EntityId,
    keys::KeyContext,
    runtime::{
        ScriptCall, run_script,
        scripts::{
            ARRAY_ADD_SCRIPT, ARRAY_PULL_SCRIPT, ENTITY_DELETE_SCRIPT, ENTITY_INSERT_SCRIPT, ENTITY_MERGE_SCRIPT,
            TOGGLE_RELATION_SCRIPT,
        },
    },
    types::{Collection, Document, ID_FIELD, RelationKey},
};

use super::{ArrayUpdate, EntityStore, ToggleOutcome, ToggleState, document_id};

const MGET_BATCH: usize = 500;
const SCAN_COUNT: usize = 1000;

/// [`EntityStore`] over Redis with the RedisJSON module.
///
/// Documents live at `{prefix}:{collection}:{id}`; a per-collection sorted
/// set records insertion order. Every mutation runs as a Lua script, so
/// toggles and uniqueness guards are atomic on the server.
#[derive(Clone)]
pub struct RedisStore {
    conn: ConnectionManager,
    prefix: String,
}

impl std::fmt::Debug for RedisStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisStore").field("prefix", &self.prefix).finish()
    }
}

impl RedisStore {
    pub fn new(conn: ConnectionManager, prefix: impl Into<String>) -> Self {
        Self {
            conn,
            prefix: prefix.into(),
        }
    }

    pub async fn connect(redis_url: &str, prefix: impl Into<String>) -> Result<Self, StoreError> {
        let client = redis::Client::open(redis_url)?;
        let conn = ConnectionManager::new(client).await?;
        Ok(Self::new(conn, prefix))
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    fn keys(&self) -> KeyContext<'_> {
        KeyContext::new(&self.prefix)
    }

    pub async fn ping(&self) -> Result<(), StoreError> {
        let mut conn = self.conn.clone();
        let _: String = cmd("PING").query_async(&mut conn).await?;
        Ok(())
    }

    /// Deletes every key under this store's prefix (SCAN + DEL).
    pub async fn cleanup(&self) -> Result<u64, StoreError> {
        let mut conn = self.conn.clone();
        let pattern = format!("{}:*", self.prefix);
        let mut cursor: u64 = 0;
        let mut total_deleted: u64 = 0;

        loop {
            let (next_cursor, keys): (u64, Vec<String>) = cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(&pattern)
                .arg("COUNT")
                .arg(SCAN_COUNT)
                .query_async(&mut conn)
                .await?;

            if !keys.is_empty() {
                let deleted: u64 = cmd("DEL").arg(&keys).query_async(&mut conn).await?;
                total_deleted += deleted;
            }

            cursor = next_cursor;
            if cursor == 0 {
                break;
            }
        }

        Ok(total_deleted)
    }

    fn unique_key(&self, collection: Collection, document: &Document) -> Option<String> {
        RelationKey::from_document(collection, document).map(|key| self.keys().relation(&key))
    }

    async fn fetch(&self, collection: Collection, ids: &[String]) -> Result<Vec<Document>, StoreError> {
        let mut conn = self.conn.clone();
        let keys = self.keys();
        let mut rows = Vec::with_capacity(ids.len());
        for chunk in ids.chunks(MGET_BATCH) {
            let entity_keys: Vec<String> = chunk.iter().map(|id| keys.entity(collection, id)).collect();
            let raw: Vec<Option<String>> = cmd("JSON.MGET")
                .arg(&entity_keys)
                .arg(".")
                .query_async(&mut conn)
                .await?;
            for json in raw.into_iter().flatten() {
                rows.push(serde_json::from_str::<Document>(&json)?);
            }
        }
        Ok(rows)
    }

    /// Ids in insertion order, narrowed to `wanted` when the filter pins `_id`.
    async fn ordered_ids(&self, collection: Collection, wanted: Option<Vec<String>>) -> Result<Vec<String>, StoreError> {
        let mut conn = self.conn.clone();
        let order_key = self.keys().order(collection);
        let Some(wanted) = wanted else {
            let ids: Vec<String> = cmd("ZRANGE").arg(&order_key).arg(0).arg(-1).query_async(&mut conn).await?;
            return Ok(ids);
        };
        if wanted.is_empty() {
            return Ok(wanted);
        }
        let scores: Vec<Option<f64>> = cmd("ZMSCORE").arg(&order_key).arg(&wanted).query_async(&mut conn).await?;
        let mut scored: Vec<(f64, String)> = wanted
            .into_iter()
            .zip(scores)
            .filter_map(|(id, score)| score.map(|score| (score, id)))
            .collect();
        scored.sort_by(|a, b| a.0.total_cmp(&b.0));
        Ok(scored.into_iter().map(|(_, id)| id).collect())
    }

    async fn delete_document(&self, collection: Collection, document: &Document) -> Result<bool, StoreError> {
        let id = document_id(document)?;
        let keys = self.keys();
        let mut call = ScriptCall::new(&ENTITY_DELETE_SCRIPT)
            .key(keys.entity(collection, id.as_str()))
            .key(keys.order(collection));
        if let Some(unique_key) = self.unique_key(collection, document) {
            call = call.key(unique_key);
        }
        let mut conn = self.conn.clone();
        let reply = run_script(&mut conn, call.arg(id.as_str())).await?;
        Ok(reply.get("deleted").and_then(Value::as_bool).unwrap_or(false))
    }

    async fn array_script(
        &self,
        script: &redis::Script,
        collection: Collection,
        id: &EntityId,
        field: &str,
        value: Value,
    ) -> Result<ArrayUpdate, StoreError> {
        let call = ScriptCall::new(script)
            .key(self.keys().entity(collection, id.as_str()))
            .arg(field)
            .arg(serde_json::to_string(&value)?);
        let mut conn = self.conn.clone();
        let reply = run_script(&mut conn, call).await?;
        let values = || {
            reply
                .get("values")
                .and_then(Value::as_array)
                .cloned()
                .unwrap_or_default()
        };
        Ok(match reply.get("status").and_then(Value::as_str) {
            Some("applied") => ArrayUpdate::Applied(values()),
            Some("unchanged") => ArrayUpdate::Unchanged(values()),
            _ => ArrayUpdate::Missing,
        })
    }
}

/// Ids a filter pins `_id` to, when it does.
fn pinned_ids(filter: &Filter) -> Option<Vec<String>> {
    match filter {
        Filter::Equals { field, value } if field == ID_FIELD => Some(value.as_str().into_iter().map(str::to_string).collect()),
        Filter::In { field, values } if field == ID_FIELD => {
            Some(values.iter().filter_map(Value::as_str).map(str::to_string).collect())
        }
        _ => None,
    }
}

impl EntityStore for RedisStore {
    async fn insert(&self, collection: Collection, document: Document) -> Result<(), StoreError> {
        let id = document_id(&document)?;
        let keys = self.keys();
        let mut call = ScriptCall::new(&ENTITY_INSERT_SCRIPT)
            .key(keys.entity(collection, id.as_str()))
            .key(keys.order(collection))
            .key(keys.sequence());
        if let Some(unique_key) = self.unique_key(collection, &document) {
            call = call.key(unique_key);
        }
        let call = call.arg(serde_json::to_string(&document)?).arg(id.as_str());
        let mut conn = self.conn.clone();
        run_script(&mut conn, call).await?;
        Ok(())
    }

    async fn find_by_id(&self, collection: Collection, id: &EntityId) -> Result<Option<Document>, StoreError> {
        let mut conn = self.conn.clone();
        let raw: Option<String> = cmd("JSON.GET")
            .arg(self.keys().entity(collection, id.as_str()))
            .query_async(&mut conn)
            .await?;
        raw.map(|json| serde_json::from_str::<Document>(&json))
            .transpose()
            .map_err(StoreError::from)
    }

    async fn update_by_id(
        &self,
        collection: Collection,
        id: &EntityId,
        mut patch: Document,
    ) -> Result<Option<Document>, StoreError> {
        patch.remove(ID_FIELD);
        let call = ScriptCall::new(&ENTITY_MERGE_SCRIPT)
            .key(self.keys().entity(collection, id.as_str()))
            .arg(serde_json::to_string(&patch)?);
        let mut conn = self.conn.clone();
        let reply = run_script(&mut conn, call).await?;
        match reply.get("document") {
            Some(Value::Object(document)) => Ok(Some(document.clone())),
            _ => Ok(None),
        }
    }

    async fn delete_by_id(&self, collection: Collection, id: &EntityId) -> Result<bool, StoreError> {
        match self.find_by_id(collection, id).await? {
            Some(document) => self.delete_document(collection, &document).await,
            None => Ok(false),
        }
    }

    async fn delete_many(&self, collection: Collection, filter: &Filter) -> Result<u64, StoreError> {
        let mut deleted = 0;
        for document in self.find(collection, filter).await? {
            if self.delete_document(collection, &document).await? {
                deleted += 1;
            }
        }
        Ok(deleted)
    }

    async fn find(&self, collection: Collection, filter: &Filter) -> Result<Vec<Document>, StoreError> {
        let ids = self.ordered_ids(collection, pinned_ids(filter)).await?;
        let mut rows = self.fetch(collection, &ids).await?;
        rows.retain(|row| filter.matches(row));
        Ok(rows)
    }

    async fn toggle_relation(&self, key: &RelationKey, document: Document) -> Result<ToggleOutcome, StoreError> {
        let collection = key.collection();
        let new_id = document_id(&document)?;
        let keys = self.keys();
        let unique_key = keys.relation(key);
        let mut conn = self.conn.clone();
        // The script re-checks this read; a change in between is a Conflict.
        let observed: Option<String> = cmd("GET").arg(&unique_key).query_async(&mut conn).await?;

        let mut call = ScriptCall::new(&TOGGLE_RELATION_SCRIPT)
            .key(unique_key)
            .key(keys.order(collection))
            .key(keys.sequence())
            .key(keys.entity(collection, new_id.as_str()));
        if let Some(existing) = observed.as_deref() {
            call = call.key(keys.entity(collection, existing));
        }
        let call = call
            .arg(new_id.as_str())
            .arg(serde_json::to_string(&document)?)
            .arg(observed.unwrap_or_default());
        let reply = run_script(&mut conn, call).await?;

        let state = match reply.get("state").and_then(Value::as_str) {
            Some("added") => ToggleState::Added,
            Some("removed") => ToggleState::Removed,
            other => {
                return Err(StoreError::Other {
                    message: format!("unexpected toggle reply: {other:?}").into(),
                });
            }
        };
        let id = reply
            .get("id")
            .and_then(Value::as_str)
            .map(EntityId::parse)
            .transpose()
            .map_err(|err| StoreError::Other {
                message: err.to_string().into(),
            })?
            .unwrap_or(new_id);
        Ok(ToggleOutcome { state, id })
    }

    async fn add_to_set(
        &self,
        collection: Collection,
        id: &EntityId,
        field: &str,
        value: Value,
    ) -> Result<ArrayUpdate, StoreError> {
        self.array_script(&ARRAY_ADD_SCRIPT, collection, id, field, value).await
    }

    async fn pull(
        &self,
        collection: Collection,
        id: &EntityId,
        field: &str,
        value: Value,
    ) -> Result<ArrayUpdate, StoreError> {
        self.array_script(&ARRAY_PULL_SCRIPT, collection, id, field, value).await
    }
}
