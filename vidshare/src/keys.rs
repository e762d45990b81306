use crate::types::{Collection, RelationKey};

/// Common key-construction helpers used by the Redis store.
#[derive(Debug, Clone, Copy)]
pub struct KeyContext<'a> {
    pub prefix: &'a str,
}

impl<'a> KeyContext<'a> {
    pub fn new(prefix: &'a str) -> Self {
        Self { prefix }
    }

    pub fn entity(&self, collection: Collection, entity_id: &str) -> String {
        format!("{}:{}:{}", self.prefix, collection.as_str(), entity_id)
    }

    /// Prefix shared by every entity key of `collection` (used for SCAN-based cleanup).
    pub fn collection_pattern(&self, collection: Collection) -> String {
        format!("{}:{}:*", self.prefix, collection.as_str())
    }

    /// Sorted set of ids in insertion order, scored by [`Self::sequence`].
    pub fn order(&self, collection: Collection) -> String {
        format!("{}:{}:_order", self.prefix, collection.as_str())
    }

    /// Global monotonic counter feeding order scores.
    pub fn sequence(&self) -> String {
        format!("{}:_seq", self.prefix)
    }

    /// Uniqueness guard holding the id of the row that owns a relation.
    pub fn relation(&self, key: &RelationKey) -> String {
        format!(
            "{}:{}:unique:{}",
            self.prefix,
            key.collection().as_str(),
            key.canonical()
        )
    }
}
