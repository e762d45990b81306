use std::fmt;
use std::str::FromStr;

use nanoid::nanoid;
use serde::{Deserialize, Serialize};

use crate::errors::CoreError;

/// Canonical alphabet for entity identifiers (no ambiguous glyphs).
const ENTITY_ID_ALPHABET: &[char] = &[
    'A', 'B', 'C', 'D', 'E', 'F', 'G', 'H', 'J', 'K', 'L', 'M', 'N', 'P', 'Q', 'R', 'S', 'T', 'U', 'V', 'W', 'X', 'Y',
    'Z', 'a', 'b', 'c', 'd', 'e', 'f', 'g', 'h', 'j', 'm', 'n', 'p', 'q', 'r', 's', 't', 'u', 'v', 'w', 'x', 'y', 'z',
];
/// Default entity id length.
const ENTITY_ID_LENGTH: usize = 20;

/// Generates a new entity identifier using the configured alphabet and length.
pub fn generate_entity_id() -> String {
    nanoid!(ENTITY_ID_LENGTH, ENTITY_ID_ALPHABET)
}

/// Returns `true` when `raw` has the exact shape produced by [`generate_entity_id`].
pub fn is_valid_entity_id(raw: &str) -> bool {
    raw.chars().count() == ENTITY_ID_LENGTH && raw.chars().all(|c| ENTITY_ID_ALPHABET.contains(&c))
}

/// Opaque, validated identifier of a stored entity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct EntityId(String);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MalformedId(pub String);

impl fmt::Display for MalformedId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "malformed entity id {:?}", self.0)
    }
}

impl std::error::Error for MalformedId {}

impl EntityId {
    pub fn generate() -> Self {
        Self(generate_entity_id())
    }

    pub fn parse(raw: &str) -> Result<Self, MalformedId> {
        if is_valid_entity_id(raw) {
            Ok(Self(raw.to_string()))
        } else {
            Err(MalformedId(raw.to_string()))
        }
    }

    /// Parses a request path parameter, failing with `InvalidIdentifier` naming `field`.
    pub fn param(field: &'static str, raw: &str) -> Result<Self, CoreError> {
        Self::parse(raw.trim()).map_err(|_| CoreError::InvalidIdentifier {
            field,
            value: raw.to_string(),
        })
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for EntityId {
    type Err = MalformedId;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for EntityId {
    type Error = MalformedId;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        if is_valid_entity_id(&value) {
            Ok(Self(value))
        } else {
            Err(MalformedId(value))
        }
    }
}

impl From<EntityId> for String {
    fn from(value: EntityId) -> Self {
        value.0
    }
}

impl From<&EntityId> for serde_json::Value {
    fn from(value: &EntityId) -> Self {
        serde_json::Value::String(value.0.clone())
    }
}

impl AsRef<str> for EntityId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
