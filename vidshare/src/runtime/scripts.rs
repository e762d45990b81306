use redis::Script;
use std::sync::LazyLock;

pub const ENTITY_INSERT_SCRIPT_BODY: &str = include_str!("../../lua/entity_insert.lua");
pub const ENTITY_MERGE_SCRIPT_BODY: &str = include_str!("../../lua/entity_merge.lua");
pub const ENTITY_DELETE_SCRIPT_BODY: &str = include_str!("../../lua/entity_delete.lua");
pub const TOGGLE_RELATION_SCRIPT_BODY: &str = include_str!("../../lua/toggle_relation.lua");
pub const ARRAY_ADD_SCRIPT_BODY: &str = include_str!("../../lua/array_add.lua");
pub const ARRAY_PULL_SCRIPT_BODY: &str = include_str!("../../lua/array_pull.lua");

pub static ENTITY_INSERT_SCRIPT: LazyLock<Script> = LazyLock::new(|| Script::new(ENTITY_INSERT_SCRIPT_BODY));
pub static ENTITY_MERGE_SCRIPT: LazyLock<Script> = LazyLock::new(|| Script::new(ENTITY_MERGE_SCRIPT_BODY));
pub static ENTITY_DELETE_SCRIPT: LazyLock<Script> = LazyLock::new(|| Script::new(ENTITY_DELETE_SCRIPT_BODY));
pub static TOGGLE_RELATION_SCRIPT: LazyLock<Script> = LazyLock::new(|| Script::new(TOGGLE_RELATION_SCRIPT_BODY));
pub static ARRAY_ADD_SCRIPT: LazyLock<Script> = LazyLock::new(|| Script::new(ARRAY_ADD_SCRIPT_BODY));
pub static ARRAY_PULL_SCRIPT: LazyLock<Script> = LazyLock::new(|| Script::new(ARRAY_PULL_SCRIPT_BODY));
