//! Lua scripts and their invocation for the Redis store.

pub mod executor;
pub mod scripts;

pub use executor::{ScriptCall, run_script};
