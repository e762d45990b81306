use redis::{Script, aio::ConnectionLike};
use serde_json::Value;

use crate::errors::StoreError;

/// One prepared script invocation: keys first, then arguments.
#[derive(Debug)]
pub struct ScriptCall<'s> {
    script: &'s Script,
    keys: Vec<String>,
    args: Vec<String>,
}

impl<'s> ScriptCall<'s> {
    pub fn new(script: &'s Script) -> Self {
        Self {
            script,
            keys: Vec::new(),
            args: Vec::new(),
        }
    }

    pub fn key(mut self, key: impl Into<String>) -> Self {
        self.keys.push(key.into());
        self
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }
}

/// Invokes a script and decodes its JSON reply.
///
/// Scripts report failures as `{"error": code, "key": ...}`; uniqueness
/// violations become [`StoreError::Conflict`].
pub async fn run_script<C>(conn: &mut C, call: ScriptCall<'_>) -> Result<Value, StoreError>
where
    C: ConnectionLike + Send,
{
    let mut invocation = call.script.prepare_invoke();
    for key in &call.keys {
        invocation.key(key);
    }
    for arg in &call.args {
        invocation.arg(arg);
    }
    let raw: String = invocation.invoke_async(conn).await?;
    let value: Value = serde_json::from_str(&raw)?;

    if let Some(error) = value.get("error") {
        let key = value.get("key").and_then(Value::as_str).unwrap_or_default().to_string();
        return Err(match error.as_str() {
            Some("entity_exists") | Some("unique_conflict") => StoreError::Conflict { key },
            Some(other) => StoreError::Other {
                message: format!("{other}: {key}").into(),
            },
            None => StoreError::Other {
                message: "lua_error".into(),
            },
        });
    }

    Ok(value)
}
