//! Runtime configuration loaded from `vidshare.toml` plus environment overrides.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::search::PaginationSettings;

pub const DEFAULT_CONFIG_FILE: &str = "vidshare.toml";
pub const REDIS_URL_ENV: &str = "REDIS_URL";
pub const BLOB_DIR_ENV: &str = "VIDSHARE_BLOB_DIR";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("environment variable {name} referenced by {field} is not set")]
    MissingVariable { name: String, field: &'static str },
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub store: StoreSettings,
    #[serde(default)]
    pub blobs: BlobSettings,
    #[serde(default)]
    pub pagination: PaginationSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreSettings {
    /// Redis URL; `${NAME}` expands from the environment.
    #[serde(default = "default_redis_url")]
    pub redis_url: String,
    #[serde(default = "default_key_prefix")]
    pub key_prefix: String,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            redis_url: default_redis_url(),
            key_prefix: default_key_prefix(),
        }
    }
}

fn default_redis_url() -> String {
    "redis://127.0.0.1:6379".to_string()
}

fn default_key_prefix() -> String {
    "vidshare".to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlobSettings {
    #[serde(default = "default_blob_dir")]
    pub root_dir: PathBuf,
}

impl Default for BlobSettings {
    fn default() -> Self {
        Self {
            root_dir: default_blob_dir(),
        }
    }
}

fn default_blob_dir() -> PathBuf {
    PathBuf::from("blobs")
}

impl Config {
    /// Loads `path` (or `./vidshare.toml` when present) and applies process
    /// environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        Self::load_with(path, |name| std::env::var(name).ok())
    }

    /// Like [`Config::load`] with an explicit environment lookup.
    pub fn load_with<F>(path: Option<&Path>, env: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = match path {
            Some(path) => Self::read(path)?,
            None => {
                let fallback = Path::new(DEFAULT_CONFIG_FILE);
                if fallback.exists() {
                    Self::read(fallback)?
                } else {
                    Self::default()
                }
            }
        };

        if let Some(url) = env(REDIS_URL_ENV) {
            config.store.redis_url = url;
        }
        if let Some(dir) = env(BLOB_DIR_ENV) {
            config.blobs.root_dir = PathBuf::from(dir);
        }
        config.store.redis_url = expand("store.redis_url", &config.store.redis_url, &env)?;
        Ok(config)
    }

    pub fn from_toml(path: &Path, content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    fn read(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(path, &content)
    }
}

/// Expands a whole-value `${NAME}` reference.
fn expand<F>(field: &'static str, value: &str, env: &F) -> Result<String, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match value.strip_prefix("${").and_then(|rest| rest.strip_suffix('}')) {
        Some(name) => env(name).ok_or_else(|| ConfigError::MissingVariable {
            name: name.to_string(),
            field,
        }),
        None => Ok(value.to_string()),
    }
}
