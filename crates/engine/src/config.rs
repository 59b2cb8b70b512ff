use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use eavscope_core::registry::SELLER_ENTITY_TYPE;
use eavscope_storage::SqliteStorage;

use crate::error::EngineError;

pub const DEFAULT_CACHE_CAPACITY: usize = 1024;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Entity type whose attributes the repository resolves.
    #[serde(default = "default_entity_type")]
    pub entity_type: String,

    /// Attribute set assigned to every saved entity.
    #[serde(default)]
    pub attribute_set_name: Option<String>,

    /// Maximum number of (entity, store) entries kept in the entity cache.
    #[serde(default = "default_cache_capacity")]
    pub cache_capacity: usize,

    /// SQLite file. In-memory when absent.
    #[serde(default)]
    pub database_path: Option<PathBuf>,
}

fn default_entity_type() -> String {
    SELLER_ENTITY_TYPE.to_string()
}

fn default_cache_capacity() -> usize {
    DEFAULT_CACHE_CAPACITY
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            entity_type: default_entity_type(),
            attribute_set_name: None,
            cache_capacity: default_cache_capacity(),
            database_path: None,
        }
    }
}

impl EngineConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, EngineError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            EngineError::Configuration(format!("cannot read {}: {e}", path.display()))
        })?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, EngineError> {
        let config: Self =
            toml::from_str(content).map_err(|e| EngineError::Configuration(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), EngineError> {
        if self.entity_type.is_empty() {
            return Err(EngineError::Configuration("entity_type is empty".into()));
        }
        if self.cache_capacity == 0 {
            return Err(EngineError::Configuration(
                "cache_capacity must be at least 1".into(),
            ));
        }
        Ok(())
    }

    pub fn open_storage(&self) -> Result<SqliteStorage, EngineError> {
        let storage = match &self.database_path {
            Some(path) => {
                let path = path.to_str().ok_or_else(|| {
                    EngineError::Configuration(format!("non-utf8 database path: {}", path.display()))
                })?;
                SqliteStorage::open(path)?
            }
            None => SqliteStorage::open_in_memory()?,
        };
        Ok(storage)
    }
}
