pub mod cache;
pub mod config;
pub mod error;
pub mod hooks;
pub mod memo;
pub mod repository;

pub use cache::{CacheScope, EntityCache};
pub use config::EngineConfig;
pub use error::EngineError;
pub use hooks::LifecycleHooks;
pub use memo::OverrideMemo;
pub use repository::EntityRepository;

use std::sync::Arc;

use eavscope_core::registry::seller_attributes;
use eavscope_storage::SqliteStorage;
use tracing::info;

/// Open storage as configured, make sure the attribute table knows the
/// seller attributes, and build a repository over the loaded registry.
pub fn open_seller_repository(
    config: EngineConfig,
) -> Result<EntityRepository<SqliteStorage>, EngineError> {
    let mut storage = config.open_storage()?;
    let mut registry = storage.load_registry(&config.entity_type)?;
    if registry.list().is_empty() {
        storage.install_attributes(&config.entity_type, &seller_attributes())?;
        registry = storage.load_registry(&config.entity_type)?;
        info!(entity_type = %config.entity_type, "installed default seller attributes");
    }
    EntityRepository::new(storage, Arc::new(registry), config)
}
