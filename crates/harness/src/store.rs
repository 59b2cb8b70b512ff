use std::sync::Arc;

use eavscope_core::registry::{SELLER_ENTITY_TYPE, seller_attributes};
use eavscope_core::{
    AttributeDefinition, AttributeId, AttributeValue, BackendType, Entity, EntityId, Scope,
    StoreId, WebsiteId,
};
use eavscope_engine::{EngineConfig, EngineError, EntityRepository};
use eavscope_storage::{SqliteStorage, StorageError, ValueRow, ValueTable};

/// Stores seeded into every fixture: (store, website, code).
pub const TEST_STORES: [(i64, i64, &str); 4] = [(1, 1, "en"), (2, 1, "fr"), (3, 1, "be"), (5, 2, "de")];

/// Seller attributes plus one attribute per remaining backend and scope.
pub fn test_attributes() -> Vec<AttributeDefinition> {
    let mut attributes = seller_attributes();
    attributes.extend([
        AttributeDefinition::new(AttributeId::new(12), "seller_code", BackendType::Varchar, Scope::Global),
        AttributeDefinition::new(AttributeId::new(13), "rating", BackendType::Decimal, Scope::Website),
        AttributeDefinition::new(AttributeId::new(14), "launched_at", BackendType::Datetime, Scope::Store),
    ]);
    attributes
}

/// An in-memory seller repository with the test stores and attributes.
pub struct TestStore {
    pub repo: EntityRepository<SqliteStorage>,
}

impl TestStore {
    pub fn new() -> Result<Self, Box<dyn std::error::Error>> {
        Self::with_config(EngineConfig::default())
    }

    pub fn with_config(config: EngineConfig) -> Result<Self, Box<dyn std::error::Error>> {
        let storage = Self::seed(config.open_storage()?)?;
        let registry = Arc::new(storage.load_registry(SELLER_ENTITY_TYPE)?);
        let repo = EntityRepository::new(storage, registry, config)?;
        Ok(Self { repo })
    }

    fn seed(mut storage: SqliteStorage) -> Result<SqliteStorage, StorageError> {
        storage.install_attributes(SELLER_ENTITY_TYPE, &test_attributes())?;
        for (store, website, code) in TEST_STORES {
            storage.add_store(StoreId::new(store), WebsiteId::new(website), code)?;
        }
        Ok(storage)
    }

    pub fn storage(&self) -> &SqliteStorage {
        self.repo.persistence()
    }

    pub fn query_count(&self) -> u64 {
        self.storage().query_count()
    }

    /// Save a new seller at the default store.
    pub fn create_seller(
        &mut self,
        code: &str,
        values: Vec<(&str, AttributeValue)>,
    ) -> Result<EntityId, EngineError> {
        let mut entity = Entity::new(code);
        for (attr, value) in values {
            entity.set(attr, value);
        }
        let saved = self.repo.save(entity)?;
        Ok(saved.require_id()?)
    }

    /// Save `values` for an existing seller under `store`, leaving its other
    /// attributes alone.
    pub fn save_at(
        &mut self,
        entity_id: EntityId,
        store: StoreId,
        values: Vec<(&str, AttributeValue)>,
    ) -> Result<Entity, EngineError> {
        let record = self
            .storage()
            .get_entity(entity_id)?
            .ok_or_else(|| EngineError::NotFound(format!("entity {entity_id}")))?;
        let mut entity = record.into_entity(Some(store));
        for (attr, value) in values {
            entity.set(attr, value);
        }
        self.repo.save(entity)
    }

    /// Every stored row of `code` for the entity, across all stores.
    pub fn rows(&self, entity_id: EntityId, code: &str) -> Result<Vec<ValueRow>, Box<dyn std::error::Error>> {
        let attr = self.repo.registry().get(code)?;
        let table = ValueTable::for_backend(attr.backend_type)?;
        Ok(self.storage().fetch_rows(table, entity_id, attr.attribute_id, None)?)
    }
}
