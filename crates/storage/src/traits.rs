use chrono::NaiveDateTime;

use eavscope_core::{AttributeRegistry, AttributeSetId, Entity, EntityId, StoreId};

use crate::error::StorageError;

/// A row of the entity table: the static columns only.
#[derive(Debug, Clone, PartialEq)]
pub struct EntityRecord {
    pub entity_id: EntityId,
    pub code: String,
    pub attribute_set_id: AttributeSetId,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl EntityRecord {
    /// Start an entity from this row; dynamic values are attached by the caller.
    pub fn into_entity(self, store_id: Option<StoreId>) -> Entity {
        let mut entity = Entity::new(self.code);
        entity.id = Some(self.entity_id);
        entity.attribute_set_id = self.attribute_set_id;
        entity.created_at = Some(self.created_at);
        entity.updated_at = Some(self.updated_at);
        entity.store_id = store_id;
        entity
    }
}

/// The persistence engine the repository drives. Each call is one unit of
/// work; implementations run writes inside a single transaction and never
/// retry.
pub trait EntityPersistence {
    /// Load the entity with effective values for `store` (default store when
    /// `None`). Returns `None` when the id does not exist.
    fn load(
        &self,
        registry: &AttributeRegistry,
        entity_id: EntityId,
        store: Option<StoreId>,
    ) -> Result<Option<Entity>, StorageError>;

    /// Insert or update the entity row and its value rows. The returned
    /// entity carries the identity and timestamps assigned by storage.
    fn save(&mut self, registry: &AttributeRegistry, entity: &Entity) -> Result<Entity, StorageError>;

    /// Delete the entity and, by cascade, all its value rows.
    fn delete(&mut self, entity_id: EntityId) -> Result<bool, StorageError>;

    /// Resolve a code against the entity table only.
    fn id_by_code(&self, code: &str) -> Result<Option<EntityId>, StorageError>;

    fn attribute_set_id_by_name(
        &self,
        entity_type: &str,
        name: &str,
    ) -> Result<Option<AttributeSetId>, StorageError>;
}
