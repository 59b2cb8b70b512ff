use std::sync::Arc;

use tracing::{debug, info};

use eavscope_core::{AttributeRegistry, AttributeSetId, Entity, EntityId, StoreId};
use eavscope_storage::{EntityPersistence, OverrideSet, OverrideSource};

use crate::cache::{CacheScope, EntityCache};
use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::hooks::LifecycleHooks;
use crate::memo::OverrideMemo;

/// Request-facing access to entities. Owns its caches; nothing is global,
/// so a repository is one request (or one process) context.
pub struct EntityRepository<P> {
    persistence: P,
    registry: Arc<AttributeRegistry>,
    config: EngineConfig,
    cache: EntityCache,
    overrides: OverrideMemo,
    attribute_set_id: Option<AttributeSetId>,
    hooks: Vec<Box<dyn LifecycleHooks>>,
}

impl<P: EntityPersistence + OverrideSource> EntityRepository<P> {
    pub fn new(
        persistence: P,
        registry: Arc<AttributeRegistry>,
        config: EngineConfig,
    ) -> Result<Self, EngineError> {
        config.validate()?;
        if registry.entity_type() != config.entity_type {
            return Err(EngineError::Configuration(format!(
                "registry is for {}, config expects {}",
                registry.entity_type(),
                config.entity_type
            )));
        }
        Ok(Self {
            persistence,
            registry,
            cache: EntityCache::new(config.cache_capacity),
            config,
            overrides: OverrideMemo::new(),
            attribute_set_id: None,
            hooks: Vec::new(),
        })
    }

    pub fn add_hook(&mut self, hook: Box<dyn LifecycleHooks>) {
        self.hooks.push(hook);
    }

    pub fn registry(&self) -> &Arc<AttributeRegistry> {
        &self.registry
    }

    pub fn persistence(&self) -> &P {
        &self.persistence
    }

    /// Direct access to the persistence engine. Writes made through it
    /// bypass cache invalidation; call `clear_cache` afterwards.
    pub fn persistence_mut(&mut self) -> &mut P {
        &mut self.persistence
    }

    pub fn cached_entries(&self) -> usize {
        self.cache.len()
    }

    pub fn clear_cache(&mut self) {
        self.cache.clear();
        self.overrides.clear();
    }

    // ========================================================================
    // Reads
    // ========================================================================

    /// Entity `entity_id` resolved for `store`, or unscoped when `None`.
    pub fn get(&mut self, entity_id: EntityId, store: Option<StoreId>) -> Result<Entity, EngineError> {
        let entity_id = EntityId::parse(entity_id.get())?;
        let scope = CacheScope::from(store);
        if let Some(entity) = self.cache.get(entity_id, scope) {
            debug!(%entity_id, ?scope, "entity cache hit");
            return Ok(entity.clone());
        }
        debug!(%entity_id, ?scope, "entity cache miss");

        let mut entity = self
            .persistence
            .load(&self.registry, entity_id, store)?
            .ok_or_else(|| EngineError::NotFound(format!("entity {entity_id}")))?;
        if entity.id != Some(entity_id) {
            return Err(EngineError::NotFound(format!("entity {entity_id}")));
        }
        for hook in &self.hooks {
            hook.after_load(&mut entity)?;
        }

        self.cache.insert(entity_id, scope, entity.clone());
        Ok(entity)
    }

    /// Resolve `code` against the entity table, then load as `get`.
    pub fn get_by_code(&mut self, code: &str, store: Option<StoreId>) -> Result<Entity, EngineError> {
        let code = code.trim();
        if code.is_empty() {
            return Err(EngineError::InvalidInput("entity code is empty".into()));
        }
        let entity_id = self
            .persistence
            .id_by_code(code)?
            .ok_or_else(|| EngineError::NotFound(format!("entity with code {code}")))?;
        self.get(entity_id, store)
    }

    /// Whether `code` has its own row at `store` for this entity. Computed
    /// once per (entity, store) and memoised until the entity is written.
    pub fn contains_override(
        &mut self,
        entity: &Entity,
        code: &str,
        store: StoreId,
    ) -> Result<bool, EngineError> {
        self.registry.get(code).map_err(|_| {
            EngineError::InvalidInput(format!(
                "{} has no attribute {code}",
                self.registry.entity_type()
            ))
        })?;
        if store.is_default() {
            return Ok(false);
        }
        let entity_id = entity.require_id()?;
        Ok(self.overrides(entity_id, store)?.contains(code))
    }

    pub fn overrides(&mut self, entity_id: EntityId, store: StoreId) -> Result<&OverrideSet, EngineError> {
        let persistence = &self.persistence;
        let registry = &self.registry;
        Ok(self.overrides.get_or_try_insert_with(entity_id, store, || {
            persistence.load_overrides(registry, entity_id, store)
        })?)
    }

    /// Configured attribute set, resolved on first use and kept for the
    /// lifetime of the repository.
    pub fn attribute_set_id(&mut self) -> Result<Option<AttributeSetId>, EngineError> {
        if let Some(id) = self.attribute_set_id {
            return Ok(Some(id));
        }
        let Some(name) = self.config.attribute_set_name.as_deref() else {
            return Ok(None);
        };
        let id = self
            .persistence
            .attribute_set_id_by_name(&self.config.entity_type, name)?
            .ok_or_else(|| EngineError::Configuration(format!("attribute set {name} does not exist")))?;
        debug!(attribute_set = name, %id, "attribute set resolved");
        self.attribute_set_id = Some(id);
        Ok(Some(id))
    }

    // ========================================================================
    // Writes
    // ========================================================================

    pub fn save(&mut self, mut entity: Entity) -> Result<Entity, EngineError> {
        if let Some(id) = entity.id {
            EntityId::parse(id.get())?;
        }
        if let Some(set_id) = self.attribute_set_id()? {
            entity.attribute_set_id = set_id;
        }
        for hook in &self.hooks {
            hook.before_save(&mut entity, &self.registry)?;
        }

        let saved = self
            .persistence
            .save(&self.registry, &entity)
            .map_err(EngineError::from_save)?;
        let entity_id = saved.require_id()?;
        self.invalidate(entity_id);

        for hook in &self.hooks {
            hook.after_save(&saved)?;
        }
        info!(%entity_id, code = %saved.code, store = ?saved.store_id, "entity saved");
        Ok(saved)
    }

    pub fn delete(&mut self, entity: &Entity) -> Result<bool, EngineError> {
        let entity_id = entity.require_id()?;
        self.delete_by_id(entity_id)
    }

    pub fn delete_by_id(&mut self, entity_id: EntityId) -> Result<bool, EngineError> {
        let entity_id = EntityId::parse(entity_id.get())?;
        for hook in &self.hooks {
            hook.before_delete(entity_id)?;
        }

        let deleted = self
            .persistence
            .delete(entity_id)
            .map_err(EngineError::from_delete)?;
        if !deleted {
            return Err(EngineError::NotFound(format!("entity {entity_id}")));
        }
        self.invalidate(entity_id);

        for hook in &self.hooks {
            hook.after_delete(entity_id)?;
        }
        info!(%entity_id, "entity deleted");
        Ok(true)
    }

    fn invalidate(&mut self, entity_id: EntityId) {
        let evicted = self.cache.evict(entity_id);
        self.overrides.evict(entity_id);
        debug!(%entity_id, evicted, "entity cache invalidated");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    use eavscope_core::registry::{SELLER_ENTITY_TYPE, seller_attributes};
    use eavscope_core::WebsiteId;
    use eavscope_storage::SqliteStorage;

    fn repository(config: EngineConfig) -> EntityRepository<SqliteStorage> {
        let mut storage = SqliteStorage::open_in_memory().unwrap();
        storage
            .install_attributes(SELLER_ENTITY_TYPE, &seller_attributes())
            .unwrap();
        storage
            .add_store(StoreId::new(2), WebsiteId::new(1), "fr")
            .unwrap();
        let registry = Arc::new(storage.load_registry(SELLER_ENTITY_TYPE).unwrap());
        EntityRepository::new(storage, registry, config).unwrap()
    }

    #[derive(Default)]
    struct Recorder {
        calls: Rc<RefCell<Vec<String>>>,
    }

    impl LifecycleHooks for Recorder {
        fn before_save(&self, entity: &mut Entity, _registry: &AttributeRegistry) -> Result<(), EngineError> {
            self.calls.borrow_mut().push(format!("before_save {}", entity.code));
            Ok(())
        }

        fn after_save(&self, entity: &Entity) -> Result<(), EngineError> {
            self.calls.borrow_mut().push(format!("after_save {}", entity.code));
            Ok(())
        }

        fn after_load(&self, entity: &mut Entity) -> Result<(), EngineError> {
            self.calls.borrow_mut().push(format!("after_load {}", entity.code));
            Ok(())
        }

        fn before_delete(&self, _entity_id: EntityId) -> Result<(), EngineError> {
            self.calls.borrow_mut().push("before_delete".into());
            Ok(())
        }
    }

    struct Veto;

    impl LifecycleHooks for Veto {
        fn before_delete(&self, entity_id: EntityId) -> Result<(), EngineError> {
            Err(EngineError::Hook(format!("entity {entity_id} is locked")))
        }
    }

    #[test]
    fn hooks_run_around_persistence_calls() {
        let mut repo = repository(EngineConfig::default());
        let recorder = Recorder::default();
        let calls = recorder.calls.clone();
        repo.add_hook(Box::new(recorder));

        let saved = repo.save(Entity::new("acme")).unwrap();
        let id = saved.require_id().unwrap();
        repo.get(id, None).unwrap();
        repo.get(id, None).unwrap();
        repo.delete_by_id(id).unwrap();

        assert_eq!(
            *calls.borrow(),
            vec!["before_save acme", "after_save acme", "after_load acme", "before_delete"]
        );
    }

    #[test]
    fn vetoed_delete_keeps_cache() {
        let mut repo = repository(EngineConfig::default());
        let saved = repo.save(Entity::new("acme")).unwrap();
        let id = saved.require_id().unwrap();
        repo.get(id, Some(StoreId::new(2))).unwrap();
        repo.add_hook(Box::new(Veto));

        assert!(matches!(repo.delete_by_id(id), Err(EngineError::Hook(_))));
        assert_eq!(repo.cached_entries(), 1);
    }

    #[test]
    fn configured_attribute_set_is_resolved_once() {
        let mut repo = repository(EngineConfig {
            attribute_set_name: Some("Marketplace".into()),
            ..EngineConfig::default()
        });
        let set_id = repo
            .persistence_mut()
            .create_attribute_set(SELLER_ENTITY_TYPE, "Marketplace")
            .unwrap();

        let saved = repo.save(Entity::new("acme")).unwrap();
        assert_eq!(saved.attribute_set_id, set_id);

        let before = repo.persistence().query_count();
        let again = repo.save(Entity::new("globex")).unwrap();
        assert_eq!(again.attribute_set_id, set_id);
        // Only the save itself reached storage.
        assert_eq!(repo.persistence().query_count() - before, 1);
    }

    #[test]
    fn missing_attribute_set_is_a_configuration_error() {
        let mut repo = repository(EngineConfig {
            attribute_set_name: Some("Nope".into()),
            ..EngineConfig::default()
        });
        assert!(matches!(
            repo.save(Entity::new("acme")),
            Err(EngineError::Configuration(_))
        ));
    }

    #[test]
    fn non_positive_ids_are_invalid_input() {
        let mut repo = repository(EngineConfig::default());
        assert!(matches!(
            repo.get(EntityId::new(0), None),
            Err(EngineError::InvalidInput(_))
        ));
        assert!(matches!(
            repo.delete_by_id(EntityId::new(-4)),
            Err(EngineError::InvalidInput(_))
        ));
    }

    #[test]
    fn registry_must_match_configured_entity_type() {
        let storage = SqliteStorage::open_in_memory().unwrap();
        let registry = Arc::new(AttributeRegistry::builder("customer").build().unwrap());
        let result = EntityRepository::new(storage, registry, EngineConfig::default());
        assert!(matches!(result, Err(EngineError::Configuration(_))));
    }
}
