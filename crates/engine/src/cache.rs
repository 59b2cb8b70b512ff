use std::num::NonZeroUsize;

use lru::LruCache;
use tracing::warn;

use eavscope_core::{Entity, EntityId, StoreId};

/// Store key of a cached entity. `All` is an unscoped load.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheScope {
    All,
    Store(StoreId),
}

impl From<Option<StoreId>> for CacheScope {
    fn from(store: Option<StoreId>) -> Self {
        match store {
            Some(store) => CacheScope::Store(store),
            None => CacheScope::All,
        }
    }
}

/// Resolved entities keyed by (id, store). An entry is never shared across
/// stores. The least recently used entry goes once `capacity` is reached.
pub struct EntityCache {
    entries: LruCache<(EntityId, CacheScope), Entity>,
}

impl EntityCache {
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: LruCache::new(capacity),
        }
    }

    /// Look up an entry, marking it as recently used.
    pub fn get(&mut self, entity_id: EntityId, scope: CacheScope) -> Option<&Entity> {
        self.entries.get(&(entity_id, scope))
    }

    pub fn insert(&mut self, entity_id: EntityId, scope: CacheScope, entity: Entity) {
        let key = (entity_id, scope);
        if let Some((evicted, _)) = self.entries.push(key, entity) {
            if evicted != key {
                warn!(
                    entity_id = %evicted.0,
                    scope = ?evicted.1,
                    capacity = self.entries.cap().get(),
                    "entity cache full, evicting least recently used entry"
                );
            }
        }
    }

    /// Drop every scope cached for `entity_id`.
    pub fn evict(&mut self, entity_id: EntityId) -> usize {
        let keys: Vec<(EntityId, CacheScope)> = self
            .entries
            .iter()
            .map(|(key, _)| *key)
            .filter(|(id, _)| *id == entity_id)
            .collect();
        for key in &keys {
            self.entries.pop(key);
        }
        keys.len()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
