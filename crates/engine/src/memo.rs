use std::collections::HashMap;
use std::collections::hash_map::Entry;

use eavscope_core::{EntityId, StoreId};
use eavscope_storage::OverrideSet;

/// Override sets computed in this context, one per (entity, store).
#[derive(Default)]
pub struct OverrideMemo {
    sets: HashMap<(EntityId, StoreId), OverrideSet>,
}

impl OverrideMemo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, entity_id: EntityId, store: StoreId) -> Option<&OverrideSet> {
        self.sets.get(&(entity_id, store))
    }

    pub fn insert(&mut self, set: OverrideSet) -> &OverrideSet {
        self.sets
            .entry((set.entity_id(), set.store_id()))
            .insert_entry(set)
            .into_mut()
    }

    /// The memoised set for (entity, store), computing it with `load` on a
    /// miss. A failed load memoises nothing.
    pub fn get_or_try_insert_with<E>(
        &mut self,
        entity_id: EntityId,
        store: StoreId,
        load: impl FnOnce() -> Result<OverrideSet, E>,
    ) -> Result<&OverrideSet, E> {
        match self.sets.entry((entity_id, store)) {
            Entry::Occupied(entry) => Ok(entry.into_mut()),
            Entry::Vacant(entry) => Ok(entry.insert(load()?)),
        }
    }

    pub fn evict(&mut self, entity_id: EntityId) {
        self.sets.retain(|(id, _), _| *id != entity_id);
    }

    pub fn clear(&mut self) {
        self.sets.clear();
    }

    pub fn len(&self) -> usize {
        self.sets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sets.is_empty()
    }
}
