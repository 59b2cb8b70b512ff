use std::collections::{BTreeMap, HashMap, HashSet};

use rusqlite::types::Value;
use tracing::debug;

use eavscope_core::{AttributeId, AttributeRegistry, AttributeValue, EntityId, StoreId};

use crate::error::StorageError;
use crate::sqlite::SqliteStorage;
use crate::value_table::{ValueTable, placeholders};

/// Attribute codes that carry an explicit row at one store for one entity.
#[derive(Debug, Clone, PartialEq)]
pub struct OverrideSet {
    entity_id: EntityId,
    store_id: StoreId,
    overridden: HashSet<String>,
    /// Default-store values seen by the same query.
    defaults: HashMap<String, AttributeValue>,
}

impl OverrideSet {
    pub fn empty(entity_id: EntityId, store_id: StoreId) -> Self {
        Self {
            entity_id,
            store_id,
            overridden: HashSet::new(),
            defaults: HashMap::new(),
        }
    }

    pub fn entity_id(&self) -> EntityId {
        self.entity_id
    }

    pub fn store_id(&self) -> StoreId {
        self.store_id
    }

    pub fn contains(&self, code: &str) -> bool {
        self.overridden.contains(code)
    }

    pub fn len(&self) -> usize {
        self.overridden.len()
    }

    pub fn is_empty(&self) -> bool {
        self.overridden.is_empty()
    }

    pub fn codes(&self) -> impl Iterator<Item = &str> {
        self.overridden.iter().map(String::as_str)
    }

    pub fn default_value(&self, code: &str) -> Option<&AttributeValue> {
        self.defaults.get(code)
    }

    pub fn default_values(&self) -> &HashMap<String, AttributeValue> {
        &self.defaults
    }
}

/// Anything that can answer which attributes an entity overrides at a store.
pub trait OverrideSource {
    fn load_overrides(
        &self,
        registry: &AttributeRegistry,
        entity_id: EntityId,
        store: StoreId,
    ) -> Result<OverrideSet, StorageError>;
}

pub struct OverrideDetector<'a> {
    storage: &'a SqliteStorage,
    registry: &'a AttributeRegistry,
}

impl<'a> OverrideDetector<'a> {
    pub fn new(storage: &'a SqliteStorage, registry: &'a AttributeRegistry) -> Self {
        Self { storage, registry }
    }

    /// One query across every value table holding a store-varying
    /// attribute. The default store short-circuits to an empty set.
    pub fn load_overrides(
        &self,
        entity_id: EntityId,
        store: StoreId,
    ) -> Result<OverrideSet, StorageError> {
        let mut set = OverrideSet::empty(entity_id, store);
        if store.is_default() {
            return Ok(set);
        }

        let mut groups: BTreeMap<ValueTable, Vec<i64>> = BTreeMap::new();
        for attr in self.registry.scoped() {
            let table = ValueTable::for_backend(attr.backend_type)?;
            groups.entry(table).or_default().push(attr.attribute_id.get());
        }
        if groups.is_empty() {
            return Ok(set);
        }

        let mut selects = Vec::with_capacity(groups.len());
        let mut params: Vec<Value> = Vec::new();
        for (table, attribute_ids) in &groups {
            selects.push(format!(
                "SELECT attribute_id, store_id, value FROM {} WHERE entity_id = ? AND attribute_id IN ({}) AND store_id IN (0, ?)",
                table.name(),
                placeholders(attribute_ids.len())
            ));
            params.push(Value::Integer(entity_id.get()));
            params.extend(attribute_ids.iter().map(|id| Value::Integer(*id)));
            params.push(Value::Integer(store.get()));
        }
        let sql = selects.join(" UNION ALL ");

        let mut stmt = self.storage.prepare(&sql)?;
        let mut rows = stmt.query(rusqlite::params_from_iter(params))?;
        while let Some(row) = rows.next()? {
            let attribute_id = AttributeId::new(row.get(0)?);
            let row_store = StoreId::new(row.get(1)?);
            let Some(attr) = self.registry.by_id(attribute_id) else {
                continue;
            };
            if row_store == store {
                set.overridden.insert(attr.code.clone());
            } else {
                let value = ValueTable::for_backend(attr.backend_type)?.read_value(row, 2)?;
                set.defaults.insert(attr.code.clone(), value);
            }
        }
        debug!(%entity_id, %store, overridden = set.len(), "overrides loaded");
        Ok(set)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::EntityPersistence;
    use eavscope_core::registry::{SELLER_ENTITY_TYPE, seller_attributes};
    use eavscope_core::{Entity, WebsiteId};

    #[test]
    fn override_is_exact_store_membership() {
        let mut storage = SqliteStorage::open_in_memory().unwrap();
        storage
            .install_attributes(SELLER_ENTITY_TYPE, &seller_attributes())
            .unwrap();
        storage
            .add_store(StoreId::new(2), WebsiteId::new(1), "fr")
            .unwrap();
        storage
            .add_store(StoreId::new(3), WebsiteId::new(1), "be")
            .unwrap();
        let registry = storage.load_registry(SELLER_ENTITY_TYPE).unwrap();

        let saved = storage
            .save(
                &registry,
                &Entity::new("acme")
                    .with_attribute("name", "Acme Default")
                    .with_attribute("is_active", true),
            )
            .unwrap();
        let id = saved.require_id().unwrap();

        let mut fr = saved.clone().with_store(StoreId::new(2));
        fr.set("name", "Acme FR");
        fr.set("description", "Boutique");
        storage.save(&registry, &fr).unwrap();

        let detector = OverrideDetector::new(&storage, &registry);
        let before = storage.query_count();
        let at_fr = detector.load_overrides(id, StoreId::new(2)).unwrap();
        assert_eq!(storage.query_count() - before, 1);
        assert!(at_fr.contains("name"));
        assert!(at_fr.contains("description"));
        assert!(!at_fr.contains("is_active"));
        assert_eq!(
            at_fr.default_value("name"),
            Some(&AttributeValue::from("Acme Default"))
        );

        assert!(detector.load_overrides(id, StoreId::new(3)).unwrap().is_empty());

        let before = storage.query_count();
        assert!(detector.load_overrides(id, StoreId::DEFAULT).unwrap().is_empty());
        assert_eq!(storage.query_count(), before);
    }
}
