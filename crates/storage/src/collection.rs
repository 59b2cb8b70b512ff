use std::collections::BTreeMap;

use rusqlite::types::Value;
use tracing::debug;

use eavscope_core::{
    AttributeDefinition, AttributeId, AttributeRegistry, AttributeValue, EntityId, StoreId,
};

use crate::error::StorageError;
use crate::sqlite::SqliteStorage;
use crate::value_table::{ValueTable, placeholders};

/// Resolved dynamic values of one entity, keyed by attribute code.
pub type AttributeMap = BTreeMap<String, AttributeValue>;

/// Entity ids bound per statement, well under SQLite's variable limit.
pub const IDS_PER_QUERY: usize = 500;

/// Loads effective values for many entities at once, issuing one query per
/// value table and chunk of `IDS_PER_QUERY` ids instead of one per entity
/// and attribute.
pub struct CollectionLoader<'a> {
    storage: &'a SqliteStorage,
    registry: &'a AttributeRegistry,
}

impl<'a> CollectionLoader<'a> {
    pub fn new(storage: &'a SqliteStorage, registry: &'a AttributeRegistry) -> Self {
        Self { storage, registry }
    }

    /// Effective values of `codes` (every dynamic attribute when empty) for
    /// each of `entity_ids` at `store`. Static codes are skipped; they live
    /// on the entity rows. Entities with no stored values are absent from the
    /// result.
    pub fn load(
        &self,
        entity_ids: &[EntityId],
        store: StoreId,
        codes: &[&str],
    ) -> Result<BTreeMap<EntityId, AttributeMap>, StorageError> {
        let mut out: BTreeMap<EntityId, AttributeMap> = BTreeMap::new();
        if entity_ids.is_empty() {
            return Ok(out);
        }

        let groups = self.registry.group_by_backend(codes)?;
        for (backend, attrs) in groups {
            let table = ValueTable::for_backend(backend)?;
            for chunk in entity_ids.chunks(IDS_PER_QUERY) {
                let rows = self.load_table(table, &attrs, chunk, store)?;
                debug!(table = table.name(), %store, ids = chunk.len(), rows = rows.len(), "collection values loaded");

                for (entity_id, attribute_id, value) in rows {
                    let Some(attr) = self.registry.by_id(attribute_id) else {
                        continue;
                    };
                    out.entry(entity_id)
                        .or_default()
                        .insert(attr.code.clone(), value);
                }
            }
        }
        Ok(out)
    }

    fn load_table(
        &self,
        table: ValueTable,
        attrs: &[&AttributeDefinition],
        entity_ids: &[EntityId],
        store: StoreId,
    ) -> Result<Vec<(EntityId, AttributeId, AttributeValue)>, StorageError> {
        let scoped: Vec<i64> = attrs
            .iter()
            .filter(|a| a.scope.allows_store_values())
            .map(|a| a.attribute_id.get())
            .collect();

        let mut params: Vec<Value> = entity_ids.iter().map(|id| Value::Integer(id.get())).collect();
        params.extend(attrs.iter().map(|a| Value::Integer(a.attribute_id.get())));

        let t = table.name();
        let entity_in = placeholders(entity_ids.len());
        let attribute_in = placeholders(attrs.len());

        let sql = if store.is_default() || scoped.is_empty() {
            format!(
                "SELECT entity_id, attribute_id, value FROM {t}
                 WHERE store_id = 0 AND entity_id IN ({entity_in}) AND attribute_id IN ({attribute_in})"
            )
        } else {
            // Keys present at either store, then the override row when the
            // attribute may vary per store, else the default row.
            params.push(Value::Integer(store.get()));
            params.push(Value::Integer(store.get()));
            params.extend(scoped.iter().map(|id| Value::Integer(*id)));
            format!(
                "SELECT k.entity_id, k.attribute_id,
                        CASE WHEN o.value_id IS NOT NULL THEN o.value ELSE d.value END
                 FROM (
                     SELECT DISTINCT entity_id, attribute_id FROM {t}
                     WHERE entity_id IN ({entity_in}) AND attribute_id IN ({attribute_in}) AND store_id IN (0, ?)
                 ) AS k
                 LEFT JOIN {t} AS d
                     ON d.entity_id = k.entity_id AND d.attribute_id = k.attribute_id AND d.store_id = 0
                 LEFT JOIN {t} AS o
                     ON o.entity_id = k.entity_id AND o.attribute_id = k.attribute_id AND o.store_id = ?
                     AND o.attribute_id IN ({})
                 WHERE o.value_id IS NOT NULL OR d.value_id IS NOT NULL",
                placeholders(scoped.len())
            )
        };

        let mut stmt = self.storage.prepare(&sql)?;
        let rows = stmt
            .query_map(rusqlite::params_from_iter(params), |row| {
                Ok((
                    EntityId::new(row.get(0)?),
                    AttributeId::new(row.get(1)?),
                    table.read_value(row, 2)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }
}
