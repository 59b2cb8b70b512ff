use std::collections::BTreeMap;

use eavscope_core::{
    AttributeId, AttributeRegistry, AttributeValue, EntityId, ScopeResolver, StoreId,
};

use crate::error::StorageError;
use crate::sqlite::SqliteStorage;
use crate::value_table::{ValueTable, placeholders, to_sql};

/// One stored row of a value table.
#[derive(Debug, Clone, PartialEq)]
pub struct ValueRow {
    pub value_id: i64,
    pub entity_id: EntityId,
    pub attribute_id: AttributeId,
    pub store_id: StoreId,
    pub value: AttributeValue,
}

impl SqliteStorage {
    /// Write a single value row outside of an entity save.
    pub fn upsert_value(
        &self,
        table: ValueTable,
        entity_id: EntityId,
        attribute_id: AttributeId,
        store_id: StoreId,
        value: &AttributeValue,
    ) -> Result<(), StorageError> {
        self.count_queries(1);
        self.conn()
            .execute(
                &format!(
                    "INSERT INTO {} (attribute_id, store_id, entity_id, value) VALUES (?1, ?2, ?3, ?4)
                     ON CONFLICT(entity_id, attribute_id, store_id) DO UPDATE SET value = excluded.value",
                    table.name()
                ),
                rusqlite::params![attribute_id.get(), store_id.get(), entity_id.get(), to_sql(value)],
            )
            .map_err(StorageError::from_write)?;
        Ok(())
    }

    pub fn delete_value(
        &self,
        table: ValueTable,
        entity_id: EntityId,
        attribute_id: AttributeId,
        store_id: StoreId,
    ) -> Result<bool, StorageError> {
        self.count_queries(1);
        let changes = self.conn().execute(
            &format!(
                "DELETE FROM {} WHERE attribute_id = ?1 AND store_id = ?2 AND entity_id = ?3",
                table.name()
            ),
            rusqlite::params![attribute_id.get(), store_id.get(), entity_id.get()],
        )?;
        Ok(changes > 0)
    }

    /// Raw rows for one attribute of one entity, every store unless
    /// `stores` narrows it.
    pub fn fetch_rows(
        &self,
        table: ValueTable,
        entity_id: EntityId,
        attribute_id: AttributeId,
        stores: Option<&[StoreId]>,
    ) -> Result<Vec<ValueRow>, StorageError> {
        let mut sql = format!(
            "SELECT value_id, entity_id, attribute_id, store_id, value FROM {} WHERE entity_id = ? AND attribute_id = ?",
            table.name()
        );
        let mut params = vec![entity_id.get(), attribute_id.get()];
        if let Some(stores) = stores {
            if stores.is_empty() {
                return Ok(Vec::new());
            }
            sql.push_str(&format!(" AND store_id IN ({})", placeholders(stores.len())));
            params.extend(stores.iter().map(StoreId::get));
        }
        sql.push_str(" ORDER BY store_id");

        let mut stmt = self.prepare(&sql)?;
        let rows = stmt
            .query_map(rusqlite::params_from_iter(params), |row| {
                Ok(ValueRow {
                    value_id: row.get(0)?,
                    entity_id: EntityId::new(row.get(1)?),
                    attribute_id: AttributeId::new(row.get(2)?),
                    store_id: StoreId::new(row.get(3)?),
                    value: table.read_value(row, 4)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Effective value of one attribute at `store`, read row by row. The
    /// collection loader must agree with this for every entity.
    pub fn resolve_value(
        &self,
        registry: &AttributeRegistry,
        entity_id: EntityId,
        code: &str,
        store: StoreId,
    ) -> Result<Option<AttributeValue>, StorageError> {
        let attr = registry.get(code)?;
        let table = ValueTable::for_backend(attr.backend_type)?;
        let stores = ScopeResolver::read_stores(attr, store);

        let by_store: BTreeMap<StoreId, AttributeValue> = self
            .fetch_rows(table, entity_id, attr.attribute_id, Some(&stores))?
            .into_iter()
            .map(|row| (row.store_id, row.value))
            .collect();
        Ok(ScopeResolver::pick(attr, store, &by_store).cloned())
    }
}
