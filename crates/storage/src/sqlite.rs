use std::cell::Cell;

use chrono::{NaiveDateTime, Utc};
use rusqlite::{CachedStatement, Connection, OptionalExtension};
use tracing::{debug, info};

use eavscope_core::{
    AttributeDefinition, AttributeId, AttributeRegistry, AttributeSetId, BackendType, CoreError,
    Entity, EntityId, Scope, StoreDirectory, StoreId, WebsiteId,
};

use crate::collection::{CollectionLoader, IDS_PER_QUERY};
use crate::error::StorageError;
use crate::overrides::{OverrideDetector, OverrideSet, OverrideSource};
use crate::persistor::{ScopedPersistor, ValueWrite, WriteMode};
use crate::traits::{EntityPersistence, EntityRecord};
use crate::value_table::{placeholders, to_sql};

pub struct SqliteStorage {
    conn: Connection,
    stores: StoreDirectory,
    /// Statements sent to SQLite since open.
    queries: Cell<u64>,
}

impl SqliteStorage {
    pub fn open(path: &str) -> Result<Self, StorageError> {
        let conn = Connection::open(path)?;
        info!(path, "opening attribute storage");
        Self::init(conn)
    }

    pub fn open_in_memory() -> Result<Self, StorageError> {
        let conn = Connection::open_in_memory()?;
        debug!("opening in-memory attribute storage");
        Self::init(conn)
    }

    fn init(conn: Connection) -> Result<Self, StorageError> {
        crate::schema::init_schema(&conn)?;
        let mut storage = Self {
            conn,
            stores: StoreDirectory::new(),
            queries: Cell::new(0),
        };
        storage.reload_store_directory()?;
        Ok(storage)
    }

    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Number of statements issued so far. Lets callers check batching.
    pub fn query_count(&self) -> u64 {
        self.queries.get()
    }

    pub(crate) fn count_queries(&self, n: u64) {
        self.queries.set(self.queries.get() + n);
    }

    /// Prepare a read statement, counting it as one round-trip.
    pub(crate) fn prepare(&self, sql: &str) -> Result<CachedStatement<'_>, StorageError> {
        self.count_queries(1);
        Ok(self.conn.prepare_cached(sql)?)
    }

    // ========================================================================
    // Stores
    // ========================================================================

    pub fn stores(&self) -> &StoreDirectory {
        &self.stores
    }

    pub fn add_store(
        &mut self,
        store_id: StoreId,
        website_id: WebsiteId,
        code: &str,
    ) -> Result<(), StorageError> {
        let mut stores = self.stores.clone();
        stores.insert(store_id, website_id)?;
        self.count_queries(1);
        self.conn
            .execute(
                "INSERT INTO store (store_id, website_id, code) VALUES (?1, ?2, ?3)
                 ON CONFLICT(store_id) DO UPDATE SET website_id = excluded.website_id, code = excluded.code",
                rusqlite::params![store_id.get(), website_id.get(), code],
            )
            .map_err(StorageError::from_write)?;
        self.stores = stores;
        Ok(())
    }

    pub fn reload_store_directory(&mut self) -> Result<(), StorageError> {
        let mut directory = StoreDirectory::new();
        {
            let mut stmt = self.prepare("SELECT store_id, website_id FROM store")?;
            let rows = stmt.query_map([], |row| Ok((row.get::<_, i64>(0)?, row.get::<_, i64>(1)?)))?;
            for row in rows {
                let (store_id, website_id) = row?;
                directory.insert(StoreId::new(store_id), WebsiteId::new(website_id))?;
            }
        }
        self.stores = directory;
        Ok(())
    }

    // ========================================================================
    // Attribute metadata
    // ========================================================================

    pub fn install_attributes(
        &mut self,
        entity_type: &str,
        attributes: &[AttributeDefinition],
    ) -> Result<(), StorageError> {
        let tx = self.conn.transaction()?;
        for attr in attributes {
            tx.execute(
                "INSERT INTO eav_attribute (attribute_id, entity_type, attribute_code, backend_type, scope) VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT(attribute_id) DO UPDATE SET attribute_code = excluded.attribute_code, backend_type = excluded.backend_type, scope = excluded.scope",
                rusqlite::params![
                    attr.attribute_id.get(),
                    entity_type,
                    attr.code,
                    attr.backend_type.as_str(),
                    attr.scope.as_str(),
                ],
            )
            .map_err(StorageError::from_write)?;
        }
        tx.commit()?;
        self.count_queries(attributes.len() as u64);
        info!(entity_type, count = attributes.len(), "attributes installed");
        Ok(())
    }

    /// Build the registry for `entity_type` from the attribute table. An
    /// unknown backend type or scope aborts the load.
    pub fn load_registry(&self, entity_type: &str) -> Result<AttributeRegistry, StorageError> {
        let mut stmt = self.prepare(
            "SELECT attribute_id, attribute_code, backend_type, scope FROM eav_attribute WHERE entity_type = ?1 ORDER BY attribute_id",
        )?;
        let rows = stmt.query_map(rusqlite::params![entity_type], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
            ))
        })?;

        let mut builder = AttributeRegistry::builder(entity_type);
        for row in rows {
            let (attribute_id, code, backend_type, scope) = row?;
            let backend_type = BackendType::parse(&backend_type).map_err(|e| {
                CoreError::Configuration(format!("attribute {code}: {e}"))
            })?;
            let scope = Scope::parse(&scope)?;
            builder = builder.definition(AttributeDefinition::new(
                AttributeId::new(attribute_id),
                code,
                backend_type,
                scope,
            ));
        }
        Ok(builder.build()?)
    }

    pub fn create_attribute_set(
        &mut self,
        entity_type: &str,
        name: &str,
    ) -> Result<AttributeSetId, StorageError> {
        self.count_queries(1);
        self.conn
            .execute(
                "INSERT INTO attribute_set (entity_type, attribute_set_name) VALUES (?1, ?2)",
                rusqlite::params![entity_type, name],
            )
            .map_err(StorageError::from_write)?;
        Ok(AttributeSetId::new(self.conn.last_insert_rowid()))
    }

    // ========================================================================
    // Entity rows
    // ========================================================================

    pub fn get_entity(&self, entity_id: EntityId) -> Result<Option<EntityRecord>, StorageError> {
        let mut stmt = self.prepare(
            "SELECT entity_id, code, attribute_set_id, created_at, updated_at FROM seller_entity WHERE entity_id = ?1",
        )?;
        let record = stmt
            .query_row(rusqlite::params![entity_id.get()], read_entity_record)
            .optional()?;
        Ok(record)
    }

    pub fn get_entities(&self, entity_ids: &[EntityId]) -> Result<Vec<EntityRecord>, StorageError> {
        let mut records = Vec::with_capacity(entity_ids.len());
        for chunk in entity_ids.chunks(IDS_PER_QUERY) {
            let sql = format!(
                "SELECT entity_id, code, attribute_set_id, created_at, updated_at FROM seller_entity WHERE entity_id IN ({}) ORDER BY entity_id",
                placeholders(chunk.len())
            );
            let mut stmt = self.prepare(&sql)?;
            let rows = stmt.query_map(
                rusqlite::params_from_iter(chunk.iter().map(EntityId::get)),
                read_entity_record,
            )?;
            for row in rows {
                records.push(row?);
            }
        }
        records.sort_by_key(|r| r.entity_id);
        Ok(records)
    }

    /// Every entity, optionally restricted to one attribute set.
    pub fn list_entities(
        &self,
        attribute_set_id: Option<AttributeSetId>,
    ) -> Result<Vec<EntityRecord>, StorageError> {
        let records = match attribute_set_id {
            Some(set_id) => {
                let mut stmt = self.prepare(
                    "SELECT entity_id, code, attribute_set_id, created_at, updated_at FROM seller_entity WHERE attribute_set_id = ?1 ORDER BY entity_id",
                )?;
                stmt.query_map(rusqlite::params![set_id.get()], read_entity_record)?
                    .collect::<Result<Vec<_>, _>>()?
            }
            None => {
                let mut stmt = self.prepare(
                    "SELECT entity_id, code, attribute_set_id, created_at, updated_at FROM seller_entity ORDER BY entity_id",
                )?;
                stmt.query_map([], read_entity_record)?
                    .collect::<Result<Vec<_>, _>>()?
            }
        };
        Ok(records)
    }

    /// Load a whole collection resolved for `store`: one query for the entity
    /// rows plus one per value table touched by `codes` (all when empty).
    pub fn load_collection(
        &self,
        registry: &AttributeRegistry,
        store: StoreId,
        attribute_set_id: Option<AttributeSetId>,
        codes: &[&str],
    ) -> Result<Vec<Entity>, StorageError> {
        let records = self.list_entities(attribute_set_id)?;
        let ids: Vec<EntityId> = records.iter().map(|r| r.entity_id).collect();
        let mut values = CollectionLoader::new(self, registry).load(&ids, store, codes)?;

        Ok(records
            .into_iter()
            .map(|record| {
                let entity_id = record.entity_id;
                let mut entity = record.into_entity(Some(store));
                entity.load_attributes(values.remove(&entity_id).unwrap_or_default());
                entity
            })
            .collect())
    }
}

fn read_entity_record(row: &rusqlite::Row) -> rusqlite::Result<EntityRecord> {
    Ok(EntityRecord {
        entity_id: EntityId::new(row.get(0)?),
        code: row.get(1)?,
        attribute_set_id: AttributeSetId::new(row.get(2)?),
        created_at: row.get(3)?,
        updated_at: row.get(4)?,
    })
}

fn apply_write(
    tx: &rusqlite::Transaction,
    entity_id: EntityId,
    write: &ValueWrite,
) -> Result<(), StorageError> {
    let table = write.table.name();
    let result = match write.mode {
        WriteMode::Upsert => tx.execute(
            &format!(
                "INSERT INTO {table} (attribute_id, store_id, entity_id, value) VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(entity_id, attribute_id, store_id) DO UPDATE SET value = excluded.value"
            ),
            rusqlite::params![
                write.attribute_id.get(),
                write.store_id.get(),
                entity_id.get(),
                to_sql(&write.value),
            ],
        ),
        WriteMode::InsertIfAbsent => tx.execute(
            &format!(
                "INSERT INTO {table} (attribute_id, store_id, entity_id, value) VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(entity_id, attribute_id, store_id) DO NOTHING"
            ),
            rusqlite::params![
                write.attribute_id.get(),
                write.store_id.get(),
                entity_id.get(),
                to_sql(&write.value),
            ],
        ),
        WriteMode::Delete => tx.execute(
            &format!("DELETE FROM {table} WHERE attribute_id = ?1 AND store_id = ?2 AND entity_id = ?3"),
            rusqlite::params![write.attribute_id.get(), write.store_id.get(), entity_id.get()],
        ),
        WriteMode::DeleteAllStores => tx.execute(
            &format!("DELETE FROM {table} WHERE attribute_id = ?1 AND entity_id = ?2"),
            rusqlite::params![write.attribute_id.get(), entity_id.get()],
        ),
    };
    result.map_err(StorageError::from_write)?;
    Ok(())
}

impl EntityPersistence for SqliteStorage {
    fn load(
        &self,
        registry: &AttributeRegistry,
        entity_id: EntityId,
        store: Option<StoreId>,
    ) -> Result<Option<Entity>, StorageError> {
        let Some(record) = self.get_entity(entity_id)? else {
            return Ok(None);
        };
        let mut values = CollectionLoader::new(self, registry).load(
            &[entity_id],
            store.unwrap_or(StoreId::DEFAULT),
            &[],
        )?;
        let mut entity = record.into_entity(store);
        entity.load_attributes(values.remove(&entity_id).unwrap_or_default());
        Ok(Some(entity))
    }

    fn save(&mut self, registry: &AttributeRegistry, entity: &Entity) -> Result<Entity, StorageError> {
        Entity::validate_code(&entity.code)?;
        let writes = ScopedPersistor::plan(entity, registry, &self.stores)?;
        let now = Utc::now().naive_utc();

        let tx = self.conn.transaction()?;
        let (entity_id, created_at) = match entity.id {
            None => {
                tx.execute(
                    "INSERT INTO seller_entity (attribute_set_id, code, created_at, updated_at) VALUES (?1, ?2, ?3, ?3)",
                    rusqlite::params![entity.attribute_set_id.get(), entity.code, now],
                )
                .map_err(StorageError::from_write)?;
                (EntityId::new(tx.last_insert_rowid()), now)
            }
            Some(entity_id) => {
                let created_at: Option<NaiveDateTime> = tx
                    .query_row(
                        "UPDATE seller_entity SET attribute_set_id = ?1, code = ?2, updated_at = ?3 WHERE entity_id = ?4 RETURNING created_at",
                        rusqlite::params![entity.attribute_set_id.get(), entity.code, now, entity_id.get()],
                        |row| row.get(0),
                    )
                    .optional()
                    .map_err(StorageError::from_write)?;
                let created_at =
                    created_at.ok_or_else(|| StorageError::NotFound(format!("entity {entity_id}")))?;
                (entity_id, created_at)
            }
        };

        for write in &writes {
            apply_write(&tx, entity_id, write)?;
        }
        tx.commit()?;
        self.count_queries(1 + writes.len() as u64);
        info!(%entity_id, code = %entity.code, rows = writes.len(), "entity saved");

        let mut saved = entity.clone();
        saved.id = Some(entity_id);
        saved.created_at = Some(created_at);
        saved.updated_at = Some(now);
        saved.mark_clean();
        Ok(saved)
    }

    fn delete(&mut self, entity_id: EntityId) -> Result<bool, StorageError> {
        let tx = self.conn.transaction()?;
        let changes = tx
            .execute(
                "DELETE FROM seller_entity WHERE entity_id = ?1",
                rusqlite::params![entity_id.get()],
            )
            .map_err(StorageError::from_write)?;
        tx.commit()?;
        self.count_queries(1);
        info!(%entity_id, deleted = changes > 0, "entity delete");
        Ok(changes > 0)
    }

    fn id_by_code(&self, code: &str) -> Result<Option<EntityId>, StorageError> {
        let mut stmt = self.prepare("SELECT entity_id FROM seller_entity WHERE code = ?1")?;
        let id = stmt
            .query_row(rusqlite::params![code], |row| row.get::<_, i64>(0))
            .optional()?;
        Ok(id.map(EntityId::new))
    }

    fn attribute_set_id_by_name(
        &self,
        entity_type: &str,
        name: &str,
    ) -> Result<Option<AttributeSetId>, StorageError> {
        let mut stmt = self.prepare(
            "SELECT attribute_set_id FROM attribute_set WHERE entity_type = ?1 AND attribute_set_name = ?2",
        )?;
        let id = stmt
            .query_row(rusqlite::params![entity_type, name], |row| row.get::<_, i64>(0))
            .optional()?;
        Ok(id.map(AttributeSetId::new))
    }
}

impl OverrideSource for SqliteStorage {
    fn load_overrides(
        &self,
        registry: &AttributeRegistry,
        entity_id: EntityId,
        store: StoreId,
    ) -> Result<OverrideSet, StorageError> {
        OverrideDetector::new(self, registry).load_overrides(entity_id, store)
    }
}
