use std::collections::BTreeSet;

use tracing::debug;

use eavscope_core::{
    AttributeDefinition, AttributeId, AttributeRegistry, AttributeValue, CoreError, Entity, Scope,
    ScopeResolver, StoreDirectory, StoreId,
};

use crate::value_table::ValueTable;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMode {
    Upsert,
    /// Create the row only when none exists yet.
    InsertIfAbsent,
    Delete,
    /// Remove the attribute's rows at every store.
    DeleteAllStores,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ValueWrite {
    pub table: ValueTable,
    pub attribute_id: AttributeId,
    pub store_id: StoreId,
    pub value: AttributeValue,
    pub mode: WriteMode,
}

/// Decides which store rows an attribute write lands on.
pub struct ScopedPersistor;

impl ScopedPersistor {
    /// Global attributes are always written to the default store, whatever
    /// store the save was issued under.
    pub fn write_store(attr: &AttributeDefinition, requested: StoreId) -> StoreId {
        let store = ScopeResolver::effective_store_for(attr, requested);
        if store != requested {
            debug!(attribute = %attr.code, %requested, "global attribute redirected to default store");
        }
        store
    }

    /// Turn the attributes changed since load into value row writes.
    pub fn plan(
        entity: &Entity,
        registry: &AttributeRegistry,
        stores: &StoreDirectory,
    ) -> Result<Vec<ValueWrite>, CoreError> {
        let requested = entity.effective_store();
        if !stores.contains(requested) {
            return Err(CoreError::NotFound(format!("store {requested}")));
        }

        let mut writes = Vec::new();
        for (code, value) in entity.changed_attributes() {
            let attr = registry.get(code).map_err(|_| {
                CoreError::InvalidInput(format!(
                    "unknown attribute {code} for entity type {}",
                    registry.entity_type()
                ))
            })?;
            if attr.is_static() {
                continue;
            }
            value.validate_for(code, attr.backend_type)?;
            let table = ValueTable::for_backend(attr.backend_type)?;

            let target = Self::write_store(attr, requested);
            // Overrides never outlive the default row they sit on.
            if value.is_null() && target.is_default() {
                writes.push(ValueWrite {
                    table,
                    attribute_id: attr.attribute_id,
                    store_id: StoreId::DEFAULT,
                    value: AttributeValue::Null,
                    mode: WriteMode::DeleteAllStores,
                });
                continue;
            }
            let targets: BTreeSet<StoreId> = match attr.scope {
                Scope::Website if !target.is_default() => {
                    stores.stores_in_website(stores.website_of(target)?)
                }
                _ => BTreeSet::from([target]),
            };

            let mut default_ensured = false;
            for store_id in targets {
                if value.is_null() {
                    writes.push(ValueWrite {
                        table,
                        attribute_id: attr.attribute_id,
                        store_id,
                        value: AttributeValue::Null,
                        mode: WriteMode::Delete,
                    });
                    continue;
                }
                // An override is only meaningful on top of a default row.
                if !store_id.is_default() && !default_ensured {
                    writes.push(ValueWrite {
                        table,
                        attribute_id: attr.attribute_id,
                        store_id: StoreId::DEFAULT,
                        value: value.clone(),
                        mode: WriteMode::InsertIfAbsent,
                    });
                    default_ensured = true;
                }
                writes.push(ValueWrite {
                    table,
                    attribute_id: attr.attribute_id,
                    store_id,
                    value: value.clone(),
                    mode: WriteMode::Upsert,
                });
            }
        }
        Ok(writes)
    }
}
