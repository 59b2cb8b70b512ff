use std::collections::BTreeMap;

use chrono::NaiveDateTime;

use crate::error::CoreError;
use crate::ids::{AttributeSetId, EntityId, StoreId};
use crate::value::AttributeValue;

/// Longest code accepted by the entity table.
pub const CODE_MAX_LEN: usize = 64;

/// Static attribute codes backed by entity table columns.
pub const STATIC_CODE: &str = "code";
pub const STATIC_CREATED_AT: &str = "created_at";
pub const STATIC_UPDATED_AT: &str = "updated_at";

/// An entity row plus its dynamic attribute values as resolved for `store_id`.
#[derive(Debug, Clone, PartialEq)]
pub struct Entity {
    pub id: Option<EntityId>,
    pub code: String,
    pub attribute_set_id: AttributeSetId,
    pub created_at: Option<NaiveDateTime>,
    pub updated_at: Option<NaiveDateTime>,
    /// Store the values were resolved for, or will be written under.
    /// `None` means unscoped, which reads and writes the default store.
    pub store_id: Option<StoreId>,
    attributes: BTreeMap<String, AttributeValue>,
    /// Values as last read from or written to storage. Saves only write
    /// codes whose value differs from this snapshot.
    loaded: BTreeMap<String, AttributeValue>,
}

impl Entity {
    pub fn new(code: impl Into<String>) -> Self {
        Self {
            id: None,
            code: code.into(),
            attribute_set_id: AttributeSetId::NONE,
            created_at: None,
            updated_at: None,
            store_id: None,
            attributes: BTreeMap::new(),
            loaded: BTreeMap::new(),
        }
    }

    pub fn with_store(mut self, store_id: StoreId) -> Self {
        self.store_id = Some(store_id);
        self
    }

    pub fn with_attribute(mut self, code: &str, value: impl Into<AttributeValue>) -> Self {
        self.set(code, value);
        self
    }

    /// Store the entity is scoped to, falling back to the default store.
    pub fn effective_store(&self) -> StoreId {
        self.store_id.unwrap_or(StoreId::DEFAULT)
    }

    pub fn get(&self, code: &str) -> Option<&AttributeValue> {
        self.attributes.get(code)
    }

    pub fn get_text(&self, code: &str) -> Option<&str> {
        self.get(code).and_then(AttributeValue::as_text)
    }

    pub fn set(&mut self, code: &str, value: impl Into<AttributeValue>) {
        self.attributes.insert(code.to_string(), value.into());
    }

    pub fn unset(&mut self, code: &str) -> Option<AttributeValue> {
        self.attributes.remove(code)
    }

    pub fn attributes(&self) -> &BTreeMap<String, AttributeValue> {
        &self.attributes
    }

    pub fn set_attributes(&mut self, attributes: BTreeMap<String, AttributeValue>) {
        self.attributes = attributes;
    }

    /// Replace the values with ones resolved by storage. They count as
    /// unchanged until the caller sets them again.
    pub fn load_attributes(&mut self, attributes: BTreeMap<String, AttributeValue>) {
        self.loaded = attributes.clone();
        self.attributes = attributes;
    }

    /// Treat the current values as persisted.
    pub fn mark_clean(&mut self) {
        self.loaded = self.attributes.clone();
    }

    /// Codes set since the entity was loaded or saved, with their values.
    /// Codes removed with `unset` are not changes; set `Null` to clear one.
    pub fn changed_attributes(&self) -> impl Iterator<Item = (&String, &AttributeValue)> {
        self.attributes
            .iter()
            .filter(|(code, value)| self.loaded.get(*code) != Some(*value))
    }

    pub fn is_changed(&self, code: &str) -> bool {
        self.attributes
            .get(code)
            .is_some_and(|value| self.loaded.get(code) != Some(value))
    }

    /// Require the identity assigned by storage.
    pub fn require_id(&self) -> Result<EntityId, CoreError> {
        self.id
            .ok_or_else(|| CoreError::InvalidInput(format!("entity {} has no id", self.code)))
    }

    pub fn validate_code(code: &str) -> Result<(), CoreError> {
        if code.is_empty() {
            return Err(CoreError::InvalidInput("entity code is empty".into()));
        }
        if code.chars().count() > CODE_MAX_LEN {
            return Err(CoreError::InvalidInput(format!(
                "entity code exceeds {CODE_MAX_LEN} characters: {code}"
            )));
        }
        Ok(())
    }
}
