//! Attribute metadata for one entity type.
//!
//! A registry is built once per process (from storage or from the builder)
//! and shared as `Arc<AttributeRegistry>`. Nothing mutates it afterwards.

use std::collections::{BTreeMap, HashMap};

use crate::attribute::{AttributeDefinition, BackendType, Scope};
use crate::entity::{STATIC_CODE, STATIC_CREATED_AT, STATIC_UPDATED_AT};
use crate::error::CoreError;
use crate::ids::AttributeId;

pub const SELLER_ENTITY_TYPE: &str = "seller";

#[derive(Debug, Clone)]
pub struct AttributeRegistry {
    entity_type: String,
    attributes: Vec<AttributeDefinition>,
    by_code: HashMap<String, usize>,
    by_id: HashMap<AttributeId, usize>,
}

impl AttributeRegistry {
    pub fn builder(entity_type: impl Into<String>) -> RegistryBuilder {
        RegistryBuilder {
            entity_type: entity_type.into(),
            attributes: Vec::new(),
        }
    }

    pub fn entity_type(&self) -> &str {
        &self.entity_type
    }

    pub fn list(&self) -> &[AttributeDefinition] {
        &self.attributes
    }

    pub fn get(&self, code: &str) -> Result<&AttributeDefinition, CoreError> {
        self.by_code
            .get(code)
            .map(|&idx| &self.attributes[idx])
            .ok_or_else(|| {
                CoreError::NotFound(format!(
                    "attribute {code} for entity type {}",
                    self.entity_type
                ))
            })
    }

    pub fn by_id(&self, attribute_id: AttributeId) -> Option<&AttributeDefinition> {
        self.by_id.get(&attribute_id).map(|&idx| &self.attributes[idx])
    }

    /// Non-static attributes that may carry per-store values.
    pub fn scoped(&self) -> impl Iterator<Item = &AttributeDefinition> {
        self.attributes
            .iter()
            .filter(|a| !a.is_static() && a.scope.allows_store_values())
    }

    /// Partition the requested codes by backend type. Static attributes are
    /// left out; an empty `codes` slice selects every attribute.
    pub fn group_by_backend(
        &self,
        codes: &[&str],
    ) -> Result<BTreeMap<BackendType, Vec<&AttributeDefinition>>, CoreError> {
        let selected: Vec<&AttributeDefinition> = if codes.is_empty() {
            self.attributes.iter().collect()
        } else {
            codes
                .iter()
                .map(|code| self.get(code))
                .collect::<Result<_, _>>()?
        };

        let mut groups: BTreeMap<BackendType, Vec<&AttributeDefinition>> = BTreeMap::new();
        for attr in selected {
            if attr.is_static() {
                continue;
            }
            groups.entry(attr.backend_type).or_default().push(attr);
        }
        Ok(groups)
    }
}

pub struct RegistryBuilder {
    entity_type: String,
    attributes: Vec<AttributeDefinition>,
}

impl RegistryBuilder {
    pub fn attribute(
        mut self,
        attribute_id: i64,
        code: &str,
        backend_type: BackendType,
        scope: Scope,
    ) -> Self {
        self.attributes.push(AttributeDefinition::new(
            AttributeId::new(attribute_id),
            code,
            backend_type,
            scope,
        ));
        self
    }

    pub fn definition(mut self, definition: AttributeDefinition) -> Self {
        self.attributes.push(definition);
        self
    }

    pub fn build(self) -> Result<AttributeRegistry, CoreError> {
        let mut by_code = HashMap::new();
        let mut by_id = HashMap::new();
        let mut attributes = Vec::with_capacity(self.attributes.len());

        for mut attr in self.attributes {
            if attr.code.is_empty() {
                return Err(CoreError::InvalidData("attribute code is empty".into()));
            }
            // Static columns live once per entity.
            if attr.is_static() {
                attr.scope = Scope::Global;
            }
            let idx = attributes.len();
            if by_code.insert(attr.code.clone(), idx).is_some() {
                return Err(CoreError::InvalidData(format!(
                    "duplicate attribute code: {}",
                    attr.code
                )));
            }
            if by_id.insert(attr.attribute_id, idx).is_some() {
                return Err(CoreError::InvalidData(format!(
                    "duplicate attribute id: {}",
                    attr.attribute_id
                )));
            }
            attributes.push(attr);
        }

        Ok(AttributeRegistry {
            entity_type: self.entity_type,
            attributes,
            by_code,
            by_id,
        })
    }
}

/// The attribute set installed for sellers.
pub fn seller_attributes() -> Vec<AttributeDefinition> {
    use BackendType::*;

    [
        (1, STATIC_CODE, Static, Scope::Global),
        (2, STATIC_CREATED_AT, Static, Scope::Global),
        (3, STATIC_UPDATED_AT, Static, Scope::Global),
        (4, "name", Varchar, Scope::Store),
        (5, "is_active", Int, Scope::Store),
        (6, "description", Text, Scope::Store),
        (7, "image", Varchar, Scope::Store),
        (8, "meta_title", Varchar, Scope::Store),
        (9, "meta_keywords", Text, Scope::Store),
        (10, "meta_description", Text, Scope::Store),
        (11, "contact_email", Varchar, Scope::Global),
    ]
    .into_iter()
    .map(|(id, code, ty, scope)| AttributeDefinition::new(AttributeId::new(id), code, ty, scope))
    .collect()
}

pub fn seller_registry() -> Result<AttributeRegistry, CoreError> {
    seller_attributes()
        .into_iter()
        .fold(AttributeRegistry::builder(SELLER_ENTITY_TYPE), |b, a| {
            b.definition(a)
        })
        .build()
}
