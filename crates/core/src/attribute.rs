use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::CoreError;
use crate::ids::AttributeId;

/// Storage representation of an attribute's values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendType {
    Int,
    Decimal,
    Text,
    Varchar,
    Datetime,
    /// A real column on the entity table.
    Static,
}

impl BackendType {
    pub const ALL: [BackendType; 6] = [
        Self::Int,
        Self::Decimal,
        Self::Text,
        Self::Varchar,
        Self::Datetime,
        Self::Static,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Int => "int",
            Self::Decimal => "decimal",
            Self::Text => "text",
            Self::Varchar => "varchar",
            Self::Datetime => "datetime",
            Self::Static => "static",
        }
    }

    pub fn parse(s: &str) -> Result<Self, CoreError> {
        match s {
            "int" => Ok(Self::Int),
            "decimal" => Ok(Self::Decimal),
            "text" => Ok(Self::Text),
            "varchar" => Ok(Self::Varchar),
            "datetime" => Ok(Self::Datetime),
            "static" => Ok(Self::Static),
            _ => Err(CoreError::Configuration(format!("unknown backend type: {s}"))),
        }
    }

    pub fn is_static(&self) -> bool {
        matches!(self, Self::Static)
    }
}

impl fmt::Display for BackendType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Breadth at which an attribute's value may vary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scope {
    Global,
    Website,
    Store,
}

impl Scope {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Global => "global",
            Self::Website => "website",
            Self::Store => "store",
        }
    }

    pub fn parse(s: &str) -> Result<Self, CoreError> {
        match s {
            "global" => Ok(Self::Global),
            "website" => Ok(Self::Website),
            "store" => Ok(Self::Store),
            _ => Err(CoreError::Configuration(format!("unknown attribute scope: {s}"))),
        }
    }

    /// Whether rows other than the default store may exist.
    pub fn allows_store_values(&self) -> bool {
        !matches!(self, Self::Global)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeDefinition {
    pub attribute_id: AttributeId,
    pub code: String,
    pub backend_type: BackendType,
    pub scope: Scope,
}

impl AttributeDefinition {
    pub fn new(
        attribute_id: AttributeId,
        code: impl Into<String>,
        backend_type: BackendType,
        scope: Scope,
    ) -> Self {
        Self {
            attribute_id,
            code: code.into(),
            backend_type,
            scope,
        }
    }

    pub fn is_static(&self) -> bool {
        self.backend_type.is_static()
    }

    pub fn is_scope_global(&self) -> bool {
        matches!(self.scope, Scope::Global)
    }
}
