use chrono::NaiveDateTime;
use rusqlite::types::Value;

use eavscope_core::{AttributeValue, BackendType, CoreError};

/// One typed value table per non-static backend type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ValueTable {
    Int,
    Decimal,
    Text,
    Varchar,
    Datetime,
}

impl ValueTable {
    pub const ALL: [ValueTable; 5] = [
        Self::Int,
        Self::Decimal,
        Self::Text,
        Self::Varchar,
        Self::Datetime,
    ];

    /// Route a backend type to its table. Static attributes are columns of
    /// the entity table, so asking for their value table is a configuration
    /// error rather than something to skip.
    pub fn for_backend(backend: BackendType) -> Result<Self, CoreError> {
        match backend {
            BackendType::Int => Ok(Self::Int),
            BackendType::Decimal => Ok(Self::Decimal),
            BackendType::Text => Ok(Self::Text),
            BackendType::Varchar => Ok(Self::Varchar),
            BackendType::Datetime => Ok(Self::Datetime),
            BackendType::Static => Err(CoreError::Configuration(
                "static attributes have no value table".into(),
            )),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Int => "seller_entity_int",
            Self::Decimal => "seller_entity_decimal",
            Self::Text => "seller_entity_text",
            Self::Varchar => "seller_entity_varchar",
            Self::Datetime => "seller_entity_datetime",
        }
    }

    /// Read the `value` column at `idx` in this table's native representation.
    pub fn read_value(&self, row: &rusqlite::Row, idx: usize) -> rusqlite::Result<AttributeValue> {
        let value = match self {
            Self::Int => row.get::<_, Option<i64>>(idx)?.map(AttributeValue::Int),
            Self::Decimal => row.get::<_, Option<f64>>(idx)?.map(AttributeValue::Decimal),
            Self::Text | Self::Varchar => row.get::<_, Option<String>>(idx)?.map(AttributeValue::Text),
            Self::Datetime => row
                .get::<_, Option<NaiveDateTime>>(idx)?
                .map(AttributeValue::DateTime),
        };
        Ok(value.unwrap_or(AttributeValue::Null))
    }
}

/// Bind form of a value. Datetimes use the text layout rusqlite's chrono
/// support reads back.
pub(crate) fn to_sql(value: &AttributeValue) -> Value {
    match value {
        AttributeValue::Null => Value::Null,
        AttributeValue::Int(n) => Value::Integer(*n),
        AttributeValue::Decimal(n) => Value::Real(*n),
        AttributeValue::Text(s) => Value::Text(s.clone()),
        AttributeValue::DateTime(dt) => Value::Text(dt.format("%F %T%.f").to_string()),
    }
}

/// `?, ?, ?` for `n` parameters.
pub(crate) fn placeholders(n: usize) -> String {
    vec!["?"; n].join(", ")
}
