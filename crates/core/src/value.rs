use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::attribute::BackendType;
use crate::error::CoreError;

/// Longest value accepted by a varchar table.
pub const VARCHAR_MAX_LEN: usize = 255;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum AttributeValue {
    Null,
    Int(i64),
    Decimal(f64),
    Text(String),
    DateTime(NaiveDateTime),
}

impl PartialEq for AttributeValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Null, Self::Null) => true,
            (Self::Int(a), Self::Int(b)) => a == b,
            (Self::Decimal(a), Self::Decimal(b)) => a.total_cmp(b).is_eq(),
            (Self::Text(a), Self::Text(b)) => a == b,
            (Self::DateTime(a), Self::DateTime(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for AttributeValue {}

impl AttributeValue {
    pub fn is_null(&self) -> bool {
        matches!(self, AttributeValue::Null)
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            AttributeValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            AttributeValue::Int(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_decimal(&self) -> Option<f64> {
        match self {
            AttributeValue::Decimal(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_datetime(&self) -> Option<NaiveDateTime> {
        match self {
            AttributeValue::DateTime(dt) => Some(*dt),
            _ => None,
        }
    }

    /// Whether this value can be stored in the table of `backend`.
    pub fn matches_backend(&self, backend: BackendType) -> bool {
        match (self, backend) {
            (Self::Null, _) => true,
            (Self::Int(_), BackendType::Int) => true,
            (Self::Decimal(_), BackendType::Decimal) => true,
            (Self::Text(_), BackendType::Text | BackendType::Varchar) => true,
            (Self::DateTime(_), BackendType::Datetime) => true,
            _ => false,
        }
    }

    /// Check a value before it is written for attribute `code`.
    pub fn validate_for(&self, code: &str, backend: BackendType) -> Result<(), CoreError> {
        if !self.matches_backend(backend) {
            return Err(CoreError::InvalidInput(format!(
                "value {self:?} does not fit {backend} attribute {code}"
            )));
        }
        if let (Self::Text(s), BackendType::Varchar) = (self, backend)
            && s.chars().count() > VARCHAR_MAX_LEN
        {
            return Err(CoreError::InvalidInput(format!(
                "value of {code} exceeds {VARCHAR_MAX_LEN} characters"
            )));
        }
        Ok(())
    }
}

impl From<&str> for AttributeValue {
    fn from(s: &str) -> Self {
        AttributeValue::Text(s.to_string())
    }
}

impl From<String> for AttributeValue {
    fn from(s: String) -> Self {
        AttributeValue::Text(s)
    }
}

impl From<i64> for AttributeValue {
    fn from(n: i64) -> Self {
        AttributeValue::Int(n)
    }
}

impl From<bool> for AttributeValue {
    fn from(b: bool) -> Self {
        AttributeValue::Int(i64::from(b))
    }
}

impl From<f64> for AttributeValue {
    fn from(n: f64) -> Self {
        AttributeValue::Decimal(n)
    }
}

impl From<NaiveDateTime> for AttributeValue {
    fn from(dt: NaiveDateTime) -> Self {
        AttributeValue::DateTime(dt)
    }
}
