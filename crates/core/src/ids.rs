use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::CoreError;

macro_rules! numeric_id {
    ($name:ident) => {
        #[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(i64);

        impl $name {
            pub const fn new(raw: i64) -> Self {
                Self(raw)
            }

            pub const fn get(&self) -> i64 {
                self.0
            }
        }

        impl From<i64> for $name {
            fn from(raw: i64) -> Self {
                Self(raw)
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self.0)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

numeric_id!(EntityId);
numeric_id!(AttributeId);
numeric_id!(AttributeSetId);
numeric_id!(StoreId);
numeric_id!(WebsiteId);

impl EntityId {
    /// Validate an identifier supplied by a caller. Storage only hands out
    /// positive ids.
    pub fn parse(raw: i64) -> Result<Self, CoreError> {
        if raw <= 0 {
            return Err(CoreError::InvalidInput(format!("invalid entity id: {raw}")));
        }
        Ok(Self(raw))
    }
}

impl StoreId {
    /// The admin store holding the fallback value of every attribute.
    pub const DEFAULT: StoreId = StoreId(0);

    pub fn is_default(&self) -> bool {
        *self == Self::DEFAULT
    }
}

impl WebsiteId {
    pub const ADMIN: WebsiteId = WebsiteId(0);
}

impl AttributeSetId {
    pub const NONE: AttributeSetId = AttributeSetId(0);
}
