pub mod attribute;
pub mod entity;
pub mod error;
pub mod ids;
pub mod registry;
pub mod scope;
pub mod value;

pub use attribute::{AttributeDefinition, BackendType, Scope};
pub use entity::Entity;
pub use error::CoreError;
pub use ids::*;
pub use registry::AttributeRegistry;
pub use scope::{ScopeResolver, StoreDirectory};
pub use value::AttributeValue;
