pub mod collection;
pub mod error;
pub mod overrides;
pub mod persistor;
pub mod schema;
pub mod sqlite;
pub mod traits;
pub mod value_table;
pub mod values;

pub use collection::{AttributeMap, CollectionLoader, IDS_PER_QUERY};
pub use error::StorageError;
pub use overrides::{OverrideDetector, OverrideSet, OverrideSource};
pub use persistor::{ScopedPersistor, ValueWrite, WriteMode};
pub use sqlite::SqliteStorage;
pub use traits::*;
pub use value_table::ValueTable;
pub use values::ValueRow;
