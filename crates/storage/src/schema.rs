use rusqlite::Connection;
use tracing::info;

use crate::error::StorageError;

pub const SCHEMA_VERSION: i32 = 1;

pub fn init_schema(conn: &Connection) -> Result<(), StorageError> {
    conn.execute_batch(
        "
        PRAGMA journal_mode = WAL;
        PRAGMA synchronous = NORMAL;
        PRAGMA foreign_keys = ON;
        PRAGMA cache_size = -32000;
        PRAGMA busy_timeout = 5000;
    ",
    )?;
    conn.execute_batch(SCHEMA_SQL)?;
    info!(version = SCHEMA_VERSION, "attribute storage schema initialized");
    Ok(())
}

const SCHEMA_SQL: &str = "
CREATE TABLE IF NOT EXISTS schema_version (
    version INTEGER PRIMARY KEY,
    applied_at INTEGER NOT NULL
);
INSERT OR IGNORE INTO schema_version (version, applied_at) VALUES (1, unixepoch());

CREATE TABLE IF NOT EXISTS store (
    store_id INTEGER PRIMARY KEY CHECK (store_id >= 0),
    website_id INTEGER NOT NULL DEFAULT 0,
    code TEXT NOT NULL UNIQUE
);
INSERT OR IGNORE INTO store (store_id, website_id, code) VALUES (0, 0, 'admin');

CREATE TABLE IF NOT EXISTS eav_attribute (
    attribute_id INTEGER PRIMARY KEY,
    entity_type TEXT NOT NULL,
    attribute_code TEXT NOT NULL,
    backend_type TEXT NOT NULL,
    scope TEXT NOT NULL DEFAULT 'store',
    UNIQUE (entity_type, attribute_code)
);

CREATE TABLE IF NOT EXISTS attribute_set (
    attribute_set_id INTEGER PRIMARY KEY AUTOINCREMENT,
    entity_type TEXT NOT NULL,
    attribute_set_name TEXT NOT NULL,
    UNIQUE (entity_type, attribute_set_name)
);

CREATE TABLE IF NOT EXISTS seller_entity (
    entity_id INTEGER PRIMARY KEY AUTOINCREMENT,
    attribute_set_id INTEGER NOT NULL DEFAULT 0,
    code TEXT NOT NULL UNIQUE CHECK (length(code) BETWEEN 1 AND 64),
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS seller_entity_int (
    value_id INTEGER PRIMARY KEY AUTOINCREMENT,
    attribute_id INTEGER NOT NULL REFERENCES eav_attribute (attribute_id) ON DELETE CASCADE,
    store_id INTEGER NOT NULL REFERENCES store (store_id) ON DELETE CASCADE,
    entity_id INTEGER NOT NULL REFERENCES seller_entity (entity_id) ON DELETE CASCADE,
    value INTEGER,
    UNIQUE (entity_id, attribute_id, store_id)
);
CREATE INDEX IF NOT EXISTS idx_seller_entity_int_attribute ON seller_entity_int (attribute_id);
CREATE INDEX IF NOT EXISTS idx_seller_entity_int_store ON seller_entity_int (store_id);

CREATE TABLE IF NOT EXISTS seller_entity_decimal (
    value_id INTEGER PRIMARY KEY AUTOINCREMENT,
    attribute_id INTEGER NOT NULL REFERENCES eav_attribute (attribute_id) ON DELETE CASCADE,
    store_id INTEGER NOT NULL REFERENCES store (store_id) ON DELETE CASCADE,
    entity_id INTEGER NOT NULL REFERENCES seller_entity (entity_id) ON DELETE CASCADE,
    value REAL,
    UNIQUE (entity_id, attribute_id, store_id)
);
CREATE INDEX IF NOT EXISTS idx_seller_entity_decimal_attribute ON seller_entity_decimal (attribute_id);
CREATE INDEX IF NOT EXISTS idx_seller_entity_decimal_store ON seller_entity_decimal (store_id);

CREATE TABLE IF NOT EXISTS seller_entity_text (
    value_id INTEGER PRIMARY KEY AUTOINCREMENT,
    attribute_id INTEGER NOT NULL REFERENCES eav_attribute (attribute_id) ON DELETE CASCADE,
    store_id INTEGER NOT NULL REFERENCES store (store_id) ON DELETE CASCADE,
    entity_id INTEGER NOT NULL REFERENCES seller_entity (entity_id) ON DELETE CASCADE,
    value TEXT,
    UNIQUE (entity_id, attribute_id, store_id)
);
CREATE INDEX IF NOT EXISTS idx_seller_entity_text_attribute ON seller_entity_text (attribute_id);
CREATE INDEX IF NOT EXISTS idx_seller_entity_text_store ON seller_entity_text (store_id);

CREATE TABLE IF NOT EXISTS seller_entity_varchar (
    value_id INTEGER PRIMARY KEY AUTOINCREMENT,
    attribute_id INTEGER NOT NULL REFERENCES eav_attribute (attribute_id) ON DELETE CASCADE,
    store_id INTEGER NOT NULL REFERENCES store (store_id) ON DELETE CASCADE,
    entity_id INTEGER NOT NULL REFERENCES seller_entity (entity_id) ON DELETE CASCADE,
    value TEXT CHECK (value IS NULL OR length(value) <= 255),
    UNIQUE (entity_id, attribute_id, store_id)
);
CREATE INDEX IF NOT EXISTS idx_seller_entity_varchar_attribute ON seller_entity_varchar (attribute_id);
CREATE INDEX IF NOT EXISTS idx_seller_entity_varchar_store ON seller_entity_varchar (store_id);

CREATE TABLE IF NOT EXISTS seller_entity_datetime (
    value_id INTEGER PRIMARY KEY AUTOINCREMENT,
    attribute_id INTEGER NOT NULL REFERENCES eav_attribute (attribute_id) ON DELETE CASCADE,
    store_id INTEGER NOT NULL REFERENCES store (store_id) ON DELETE CASCADE,
    entity_id INTEGER NOT NULL REFERENCES seller_entity (entity_id) ON DELETE CASCADE,
    value TEXT,
    UNIQUE (entity_id, attribute_id, store_id)
);
CREATE INDEX IF NOT EXISTS idx_seller_entity_datetime_attribute ON seller_entity_datetime (attribute_id);
CREATE INDEX IF NOT EXISTS idx_seller_entity_datetime_store ON seller_entity_datetime (store_id);
";
