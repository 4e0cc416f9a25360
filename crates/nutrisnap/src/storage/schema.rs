//! `SQLite` schema definitions for nutrisnap's local store.
//!
//! This module contains the SQL statements for creating and managing
//! the database schema.

/// SQL statement to create the key-value table.
///
/// Values are JSON documents or plain strings, exactly as the app wrote them.
pub const CREATE_KV_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS kv (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL,
    updated_at TEXT NOT NULL
)
";

/// SQL statement to create an index on `updated_at` for stats queries.
pub const CREATE_UPDATED_INDEX: &str = r"
CREATE INDEX IF NOT EXISTS idx_kv_updated ON kv(updated_at DESC)
";

/// SQL statement to create the metadata table for storing key-value pairs.
pub const CREATE_METADATA_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS metadata (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
)
";

/// Table creation statements, run before migrations.
pub const TABLE_STATEMENTS: &[&str] = &[CREATE_KV_TABLE, CREATE_METADATA_TABLE];

/// Index creation statements, run after migrations so every indexed
/// column exists.
pub const INDEX_STATEMENTS: &[&str] = &[CREATE_UPDATED_INDEX];
