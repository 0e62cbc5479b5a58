//! SQLite schema for the key-value backend.

/// One row per key; `updated_at` is a Unix timestamp in milliseconds.
pub const KV_SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS kv_store (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL,
    updated_at INTEGER NOT NULL
);
"#;
