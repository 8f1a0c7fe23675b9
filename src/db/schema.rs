//! SQL DDL for the dual-table persistence model.
//!
//! Both engines share the same shape:
//! - `applications`: the identity registry, `app_id` (UUID string) primary
//!   key, `app_name` UNIQUE NOT NULL as the registration serialization point
//! - `config`: `(app_id, key) -> value` with UNIQUE(app_id, key) backing the
//!   upsert, and ON DELETE CASCADE off the registry row
//!
//! Table names are caller-configurable and interpolated into the DDL, so
//! they are restricted to plain identifiers up front.

use crate::error::ConfigError;

/// SQLite DDL. `CREATE TABLE IF NOT EXISTS` keeps this safe to run on
/// every connection.
pub fn sqlite_schema(applications_table: &str, config_table: &str) -> String {
    format!(
        r#"
CREATE TABLE IF NOT EXISTS {applications_table} (
    app_id TEXT PRIMARY KEY,
    app_name TEXT UNIQUE NOT NULL,
    created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
);

CREATE TABLE IF NOT EXISTS {config_table} (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    app_id TEXT NOT NULL,
    key TEXT NOT NULL,
    value TEXT,
    created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP,
    updated_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP,
    UNIQUE (app_id, key),
    FOREIGN KEY (app_id) REFERENCES {applications_table}(app_id) ON DELETE CASCADE
);
"#
    )
}

/// PostgreSQL DDL. The application id is stored as TEXT in both engines so
/// that the same UUID string binds everywhere.
pub fn postgres_schema(applications_table: &str, config_table: &str) -> String {
    format!(
        r#"
CREATE TABLE IF NOT EXISTS {applications_table} (
    app_id TEXT PRIMARY KEY,
    app_name TEXT UNIQUE NOT NULL,
    created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
);

CREATE TABLE IF NOT EXISTS {config_table} (
    id BIGSERIAL PRIMARY KEY,
    app_id TEXT REFERENCES {applications_table}(app_id) ON DELETE CASCADE,
    key TEXT NOT NULL,
    value TEXT,
    created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP,
    updated_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP,
    UNIQUE (app_id, key)
);
"#
    )
}

/// Reject anything that is not a bare SQL identifier before it reaches a
/// `format!`-ed statement.
pub fn validate_table_name(name: &str) -> Result<(), ConfigError> {
    let mut chars = name.chars();
    let head_ok = chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_');
    if head_ok && chars.all(|c| c.is_ascii_alphanumeric() || c == '_') {
        Ok(())
    } else {
        Err(ConfigError::InvalidTableName(name.to_string()))
    }
}
