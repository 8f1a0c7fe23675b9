use serde_json::Value;
use sqlx::Connection;
use sqlx::sqlite::{SqliteConnectOptions, SqliteConnection};
use tracing::{debug, info};

use crate::db::models::{ApplicationRow, ConfigRow};
use crate::db::schema::{sqlite_schema, validate_table_name};
use crate::error::ConfigError;
use crate::loader::{ConfigMap, value_to_text};

/// Relational loader backed by a SQLite database file (or `:memory:`).
///
/// Owns no connection: every operation opens one, uses it, and closes it
/// before returning. Foreign keys are enabled per connection so that the
/// registry cascade applies.
#[derive(Debug, Clone)]
pub struct SqliteLoader {
    location: String,
    app_name: String,
    app_id: String,
    config_table: String,
    applications_table: String,
}

impl SqliteLoader {
    pub fn new(
        location: impl Into<String>,
        app_name: &str,
        app_id: &str,
        config_table: impl Into<String>,
        applications_table: impl Into<String>,
    ) -> Result<Self, ConfigError> {
        let config_table = config_table.into();
        let applications_table = applications_table.into();
        validate_table_name(&config_table)?;
        validate_table_name(&applications_table)?;
        Ok(Self {
            location: location.into(),
            app_name: app_name.to_string(),
            app_id: app_id.to_string(),
            config_table,
            applications_table,
        })
    }

    /// The identity this loader is bound to. After a save this is the
    /// backend-resolved id, which may differ from the one supplied at
    /// construction if the application name was already registered.
    pub fn app_id(&self) -> &str {
        &self.app_id
    }

    pub fn app_name(&self) -> &str {
        &self.app_name
    }

    async fn connect(&self) -> Result<SqliteConnection, ConfigError> {
        // The location is a literal filesystem path, never a URI; binding
        // it via `filename` keeps `?` and `#` in paths out of option
        // parsing.
        let mut opts = SqliteConnectOptions::new()
            .filename(&self.location)
            .create_if_missing(true)
            .foreign_keys(true);
        if self.location == ":memory:" {
            opts = opts.in_memory(true);
        }
        SqliteConnection::connect_with(&opts)
            .await
            .map_err(|e| ConfigError::SourceUnavailable(format!("{}: {e}", self.location)))
    }

    /// Idempotently create both tables. Also runs implicitly at the top
    /// of every operation, so a brand new database file needs no separate
    /// bootstrap call.
    pub async fn ensure_schema(&self) -> Result<(), ConfigError> {
        let mut conn = self.connect().await?;
        self.ensure_schema_on(&mut conn).await?;
        conn.close().await?;
        Ok(())
    }

    async fn ensure_schema_on(&self, conn: &mut SqliteConnection) -> Result<(), ConfigError> {
        // sqlx::query runs one statement at a time; split the bundled DDL.
        let ddl = sqlite_schema(&self.applications_table, &self.config_table);
        for stmt in ddl.split(';') {
            let s = stmt.trim();
            if s.is_empty() {
                continue;
            }
            sqlx::query(s).execute(&mut *conn).await?;
        }
        Ok(())
    }

    /// Register-or-join this loader's application name. The UNIQUE
    /// constraint on `app_name` decides races; the loser adopts the
    /// winner's id.
    pub async fn ensure_application(&mut self) -> Result<(), ConfigError> {
        let mut conn = self.connect().await?;
        self.ensure_schema_on(&mut conn).await?;
        self.ensure_application_on(&mut conn).await?;
        conn.close().await?;
        Ok(())
    }

    async fn ensure_application_on(
        &mut self,
        conn: &mut SqliteConnection,
    ) -> Result<(), ConfigError> {
        let insert = format!(
            "INSERT OR IGNORE INTO {} (app_id, app_name) VALUES (?, ?)",
            self.applications_table
        );
        if self.app_name.is_empty() {
            // Joining by id only (load_existing): the id doubles as the
            // registry name so a fresh id still satisfies the FK without
            // colliding with real names.
            sqlx::query(&insert)
                .bind(&self.app_id)
                .bind(&self.app_id)
                .execute(&mut *conn)
                .await?;
            return Ok(());
        }
        sqlx::query(&insert)
            .bind(&self.app_id)
            .bind(&self.app_name)
            .execute(&mut *conn)
            .await?;
        // Re-read the row the name actually resolved to; our own id is
        // not authoritative if someone registered the name first.
        let select = format!(
            "SELECT app_id FROM {} WHERE app_name = ?",
            self.applications_table
        );
        let (resolved,): (String,) = sqlx::query_as(&select)
            .bind(&self.app_name)
            .fetch_one(&mut *conn)
            .await?;
        if resolved != self.app_id {
            info!(
                app_name = %self.app_name,
                requested = %self.app_id,
                resolved = %resolved,
                "joined existing application registration"
            );
            self.app_id = resolved;
        }
        Ok(())
    }

    /// Fetch every `(key, value)` pair for the bound application. An
    /// unregistered application yields an empty mapping, not an error.
    pub async fn load(&mut self) -> Result<ConfigMap, ConfigError> {
        let mut conn = self.connect().await?;
        self.ensure_schema_on(&mut conn).await?;
        let select = format!(
            "SELECT key, value FROM {} WHERE app_id = ?",
            self.config_table
        );
        let rows: Vec<(String, Option<String>)> = sqlx::query_as(&select)
            .bind(&self.app_id)
            .fetch_all(&mut conn)
            .await?;
        conn.close().await?;
        debug!(app_id = %self.app_id, rows = rows.len(), "loaded configuration");
        Ok(rows
            .into_iter()
            .map(|(k, v)| (k, Value::String(v.unwrap_or_default())))
            .collect())
    }

    /// Upsert every entry on one connection, sequentially. A failure
    /// aborts the remaining upserts but leaves the earlier ones
    /// committed.
    pub async fn save(&mut self, config: &ConfigMap) -> Result<(), ConfigError> {
        let mut conn = self.connect().await?;
        self.ensure_schema_on(&mut conn).await?;
        self.ensure_application_on(&mut conn).await?;
        let upsert = format!(
            "INSERT INTO {} (app_id, key, value) VALUES (?, ?, ?) \
             ON CONFLICT(app_id, key) DO UPDATE SET \
                 value = excluded.value, \
                 updated_at = CURRENT_TIMESTAMP",
            self.config_table
        );
        for (key, value) in config {
            let text = value_to_text(key, value)?;
            sqlx::query(&upsert)
                .bind(&self.app_id)
                .bind(key)
                .bind(text)
                .execute(&mut conn)
                .await?;
        }
        conn.close().await?;
        debug!(app_id = %self.app_id, entries = config.len(), "saved configuration");
        Ok(())
    }

    /// Delete the registry row; config rows go with it via the cascade.
    pub async fn delete_application(&mut self) -> Result<(), ConfigError> {
        let mut conn = self.connect().await?;
        self.ensure_schema_on(&mut conn).await?;
        let delete = format!(
            "DELETE FROM {} WHERE app_id = ?",
            self.applications_table
        );
        let result = sqlx::query(&delete)
            .bind(&self.app_id)
            .execute(&mut conn)
            .await?;
        conn.close().await?;
        info!(app_id = %self.app_id, removed = result.rows_affected(), "deleted application");
        Ok(())
    }

    /// Full rows for the bound application, timestamps included.
    pub async fn entries(&self) -> Result<Vec<ConfigRow>, ConfigError> {
        let mut conn = self.connect().await?;
        self.ensure_schema_on(&mut conn).await?;
        let select = format!(
            "SELECT id, app_id, key, value, created_at, updated_at \
             FROM {} WHERE app_id = ? ORDER BY key",
            self.config_table
        );
        let rows = sqlx::query_as::<_, ConfigRow>(&select)
            .bind(&self.app_id)
            .fetch_all(&mut conn)
            .await?;
        conn.close().await?;
        Ok(rows)
    }

    /// Every row of the identity registry.
    pub async fn registered_applications(&self) -> Result<Vec<ApplicationRow>, ConfigError> {
        let mut conn = self.connect().await?;
        self.ensure_schema_on(&mut conn).await?;
        let select = format!(
            "SELECT app_id, app_name, created_at FROM {} ORDER BY app_name",
            self.applications_table
        );
        let rows = sqlx::query_as::<_, ApplicationRow>(&select)
            .fetch_all(&mut conn)
            .await?;
        conn.close().await?;
        Ok(rows)
    }
}
