use serde_json::Value;
use sqlx::Connection;
use sqlx::postgres::PgConnection;
use tracing::{debug, info};

use crate::db::models::{ApplicationRow, ConfigRow};
use crate::db::schema::{postgres_schema, validate_table_name};
use crate::error::ConfigError;
use crate::loader::{ConfigMap, value_to_text};

/// Relational loader backed by a PostgreSQL database.
///
/// Same contract as [`crate::db::SqliteLoader`]: connection per call, lazy
/// register-or-join of the application identity, per-key upserts.
#[derive(Debug, Clone)]
pub struct PostgresLoader {
    uri: String,
    app_name: String,
    app_id: String,
    config_table: String,
    applications_table: String,
}

impl PostgresLoader {
    pub fn new(
        uri: impl Into<String>,
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
            uri: uri.into(),
            app_name: app_name.to_string(),
            app_id: app_id.to_string(),
            config_table,
            applications_table,
        })
    }

    pub fn app_id(&self) -> &str {
        &self.app_id
    }

    pub fn app_name(&self) -> &str {
        &self.app_name
    }

    async fn connect(&self) -> Result<PgConnection, ConfigError> {
        PgConnection::connect(&self.uri)
            .await
            .map_err(|e| ConfigError::SourceUnavailable(format!("postgres: {e}")))
    }

    /// Idempotently create both tables; also runs at the top of every
    /// operation.
    pub async fn ensure_schema(&self) -> Result<(), ConfigError> {
        let mut conn = self.connect().await?;
        self.ensure_schema_on(&mut conn).await?;
        conn.close().await?;
        Ok(())
    }

    async fn ensure_schema_on(&self, conn: &mut PgConnection) -> Result<(), ConfigError> {
        let ddl = postgres_schema(&self.applications_table, &self.config_table);
        for stmt in ddl.split(';') {
            let s = stmt.trim();
            if s.is_empty() {
                continue;
            }
            sqlx::query(s).execute(&mut *conn).await?;
        }
        Ok(())
    }

    /// Register-or-join this loader's application name, serialized by the
    /// UNIQUE constraint on `app_name`.
    pub async fn ensure_application(&mut self) -> Result<(), ConfigError> {
        let mut conn = self.connect().await?;
        self.ensure_schema_on(&mut conn).await?;
        self.ensure_application_on(&mut conn).await?;
        conn.close().await?;
        Ok(())
    }

    async fn ensure_application_on(&mut self, conn: &mut PgConnection) -> Result<(), ConfigError> {
        if self.app_name.is_empty() {
            // Joining by id only: the id doubles as the registry name.
            let insert = format!(
                "INSERT INTO {} (app_id, app_name) VALUES ($1, $2) ON CONFLICT DO NOTHING",
                self.applications_table
            );
            sqlx::query(&insert)
                .bind(&self.app_id)
                .bind(&self.app_id)
                .execute(&mut *conn)
                .await?;
            return Ok(());
        }
        let insert = format!(
            "INSERT INTO {} (app_id, app_name) VALUES ($1, $2) \
             ON CONFLICT (app_name) DO NOTHING",
            self.applications_table
        );
        sqlx::query(&insert)
            .bind(&self.app_id)
            .bind(&self.app_name)
            .execute(&mut *conn)
            .await?;
        let select = format!(
            "SELECT app_id FROM {} WHERE app_name = $1",
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

    pub async fn load(&mut self) -> Result<ConfigMap, ConfigError> {
        let mut conn = self.connect().await?;
        self.ensure_schema_on(&mut conn).await?;
        let select = format!(
            "SELECT key, value FROM {} WHERE app_id = $1",
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

    /// Upsert every entry on one connection, sequentially; a failure
    /// aborts the remainder but keeps earlier upserts.
    pub async fn save(&mut self, config: &ConfigMap) -> Result<(), ConfigError> {
        let mut conn = self.connect().await?;
        self.ensure_schema_on(&mut conn).await?;
        self.ensure_application_on(&mut conn).await?;
        let upsert = format!(
            "INSERT INTO {} (app_id, key, value) VALUES ($1, $2, $3) \
             ON CONFLICT (app_id, key) DO UPDATE SET \
                 value = EXCLUDED.value, \
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

    /// Delete the registry row; config rows follow via the cascade.
    pub async fn delete_application(&mut self) -> Result<(), ConfigError> {
        let mut conn = self.connect().await?;
        self.ensure_schema_on(&mut conn).await?;
        let delete = format!(
            "DELETE FROM {} WHERE app_id = $1",
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

    pub async fn entries(&self) -> Result<Vec<ConfigRow>, ConfigError> {
        let mut conn = self.connect().await?;
        self.ensure_schema_on(&mut conn).await?;
        let select = format!(
            "SELECT id, app_id, key, value, created_at, updated_at \
             FROM {} WHERE app_id = $1 ORDER BY key",
            self.config_table
        );
        let rows = sqlx::query_as::<_, ConfigRow>(&select)
            .bind(&self.app_id)
            .fetch_all(&mut conn)
            .await?;
        conn.close().await?;
        Ok(rows)
    }

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
