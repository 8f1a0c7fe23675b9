//! The mapping-like facade that owns exactly one backend loader.

use serde_json::Value;
use tracing::debug;
use uuid::Uuid;

use crate::db::{PostgresLoader, SqliteLoader};
use crate::error::ConfigError;
use crate::loader::{Backend, BackendSpec, ConfigLoader, ConfigMap, EnvLoader, JsonLoader, YamlLoader};

/// Reserved key holding the application identity.
pub const APP_ID_KEY: &str = "APP_ID";
/// Reserved key holding the human-readable application name.
pub const APP_NAME_KEY: &str = "APP_NAME";

/// A key-value view over one configuration backend.
///
/// The full mapping is loaded once at construction; every mutation writes
/// the whole mapping back through the loader (write-through, no
/// batching). Reads never touch the backend.
#[derive(Debug, Clone)]
pub struct Configuration {
    loader: Backend,
    app_id: String,
    config: ConfigMap,
}

impl Configuration {
    /// Wrap an already-built loader. Performs the single wholesale load
    /// and seeds the reserved `APP_ID` key.
    pub async fn with_loader(
        mut loader: Backend,
        app_id: Option<String>,
    ) -> Result<Self, ConfigError> {
        let app_id = app_id.unwrap_or_else(mint_app_id);
        let mut config = loader.load().await?;
        config.insert(APP_ID_KEY.to_string(), Value::String(app_id.clone()));
        Ok(Self {
            loader,
            app_id,
            config,
        })
    }

    /// Register a new application: mint a fresh identity, bind the
    /// selected backend to it, and persist the application name under
    /// [`APP_NAME_KEY`].
    ///
    /// If the name is already registered on a relational backend, the
    /// facade joins that registration and [`Configuration::app_id`]
    /// reflects the resolved identity, not the minted one.
    pub async fn initialize(spec: BackendSpec, app_name: &str) -> Result<Self, ConfigError> {
        let app_id = mint_app_id();
        debug!(kind = %spec.kind(), app_name, app_id = %app_id, "initializing configuration");
        let loader = Backend::from_spec(spec, app_name, &app_id)?;
        let mut configuration = Self::with_loader(loader, Some(app_id)).await?;
        configuration
            .set(APP_NAME_KEY, Value::String(app_name.to_string()))
            .await?;
        Ok(configuration)
    }

    /// Open the configuration of an already-registered application by its
    /// identity. No new identity is minted and nothing is written.
    pub async fn load_existing(spec: BackendSpec, app_id: &str) -> Result<Self, ConfigError> {
        debug!(kind = %spec.kind(), app_id, "loading existing configuration");
        let loader = Backend::from_spec(spec, "", app_id)?;
        Self::with_loader(loader, Some(app_id.to_string())).await
    }

    pub fn app_id(&self) -> &str {
        &self.app_id
    }

    /// The stored value, or the empty-string sentinel for a missing key.
    /// Never an error.
    pub fn get(&self, key: &str) -> Value {
        self.config
            .get(key)
            .cloned()
            .unwrap_or_else(|| Value::String(String::new()))
    }

    pub fn contains(&self, key: &str) -> bool {
        self.config.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.config.len()
    }

    pub fn is_empty(&self) -> bool {
        self.config.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.config.iter()
    }

    pub fn to_map(&self) -> ConfigMap {
        self.config.clone()
    }

    /// Set one key and write the whole mapping through.
    pub async fn set(
        &mut self,
        key: impl Into<String>,
        value: impl Into<Value>,
    ) -> Result<(), ConfigError> {
        self.config.insert(key.into(), value.into());
        self.persist().await
    }

    /// Remove one key and write through. Removing an absent key is a
    /// silent no-op with no backend write.
    pub async fn delete(&mut self, key: &str) -> Result<(), ConfigError> {
        if self.config.remove(key).is_none() {
            return Ok(());
        }
        self.persist().await
    }

    /// Merge entries into the mapping (later values win) and write
    /// through once.
    pub async fn update(&mut self, entries: ConfigMap) -> Result<(), ConfigError> {
        self.config.extend(entries);
        self.persist().await
    }

    /// Empty the in-memory view and write through. Relational backends
    /// upsert nothing for an empty mapping, so previously persisted rows
    /// survive in storage; a new facade loading the same identity will
    /// still see them.
    pub async fn clear(&mut self) -> Result<(), ConfigError> {
        self.config.clear();
        self.persist().await
    }

    async fn persist(&mut self) -> Result<(), ConfigError> {
        self.loader.save(&self.config).await?;
        // A relational save may have joined an existing registration
        // under our name; adopt the authoritative identity and persist
        // the corrected reserved key once.
        if let Some(resolved) = self.loader.app_id().map(str::to_string)
            && resolved != self.app_id
        {
            self.app_id = resolved.clone();
            self.config
                .insert(APP_ID_KEY.to_string(), Value::String(resolved));
            self.loader.save(&self.config).await?;
        }
        Ok(())
    }

    /// Serialize the mapping as JSON: to the given file, or returned as
    /// text when no path is given.
    pub fn to_json(&self, path: Option<&str>) -> Result<Option<String>, ConfigError> {
        match path {
            Some(path) => {
                JsonLoader::from_file(path).save(&self.config)?;
                Ok(None)
            }
            None => {
                let text = serde_json::to_string_pretty(&self.config)
                    .map_err(|e| ConfigError::MalformedSource(e.to_string()))?;
                Ok(Some(text))
            }
        }
    }

    /// Serialize the mapping as YAML: to the given file, or returned as
    /// text when no path is given.
    pub fn to_yaml(&self, path: Option<&str>) -> Result<Option<String>, ConfigError> {
        match path {
            Some(path) => {
                YamlLoader::from_file(path).save(&self.config)?;
                Ok(None)
            }
            None => {
                let text = serde_yaml::to_string(&self.config)
                    .map_err(|e| ConfigError::MalformedSource(e.to_string()))?;
                Ok(Some(text))
            }
        }
    }

    /// Write the mapping into the process environment (and a dotenv file
    /// when a path is given).
    pub fn to_env(&self, path: Option<&str>) -> Result<(), ConfigError> {
        EnvLoader::new(path.map(str::to_string)).save(&self.config)
    }

    /// Write the mapping into a SQLite store under this facade's
    /// identity, independent of the owning loader.
    pub async fn to_sqlite(&self, location: &str) -> Result<(), ConfigError> {
        let mut loader = SqliteLoader::new(
            location,
            &self.exported_app_name(),
            &self.app_id,
            "config",
            "applications",
        )?;
        loader.save(&self.config).await
    }

    /// Write the mapping into a PostgreSQL store under this facade's
    /// identity.
    pub async fn to_postgres(&self, uri: &str) -> Result<(), ConfigError> {
        let mut loader = PostgresLoader::new(
            uri,
            &self.exported_app_name(),
            &self.app_id,
            "config",
            "applications",
        )?;
        loader.save(&self.config).await
    }

    fn exported_app_name(&self) -> String {
        match self.config.get(APP_NAME_KEY) {
            Some(Value::String(name)) if !name.is_empty() => name.clone(),
            _ => "default".to_string(),
        }
    }
}

impl std::fmt::Display for Configuration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (key, value) in &self.config {
            match value {
                Value::String(s) => writeln!(f, "{key}={s}")?,
                other => writeln!(f, "{key}={other}")?,
            }
        }
        Ok(())
    }
}

fn mint_app_id() -> String {
    Uuid::new_v4().to_string()
}
