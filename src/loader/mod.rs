//! Backend capability trait and dispatch.
//!
//! Layout:
//! - `env.rs` / `json.rs` / `yaml.rs`: the trivial adapters
//! - the relational loaders live in [`crate::db`]

pub mod env;
pub mod json;
pub mod yaml;

use std::collections::BTreeMap;
use std::str::FromStr;

use serde_json::Value;

use crate::db::{PostgresLoader, SqliteLoader};
use crate::error::ConfigError;
pub use env::EnvLoader;
pub use json::JsonLoader;
pub use yaml::YamlLoader;

/// The facade's working set: a string-keyed mapping of JSON values.
pub type ConfigMap = BTreeMap<String, Value>;

/// The minimal load/save contract every backend adapter implements.
///
/// `load` fetches the full mapping for the bound source; `save` persists
/// the full mapping (file/env backends overwrite, relational backends
/// upsert per key). Both take `&mut self` because relational backends may
/// adopt a different application id while registering (see
/// [`ConfigLoader::app_id`]).
#[allow(async_fn_in_trait)]
pub trait ConfigLoader {
    async fn load(&mut self) -> Result<ConfigMap, ConfigError>;

    async fn save(&mut self, config: &ConfigMap) -> Result<(), ConfigError>;

    /// The application identity the backend actually resolved to, if any.
    ///
    /// Relational backends may join an existing registration under the
    /// same name instead of creating their own; callers must treat this,
    /// not their self-generated id, as authoritative after a save.
    fn app_id(&self) -> Option<&str> {
        None
    }
}

/// Backend selection tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    Env,
    Json,
    Yaml,
    Postgres,
    Sqlite,
}

impl BackendKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendKind::Env => "env",
            BackendKind::Json => "json",
            BackendKind::Yaml => "yaml",
            BackendKind::Postgres => "postgres",
            BackendKind::Sqlite => "sqlite",
        }
    }
}

impl FromStr for BackendKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "env" => Ok(BackendKind::Env),
            "json" => Ok(BackendKind::Json),
            "yaml" => Ok(BackendKind::Yaml),
            "postgres" => Ok(BackendKind::Postgres),
            "sqlite" => Ok(BackendKind::Sqlite),
            other => Err(ConfigError::UnknownBackend(other.to_string())),
        }
    }
}

impl std::fmt::Display for BackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Backend-specific construction parameters.
#[derive(Debug, Clone)]
pub enum BackendSpec {
    Env {
        dotenv_path: Option<String>,
    },
    Json {
        file_path: Option<String>,
        inline: Option<String>,
    },
    Yaml {
        file_path: Option<String>,
        inline: Option<String>,
    },
    Sqlite {
        location: String,
        config_table: String,
        applications_table: String,
    },
    Postgres {
        uri: String,
        config_table: String,
        applications_table: String,
    },
}

impl BackendSpec {
    pub fn env() -> Self {
        BackendSpec::Env { dotenv_path: None }
    }

    pub fn env_file(path: impl Into<String>) -> Self {
        BackendSpec::Env {
            dotenv_path: Some(path.into()),
        }
    }

    pub fn json_file(path: impl Into<String>) -> Self {
        BackendSpec::Json {
            file_path: Some(path.into()),
            inline: None,
        }
    }

    pub fn json_inline(data: impl Into<String>) -> Self {
        BackendSpec::Json {
            file_path: None,
            inline: Some(data.into()),
        }
    }

    pub fn yaml_file(path: impl Into<String>) -> Self {
        BackendSpec::Yaml {
            file_path: Some(path.into()),
            inline: None,
        }
    }

    pub fn yaml_inline(data: impl Into<String>) -> Self {
        BackendSpec::Yaml {
            file_path: None,
            inline: Some(data.into()),
        }
    }

    /// SQLite backend at `location` (a filesystem path or `":memory:"`).
    pub fn sqlite(location: impl Into<String>) -> Self {
        BackendSpec::Sqlite {
            location: location.into(),
            config_table: "config".to_string(),
            applications_table: "applications".to_string(),
        }
    }

    pub fn postgres(uri: impl Into<String>) -> Self {
        BackendSpec::Postgres {
            uri: uri.into(),
            config_table: "config".to_string(),
            applications_table: "applications".to_string(),
        }
    }

    /// Override the relational table names. No effect on other backends.
    pub fn with_tables(
        mut self,
        config: impl Into<String>,
        applications: impl Into<String>,
    ) -> Self {
        match &mut self {
            BackendSpec::Sqlite {
                config_table,
                applications_table,
                ..
            }
            | BackendSpec::Postgres {
                config_table,
                applications_table,
                ..
            } => {
                *config_table = config.into();
                *applications_table = applications.into();
            }
            _ => {}
        }
        self
    }

    pub fn kind(&self) -> BackendKind {
        match self {
            BackendSpec::Env { .. } => BackendKind::Env,
            BackendSpec::Json { .. } => BackendKind::Json,
            BackendSpec::Yaml { .. } => BackendKind::Yaml,
            BackendSpec::Sqlite { .. } => BackendKind::Sqlite,
            BackendSpec::Postgres { .. } => BackendKind::Postgres,
        }
    }
}

/// One concrete loader per backend, dispatched statically.
#[derive(Debug, Clone)]
pub enum Backend {
    Env(EnvLoader),
    Json(JsonLoader),
    Yaml(YamlLoader),
    Sqlite(SqliteLoader),
    Postgres(PostgresLoader),
}

impl Backend {
    /// Build the loader variant selected by `spec`, bound to the given
    /// application identity. The identity is only meaningful for the
    /// relational variants; file and env loaders ignore it.
    pub fn from_spec(
        spec: BackendSpec,
        app_name: &str,
        app_id: &str,
    ) -> Result<Self, ConfigError> {
        let backend = match spec {
            BackendSpec::Env { dotenv_path } => Backend::Env(EnvLoader::new(dotenv_path)),
            BackendSpec::Json { file_path, inline } => {
                Backend::Json(JsonLoader::new(file_path, inline))
            }
            BackendSpec::Yaml { file_path, inline } => {
                Backend::Yaml(YamlLoader::new(file_path, inline))
            }
            BackendSpec::Sqlite {
                location,
                config_table,
                applications_table,
            } => Backend::Sqlite(SqliteLoader::new(
                location,
                app_name,
                app_id,
                config_table,
                applications_table,
            )?),
            BackendSpec::Postgres {
                uri,
                config_table,
                applications_table,
            } => Backend::Postgres(PostgresLoader::new(
                uri,
                app_name,
                app_id,
                config_table,
                applications_table,
            )?),
        };
        Ok(backend)
    }

    pub fn kind(&self) -> BackendKind {
        match self {
            Backend::Env(_) => BackendKind::Env,
            Backend::Json(_) => BackendKind::Json,
            Backend::Yaml(_) => BackendKind::Yaml,
            Backend::Sqlite(_) => BackendKind::Sqlite,
            Backend::Postgres(_) => BackendKind::Postgres,
        }
    }
}

impl ConfigLoader for Backend {
    async fn load(&mut self) -> Result<ConfigMap, ConfigError> {
        match self {
            Backend::Env(l) => l.load(),
            Backend::Json(l) => l.load(),
            Backend::Yaml(l) => l.load(),
            Backend::Sqlite(l) => l.load().await,
            Backend::Postgres(l) => l.load().await,
        }
    }

    async fn save(&mut self, config: &ConfigMap) -> Result<(), ConfigError> {
        match self {
            Backend::Env(l) => l.save(config),
            Backend::Json(l) => l.save(config),
            Backend::Yaml(l) => l.save(config),
            Backend::Sqlite(l) => l.save(config).await,
            Backend::Postgres(l) => l.save(config).await,
        }
    }

    fn app_id(&self) -> Option<&str> {
        match self {
            Backend::Sqlite(l) => Some(l.app_id()),
            Backend::Postgres(l) => Some(l.app_id()),
            _ => None,
        }
    }
}

/// Render a scalar value to the textual form the env and relational
/// backends store. Arrays and objects are rejected rather than coerced.
pub(crate) fn value_to_text(key: &str, value: &Value) -> Result<String, ConfigError> {
    match value {
        Value::String(s) => Ok(s.clone()),
        Value::Number(n) => Ok(n.to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        Value::Null => Ok(String::new()),
        Value::Array(_) => Err(ConfigError::UnsupportedValueType {
            key: key.to_string(),
            type_name: "array",
        }),
        Value::Object(_) => Err(ConfigError::UnsupportedValueType {
            key: key.to_string(),
            type_name: "object",
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn backend_tags_round_trip() {
        for tag in ["env", "json", "yaml", "postgres", "sqlite"] {
            let kind: BackendKind = tag.parse().unwrap();
            assert_eq!(kind.as_str(), tag);
        }
    }

    #[test]
    fn unknown_tag_is_rejected() {
        let err = "toml".parse::<BackendKind>().unwrap_err();
        assert!(matches!(err, ConfigError::UnknownBackend(t) if t == "toml"));
    }

    #[test]
    fn scalars_render_to_text() {
        assert_eq!(value_to_text("K", &json!("dark")).unwrap(), "dark");
        assert_eq!(value_to_text("K", &json!(8080)).unwrap(), "8080");
        assert_eq!(value_to_text("K", &json!(true)).unwrap(), "true");
        assert_eq!(value_to_text("K", &Value::Null).unwrap(), "");
    }

    #[test]
    fn nested_values_are_rejected() {
        let err = value_to_text("K", &json!({"a": 1})).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::UnsupportedValueType { type_name: "object", .. }
        ));
        let err = value_to_text("K", &json!([1, 2])).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::UnsupportedValueType { type_name: "array", .. }
        ));
    }

    #[test]
    fn spec_with_tables_overrides_relational_names() {
        let spec = BackendSpec::sqlite(":memory:").with_tables("settings", "apps");
        match spec {
            BackendSpec::Sqlite {
                config_table,
                applications_table,
                ..
            } => {
                assert_eq!(config_table, "settings");
                assert_eq!(applications_table, "apps");
            }
            _ => unreachable!(),
        }
    }
}
