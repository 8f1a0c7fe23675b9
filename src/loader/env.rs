use std::env;
use std::fs;

use serde_json::Value;
use tracing::{debug, warn};

use crate::error::ConfigError;
use crate::loader::{ConfigMap, value_to_text};

/// Configuration adapter for process environment variables, optionally
/// seeded from / persisted to a dotenv-style file.
#[derive(Debug, Clone)]
pub struct EnvLoader {
    dotenv_path: Option<String>,
}

impl EnvLoader {
    pub fn new(dotenv_path: Option<String>) -> Self {
        Self { dotenv_path }
    }

    /// Load the full process environment. When a dotenv path was given it
    /// is applied first and must exist; without one, a `.env` in the
    /// working directory is applied best-effort.
    pub fn load(&self) -> Result<ConfigMap, ConfigError> {
        match &self.dotenv_path {
            Some(path) => {
                dotenvy::from_path(path).map_err(|e| {
                    ConfigError::SourceUnavailable(format!("{path}: {e}"))
                })?;
            }
            None => {
                if let Err(e) = dotenvy::dotenv() {
                    debug!(error = %e, "no default .env applied");
                }
            }
        }
        Ok(env::vars().map(|(k, v)| (k, Value::String(v))).collect())
    }

    /// Persist to the dotenv file (when configured) and mutate the process
    /// environment. Nested values cannot be represented and abort the save
    /// before any partial file write.
    pub fn save(&self, config: &ConfigMap) -> Result<(), ConfigError> {
        if let Some(path) = &self.dotenv_path {
            let mut out = String::new();
            for (key, value) in config {
                let text = value_to_text(key, value)?;
                out.push_str(&dotenv_key(key));
                out.push('=');
                out.push_str(&text);
                out.push('\n');
            }
            fs::write(path, out)
                .map_err(|e| ConfigError::SourceUnavailable(format!("{path}: {e}")))?;
            debug!(path = %path, entries = config.len(), "wrote dotenv file");
        }
        for (key, value) in config {
            let text = value_to_text(key, value)?;
            // SAFETY: the loader contract is single-threaded and
            // caller-ordered; no other thread reads the environment while
            // a save is in flight.
            unsafe { env::set_var(key, &text) };
        }
        if config.is_empty() {
            warn!("saving an empty mapping to the environment backend is a no-op");
        }
        Ok(())
    }
}

/// Dotenv keys are conventionally upper-case with no spaces.
fn dotenv_key(key: &str) -> String {
    key.trim().to_uppercase().replace(' ', "_")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn dotenv_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("app.env");
        let loader = EnvLoader::new(Some(path.to_str().unwrap().to_string()));

        let mut map = ConfigMap::new();
        map.insert("CONFSTASH_ENV_RT".to_string(), json!("round-trip"));
        loader.save(&map).unwrap();

        let loaded = loader.load().unwrap();
        assert_eq!(loaded["CONFSTASH_ENV_RT"], json!("round-trip"));
    }

    #[test]
    fn save_mutates_the_process_environment() {
        let loader = EnvLoader::new(None);
        let mut map = ConfigMap::new();
        map.insert("CONFSTASH_ENV_SET".to_string(), json!(42));
        loader.save(&map).unwrap();
        assert_eq!(env::var("CONFSTASH_ENV_SET").unwrap(), "42");
    }

    #[test]
    fn nested_values_are_rejected_before_any_write() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("app.env");
        let loader = EnvLoader::new(Some(path.to_str().unwrap().to_string()));

        let mut map = ConfigMap::new();
        map.insert("NESTED".to_string(), json!({"a": 1}));
        let err = loader.save(&map).unwrap_err();
        assert!(matches!(err, ConfigError::UnsupportedValueType { .. }));
        assert!(!path.exists());
    }

    #[test]
    fn explicit_missing_dotenv_is_source_unavailable() {
        let loader = EnvLoader::new(Some("/nonexistent/app.env".to_string()));
        let err = loader.load().unwrap_err();
        assert!(matches!(err, ConfigError::SourceUnavailable(_)));
    }

    #[test]
    fn keys_are_normalized_for_dotenv_files() {
        assert_eq!(dotenv_key(" log level "), "LOG_LEVEL");
    }
}
