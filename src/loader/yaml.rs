use std::fs;

use serde_json::Value;
use tracing::debug;

use crate::error::ConfigError;
use crate::loader::ConfigMap;

/// Configuration adapter for YAML documents, file-backed or inline.
#[derive(Debug, Clone)]
pub struct YamlLoader {
    file_path: Option<String>,
    inline: Option<String>,
}

impl YamlLoader {
    pub fn new(file_path: Option<String>, inline: Option<String>) -> Self {
        Self { file_path, inline }
    }

    pub fn from_file(path: impl Into<String>) -> Self {
        Self::new(Some(path.into()), None)
    }

    pub fn load(&self) -> Result<ConfigMap, ConfigError> {
        let text = match (&self.inline, &self.file_path) {
            (Some(inline), _) => inline.clone(),
            (None, Some(path)) => fs::read_to_string(path).map_err(|e| {
                ConfigError::SourceUnavailable(format!("{path}: {e}"))
            })?,
            (None, None) => return Err(ConfigError::MissingTarget("yaml file path")),
        };
        // An empty document is an empty mapping, not an error.
        if text.trim().is_empty() {
            return Ok(ConfigMap::new());
        }
        // Deserializing into serde_json::Value also rejects the YAML-only
        // shapes we cannot represent, e.g. non-string mapping keys.
        let value: Value = serde_yaml::from_str(&text)
            .map_err(|e| ConfigError::MalformedSource(format!("invalid yaml: {e}")))?;
        match value {
            Value::Object(map) => Ok(map.into_iter().collect()),
            Value::Null => Ok(ConfigMap::new()),
            _ => Err(ConfigError::MalformedSource(
                "expected a yaml mapping at the top level".to_string(),
            )),
        }
    }

    pub fn save(&self, config: &ConfigMap) -> Result<(), ConfigError> {
        let Some(path) = &self.file_path else {
            return Err(ConfigError::MissingTarget("yaml file path"));
        };
        let text = serde_yaml::to_string(config)
            .map_err(|e| ConfigError::MalformedSource(e.to_string()))?;
        fs::write(path, text)
            .map_err(|e| ConfigError::SourceUnavailable(format!("{path}: {e}")))?;
        debug!(path = %path, entries = config.len(), "wrote yaml configuration");
        Ok(())
    }
}
