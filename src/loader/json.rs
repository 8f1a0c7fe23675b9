use std::fs;

use serde_json::Value;
use tracing::debug;

use crate::error::ConfigError;
use crate::loader::ConfigMap;

/// Configuration adapter for JSON documents, file-backed or inline.
#[derive(Debug, Clone)]
pub struct JsonLoader {
    file_path: Option<String>,
    inline: Option<String>,
}

impl JsonLoader {
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
            (None, None) => return Err(ConfigError::MissingTarget("json file path")),
        };
        parse_document(&text)
    }

    pub fn save(&self, config: &ConfigMap) -> Result<(), ConfigError> {
        let Some(path) = &self.file_path else {
            return Err(ConfigError::MissingTarget("json file path"));
        };
        let text = serde_json::to_string_pretty(config)
            .map_err(|e| ConfigError::MalformedSource(e.to_string()))?;
        fs::write(path, text)
            .map_err(|e| ConfigError::SourceUnavailable(format!("{path}: {e}")))?;
        debug!(path = %path, entries = config.len(), "wrote json configuration");
        Ok(())
    }
}

fn parse_document(text: &str) -> Result<ConfigMap, ConfigError> {
    let value: Value = serde_json::from_str(text)
        .map_err(|e| ConfigError::MalformedSource(format!("invalid json: {e}")))?;
    match value {
        Value::Object(map) => Ok(map.into_iter().collect()),
        other => Err(ConfigError::MalformedSource(format!(
            "expected a json object at the top level, got {}",
            type_name(&other)
        ))),
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
