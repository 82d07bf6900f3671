use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde_json::{Map, Value};

use super::paths::AppPaths;
use super::settings::Settings;
use super::validation::validate_config;
use super::ConfigError;

const REDACT_PLACEHOLDER: &str = "****";

const SENSITIVE_PATTERNS: [&str; 8] = [
    "api_key",
    "secret",
    "password",
    "_token",
    "token_",
    "credential",
    "private_key",
    "access_key",
];

const SENSITIVE_WHITELIST: [&str; 3] = ["max_tokens", "total_tokens", "tokens"];

/// Environment variables that override a config entry, as `(variable, section, key)`.
const ENV_OVERRIDES: [(&str, &str, &str); 5] = [
    ("AZURE_OPENAI_API_KEY", "openai", "api_key"),
    ("SERPAPI_API_KEY", "tools", "serpapi_api_key"),
    ("QDRANT_URL", "vector_store", "url"),
    ("QDRANT_API_KEY", "vector_store", "api_key"),
    ("LOG_LEVEL", "logging", "level"),
];

/// Upper-case section names still found in older deployments' `config.yml`.
const LEGACY_SECTIONS: [(&str, &str); 3] = [
    ("OpenAI", "openai"),
    ("Qdrant", "vector_store"),
    ("Logging", "logging"),
];

#[derive(Clone)]
pub struct ConfigService {
    paths: Arc<AppPaths>,
}

impl ConfigService {
    pub fn new(paths: Arc<AppPaths>) -> Self {
        Self { paths }
    }

    pub fn paths(&self) -> &AppPaths {
        &self.paths
    }

    pub fn config_path(&self) -> PathBuf {
        if let Ok(path) = env::var("AGENT_FRAMEWORK_CONFIG_PATH") {
            return PathBuf::from(path);
        }

        let user_config = self.paths.user_data_dir.join("config.yml");
        if user_config.exists() {
            return user_config;
        }

        self.paths.project_root.join("config.yml")
    }

    pub fn secrets_path(&self) -> PathBuf {
        self.paths.secrets_path.clone()
    }

    /// Loads `config.yml`, layers `secrets.yaml` and the environment on top,
    /// and validates the result.
    pub fn load_config(&self) -> Result<Value, ConfigError> {
        let public_config = normalize_legacy_sections(load_yaml_file(&self.config_path())?);
        let secrets_config = normalize_legacy_sections(load_yaml_file(&self.secrets_path())?);
        let mut merged = deep_merge(&public_config, &secrets_config);
        apply_env_overrides(&mut merged, |name| env::var(name).ok());
        validate_config(&merged)?;
        Ok(merged)
    }

    pub fn settings(&self) -> Result<Settings, ConfigError> {
        let value = self.load_config()?;
        settings_from_value(value)
    }

    pub fn redact_sensitive_values(&self, value: &Value) -> Value {
        redact_sensitive_values(value)
    }
}

pub fn settings_from_value(value: Value) -> Result<Settings, ConfigError> {
    serde_json::from_value(value).map_err(ConfigError::Deserialize)
}

fn load_yaml_file(path: &Path) -> Result<Value, ConfigError> {
    if !path.exists() {
        return Ok(Value::Object(Map::new()));
    }

    let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let value = serde_yaml::from_str::<Value>(&contents).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })?;

    match value {
        Value::Object(_) => Ok(value),
        Value::Null => Ok(Value::Object(Map::new())),
        _ => Err(ConfigError::Invalid(format!(
            "{} must contain a mapping at the top level",
            path.display()
        ))),
    }
}

fn normalize_legacy_sections(config: Value) -> Value {
    let Value::Object(mut map) = config else {
        return config;
    };

    for (legacy, current) in LEGACY_SECTIONS {
        if let Some(section) = map.remove(legacy) {
            let merged = match map.get(current) {
                Some(existing) => deep_merge(&section, existing),
                None => section,
            };
            map.insert(current.to_string(), merged);
        }
    }

    Value::Object(map)
}

fn apply_env_overrides<F>(config: &mut Value, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    let Value::Object(root) = config else {
        return;
    };

    for (variable, section, key) in ENV_OVERRIDES {
        let Some(value) = lookup(variable).filter(|v| !v.trim().is_empty()) else {
            continue;
        };
        let entry = root
            .entry(section.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
        if let Value::Object(section_map) = entry {
            section_map.insert(key.to_string(), Value::String(value));
        }
    }
}

fn deep_merge(base: &Value, override_value: &Value) -> Value {
    match (base, override_value) {
        (Value::Object(base_map), Value::Object(override_map)) => {
            let mut merged: Map<String, Value> = base_map.clone();
            for (key, value) in override_map {
                let merged_value = match merged.get(key) {
                    Some(existing) => deep_merge(existing, value),
                    None => value.clone(),
                };
                merged.insert(key.clone(), merged_value);
            }
            Value::Object(merged)
        }
        _ => override_value.clone(),
    }
}

fn redact_sensitive_values(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut redacted = Map::new();
            for (key, val) in map {
                if is_sensitive_key(key) && !val.is_null() {
                    redacted.insert(key.clone(), Value::String(REDACT_PLACEHOLDER.to_string()));
                } else {
                    redacted.insert(key.clone(), redact_sensitive_values(val));
                }
            }
            Value::Object(redacted)
        }
        Value::Array(items) => Value::Array(items.iter().map(redact_sensitive_values).collect()),
        _ => value.clone(),
    }
}

fn is_sensitive_key(key: &str) -> bool {
    let key_lower = key.to_lowercase();
    if SENSITIVE_WHITELIST
        .iter()
        .any(|allowed| *allowed == key_lower)
    {
        return false;
    }
    SENSITIVE_PATTERNS
        .iter()
        .any(|pattern| key_lower.contains(pattern))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn deep_merge_merges_objects_and_overrides_scalars() {
        let base = json!({
            "openai": { "model": "gpt-4", "deployment_name": "gpt-4" },
            "ingest": { "extensions_to_process": [".md", ".pdf"] }
        });
        let override_value = json!({
            "openai": { "api_key": "secret" },
            "ingest": { "extensions_to_process": [".txt"] }
        });

        let merged = deep_merge(&base, &override_value);

        assert_eq!(
            merged,
            json!({
                "openai": { "model": "gpt-4", "deployment_name": "gpt-4", "api_key": "secret" },
                "ingest": { "extensions_to_process": [".txt"] }
            })
        );
    }

    #[test]
    fn legacy_sections_are_renamed() {
        let config = json!({
            "OpenAI": { "deployment_name": "gpt-4-prod" },
            "Qdrant": { "url": "http://qdrant:6333" },
            "Logging": { "level": "DEBUG" }
        });

        let normalized = normalize_legacy_sections(config);

        assert_eq!(normalized["openai"]["deployment_name"], "gpt-4-prod");
        assert_eq!(normalized["vector_store"]["url"], "http://qdrant:6333");
        assert_eq!(normalized["logging"]["level"], "DEBUG");
        assert!(normalized.get("OpenAI").is_none());
    }

    #[test]
    fn env_overrides_fill_missing_sections() {
        let mut config = json!({ "openai": { "model": "gpt-4" } });

        apply_env_overrides(&mut config, |name| match name {
            "AZURE_OPENAI_API_KEY" => Some("key-123".to_string()),
            "SERPAPI_API_KEY" => Some("   ".to_string()),
            _ => None,
        });

        assert_eq!(config["openai"]["api_key"], "key-123");
        assert_eq!(config["openai"]["model"], "gpt-4");
        assert!(config.get("tools").is_none());
    }

    #[test]
    fn redact_sensitive_values_replaces_secrets_only() {
        let input = json!({
            "openai": { "api_key": "secret", "max_tokens": 512 },
            "tools": { "serpapi_api_key": "serp" }
        });

        let redacted = redact_sensitive_values(&input);

        assert_eq!(
            redacted,
            json!({
                "openai": { "api_key": "****", "max_tokens": 512 },
                "tools": { "serpapi_api_key": "****" }
            })
        );
    }

    #[test]
    fn load_config_reads_yaml_and_secrets() {
        let dir = tempfile::tempdir().unwrap();
        let paths = AppPaths::from_dirs(dir.path().to_path_buf(), dir.path().to_path_buf());
        fs::write(
            dir.path().join("config.yml"),
            "ingest:\n  collection_name: manuals\nOpenAI:\n  deployment_name: gpt-4-prod\n",
        )
        .unwrap();
        fs::write(&paths.secrets_path, "openai:\n  api_key: from-secrets\n").unwrap();

        let service = ConfigService::new(Arc::new(paths));
        let value = service.load_config().unwrap();
        let settings = settings_from_value(value).unwrap();

        assert_eq!(settings.ingest.collection_name, "manuals");
        assert_eq!(settings.openai.deployment_name, "gpt-4-prod");
        assert!(settings.openai.api_key.is_some());
    }
}
