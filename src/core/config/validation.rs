use serde_json::{Map, Value};

use super::ConfigError;

pub fn validate_config(config: &Value) -> Result<(), ConfigError> {
    let root = config
        .as_object()
        .ok_or_else(|| config_type_error("root", "object"))?;

    if let Some(logging) = expect_optional_object(root, "logging")? {
        validate_optional_string_field(logging, "logging.level", "level")?;
    }

    if let Some(server) = expect_optional_object(root, "server")? {
        validate_optional_string_field(server, "server.host", "host")?;
        validate_u64_field(server, "server.port", "port", 0, 65535)?;
        validate_string_array_field(
            server,
            "server.cors_allowed_origins",
            "cors_allowed_origins",
        )?;
    }

    if let Some(openai) = expect_optional_object(root, "openai")? {
        for key in [
            "openai_api_base",
            "openai_api_version",
            "deployment_name",
            "deployment_name_32k",
            "text_summary_deployment_name",
            "embedding_model_deployment_name",
        ] {
            validate_optional_string_field(openai, &format!("openai.{}", key), key)?;
        }
        validate_u64_field(
            openai,
            "openai.embedding_dimension",
            "embedding_dimension",
            1,
            65_536,
        )?;
        validate_u64_field(openai, "openai.max_tokens", "max_tokens", 1, 1_000_000)?;
        validate_u64_field(
            openai,
            "openai.request_timeout_secs",
            "request_timeout_secs",
            1,
            3_600,
        )?;
    }

    if let Some(store) = expect_optional_object(root, "vector_store")? {
        validate_enum_field(store, "vector_store.backend", "backend", &["qdrant", "sqlite"])?;
        validate_optional_string_field(store, "vector_store.url", "url")?;
        validate_u64_field(
            store,
            "vector_store.startup_retries",
            "startup_retries",
            1,
            50,
        )?;
    }

    if let Some(ingest) = expect_optional_object(root, "ingest")? {
        validate_optional_string_field(ingest, "ingest.source_dir", "source_dir")?;
        validate_optional_string_field(ingest, "ingest.collection_name", "collection_name")?;
        validate_bool_field(
            ingest,
            "ingest.move_after_processing",
            "move_after_processing",
        )?;
        validate_bool_field(ingest, "ingest.re_process_files", "re_process_files")?;
        validate_string_array_field(
            ingest,
            "ingest.extensions_to_process",
            "extensions_to_process",
        )?;
        validate_enum_field(
            ingest,
            "ingest.hash_check_scope",
            "hash_check_scope",
            &["all_files", "presentations_only"],
        )?;
        validate_u64_field(
            ingest,
            "ingest.max_conversion_retries",
            "max_conversion_retries",
            1,
            100,
        )?;
        validate_u64_field(ingest, "ingest.chunk_size", "chunk_size", 16, 100_000)?;
        validate_u64_field(ingest, "ingest.chunk_overlap", "chunk_overlap", 0, 50_000)?;
        validate_u64_field(
            ingest,
            "ingest.embed_batch_size",
            "embed_batch_size",
            1,
            2_048,
        )?;
    }

    if let Some(agent) = expect_optional_object(root, "agent")? {
        validate_optional_string_field(agent, "agent.default_agent", "default_agent")?;
        validate_u64_field(agent, "agent.max_iterations", "max_iterations", 1, 100)?;
    }

    if let Some(tools) = expect_optional_object(root, "tools")? {
        validate_u64_field(tools, "tools.search_top_k", "search_top_k", 1, 100)?;
        validate_u64_field(tools, "tools.rerank_top_n", "rerank_top_n", 1, 100)?;
        if let Some(collections) = tools.get("document_collections") {
            let items = collections
                .as_array()
                .ok_or_else(|| config_type_error("tools.document_collections", "array"))?;
            for (index, item) in items.iter().enumerate() {
                let path = format!("tools.document_collections[{}]", index);
                let entry = item
                    .as_object()
                    .ok_or_else(|| config_type_error(&path, "object"))?;
                for key in ["name", "collection", "description"] {
                    validate_required_string_field(entry, &format!("{}.{}", path, key), key)?;
                }
            }
        }
    }

    if let Some(web) = expect_optional_object(root, "web")? {
        validate_u64_field(
            web,
            "web.fetch_timeout_secs",
            "fetch_timeout_secs",
            1,
            600,
        )?;
        validate_u64_field(web, "web.max_bytes", "max_bytes", 1_024, 100_000_000)?;
        validate_u64_field(web, "web.max_depth", "max_depth", 0, 5)?;
        validate_u64_field(web, "web.max_documents", "max_documents", 1, 500)?;
        validate_string_array_field(web, "web.url_denylist", "url_denylist")?;
    }

    Ok(())
}

fn expect_optional_object<'a>(
    root: &'a Map<String, Value>,
    key: &str,
) -> Result<Option<&'a Map<String, Value>>, ConfigError> {
    match root.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Object(map)) => Ok(Some(map)),
        Some(_) => Err(config_type_error(key, "object")),
    }
}

fn validate_bool_field(
    section: &Map<String, Value>,
    path: &str,
    key: &str,
) -> Result<(), ConfigError> {
    let Some(value) = section.get(key) else {
        return Ok(());
    };
    if !value.is_boolean() {
        return Err(config_type_error(path, "boolean"));
    }
    Ok(())
}

fn validate_u64_field(
    section: &Map<String, Value>,
    path: &str,
    key: &str,
    min: u64,
    max: u64,
) -> Result<(), ConfigError> {
    let Some(value) = section.get(key) else {
        return Ok(());
    };
    let Some(number) = value.as_u64() else {
        return Err(config_type_error(path, "integer"));
    };
    if number < min || number > max {
        return Err(ConfigError::Invalid(format!(
            "Invalid config at '{}': must be between {} and {}",
            path, min, max
        )));
    }
    Ok(())
}

fn validate_enum_field(
    section: &Map<String, Value>,
    path: &str,
    key: &str,
    allowed: &[&str],
) -> Result<(), ConfigError> {
    let Some(value) = section.get(key) else {
        return Ok(());
    };
    let Some(text) = value.as_str() else {
        return Err(config_type_error(path, "string"));
    };
    if !allowed.contains(&text) {
        return Err(ConfigError::Invalid(format!(
            "Invalid config at '{}': expected one of {}",
            path,
            allowed.join(", ")
        )));
    }
    Ok(())
}

fn validate_required_string_field(
    section: &Map<String, Value>,
    path: &str,
    key: &str,
) -> Result<(), ConfigError> {
    let value = section.get(key).ok_or_else(|| {
        ConfigError::Invalid(format!("Invalid config at '{}': value is required", path))
    })?;
    let Some(text) = value.as_str() else {
        return Err(config_type_error(path, "string"));
    };
    if text.trim().is_empty() {
        return Err(ConfigError::Invalid(format!(
            "Invalid config at '{}': value cannot be empty",
            path
        )));
    }
    Ok(())
}

fn validate_optional_string_field(
    section: &Map<String, Value>,
    path: &str,
    key: &str,
) -> Result<(), ConfigError> {
    let Some(value) = section.get(key) else {
        return Ok(());
    };
    if !value.is_null() && value.as_str().is_none() {
        return Err(config_type_error(path, "string"));
    }
    Ok(())
}

fn validate_string_array_field(
    section: &Map<String, Value>,
    path: &str,
    key: &str,
) -> Result<(), ConfigError> {
    let Some(value) = section.get(key) else {
        return Ok(());
    };
    let Some(items) = value.as_array() else {
        return Err(config_type_error(path, "array of strings"));
    };
    for (index, item) in items.iter().enumerate() {
        let Some(text) = item.as_str() else {
            return Err(config_type_error(&format!("{}[{}]", path, index), "string"));
        };
        if text.trim().is_empty() {
            return Err(ConfigError::Invalid(format!(
                "Invalid config at '{}[{}]': value cannot be empty",
                path, index
            )));
        }
    }
    Ok(())
}

fn config_type_error(path: &str, expected: &str) -> ConfigError {
    ConfigError::Invalid(format!(
        "Invalid config at '{}': expected {}",
        path, expected
    ))
}
