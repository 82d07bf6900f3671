//! Typed view over the merged `config.yml` + `secrets.yaml` document.
//!
//! Every section and field has a default so a missing or partial config file
//! still yields a usable [`Settings`].

use serde::{Deserialize, Serialize};

use super::defaults;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub logging: LoggingSettings,
    pub server: ServerSettings,
    pub openai: OpenAiSettings,
    pub vector_store: VectorStoreSettings,
    pub ingest: IngestSettings,
    pub agent: AgentSettings,
    pub tools: ToolSettings,
    pub web: WebSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    pub level: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    pub cors_allowed_origins: Vec<String>,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            cors_allowed_origins: vec!["*".to_string()],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OpenAiSettings {
    pub openai_api_base: String,
    pub openai_api_version: String,
    pub api_key: Option<String>,
    pub model: String,
    pub deployment_name: String,
    pub model_32k: String,
    pub deployment_name_32k: String,
    pub text_summary_model: String,
    pub text_summary_deployment_name: String,
    pub embedding_model_deployment_name: String,
    pub embedding_dimension: usize,
    pub model_version: String,
    pub temperature: f64,
    pub max_tokens: u32,
    pub request_timeout_secs: u64,
}

impl Default for OpenAiSettings {
    fn default() -> Self {
        Self {
            openai_api_base: String::new(),
            openai_api_version: "2023-12-01-preview".to_string(),
            api_key: None,
            model: "gpt-4".to_string(),
            deployment_name: "gpt-4".to_string(),
            model_32k: "gpt-4-32k".to_string(),
            deployment_name_32k: "gpt-4-32k".to_string(),
            text_summary_model: "gpt-35-turbo".to_string(),
            text_summary_deployment_name: "gpt-35-turbo".to_string(),
            embedding_model_deployment_name: "text-embedding-ada-002".to_string(),
            embedding_dimension: defaults::DEFAULT_EMBEDDING_DIMENSION,
            model_version: String::new(),
            temperature: 0.0,
            max_tokens: 512,
            request_timeout_secs: 120,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VectorBackend {
    Qdrant,
    Sqlite,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VectorStoreSettings {
    pub backend: VectorBackend,
    pub url: String,
    pub api_key: Option<String>,
    /// Relative to the data directory unless absolute.
    pub sqlite_path: String,
    pub startup_retries: u32,
}

impl Default for VectorStoreSettings {
    fn default() -> Self {
        Self {
            backend: VectorBackend::Qdrant,
            url: "http://localhost:6333".to_string(),
            api_key: None,
            sqlite_path: "vectors.db".to_string(),
            startup_retries: 5,
        }
    }
}

/// Which candidate files go through the stored-hash comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HashCheckScope {
    #[default]
    AllFiles,
    PresentationsOnly,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestSettings {
    pub source_dir: String,
    pub output_dir: String,
    pub collection_name: String,
    pub move_after_processing: bool,
    pub re_process_files: bool,
    pub extensions_to_process: Vec<String>,
    pub hash_check_scope: HashCheckScope,
    pub converter_program: String,
    pub max_conversion_retries: u32,
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub embed_batch_size: usize,
    pub extract_metadata: bool,
    pub keywords: usize,
    pub questions: usize,
}

impl Default for IngestSettings {
    fn default() -> Self {
        Self {
            source_dir: defaults::DEFAULT_SOURCE_DIR.to_string(),
            output_dir: defaults::DEFAULT_OUTPUT_DIR.to_string(),
            collection_name: defaults::DEFAULT_COLLECTION.to_string(),
            move_after_processing: true,
            re_process_files: false,
            extensions_to_process: defaults::default_extensions(),
            hash_check_scope: HashCheckScope::AllFiles,
            converter_program: "libreoffice".to_string(),
            max_conversion_retries: defaults::DEFAULT_CONVERSION_RETRIES,
            chunk_size: 1024,
            chunk_overlap: 200,
            embed_batch_size: 16,
            extract_metadata: true,
            keywords: 6,
            questions: 3,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentSettings {
    pub default_agent: String,
    pub max_iterations: usize,
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            default_agent: defaults::DEFAULT_AGENT.to_string(),
            max_iterations: 15,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentCollectionTool {
    pub name: String,
    pub collection: String,
    pub description: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolSettings {
    pub serpapi_api_key: Option<String>,
    pub duckduckgo_max_results: usize,
    pub document_collections: Vec<DocumentCollectionTool>,
    pub web_document_collection: String,
    pub search_top_k: usize,
    pub rerank_top_n: usize,
}

impl Default for ToolSettings {
    fn default() -> Self {
        Self {
            serpapi_api_key: None,
            duckduckgo_max_results: 10,
            document_collections: defaults::default_document_collections(),
            web_document_collection: defaults::DEFAULT_COLLECTION.to_string(),
            search_top_k: 8,
            rerank_top_n: 3,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WebSettings {
    pub fetch_timeout_secs: u64,
    pub max_bytes: usize,
    pub max_depth: usize,
    pub max_documents: usize,
    pub url_denylist: Vec<String>,
    pub user_agent: String,
    /// Permits loopback and private-range targets. Off outside local setups.
    pub allow_private_networks: bool,
}

impl Default for WebSettings {
    fn default() -> Self {
        Self {
            fetch_timeout_secs: 30,
            max_bytes: 5_000_000,
            max_depth: 1,
            max_documents: 5,
            url_denylist: defaults::default_url_denylist(),
            user_agent: "agent-framework/0.4".to_string(),
            allow_private_networks: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn partial_sections_fill_in_defaults() {
        let value = json!({
            "ingest": { "collection_name": "manuals", "hash_check_scope": "presentations_only" },
            "vector_store": { "backend": "sqlite" }
        });

        let settings: Settings = serde_json::from_value(value).unwrap();

        assert_eq!(settings.ingest.collection_name, "manuals");
        assert_eq!(settings.ingest.hash_check_scope, HashCheckScope::PresentationsOnly);
        assert_eq!(settings.ingest.max_conversion_retries, 5);
        assert_eq!(settings.vector_store.backend, VectorBackend::Sqlite);
        assert_eq!(settings.tools.document_collections.len(), 4);
        assert_eq!(settings.agent.default_agent, "AgentFramework");
    }
}
