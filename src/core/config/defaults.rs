use super::settings::DocumentCollectionTool;

pub const DEFAULT_COLLECTION: &str = "techdocs";
pub const DEFAULT_SOURCE_DIR: &str = "scraper/scraped_data";
pub const DEFAULT_OUTPUT_DIR: &str = "scraper/out";
pub const DEFAULT_AGENT: &str = "AgentFramework";
pub const DEFAULT_EMBEDDING_DIMENSION: usize = 1536;
pub const DEFAULT_CONVERSION_RETRIES: u32 = 5;

pub fn default_extensions() -> Vec<String> {
    [".md", ".pdf", ".docx", ".txt", ".pptx"]
        .iter()
        .map(|ext| ext.to_string())
        .collect()
}

/// Tools used when neither the request, the agent nor the default agent name any.
pub fn fallback_agent_tools() -> Vec<String> {
    vec![
        "search_techdocs".to_string(),
        "translate_to_jargon".to_string(),
    ]
}

pub fn default_document_collections() -> Vec<DocumentCollectionTool> {
    vec![
        DocumentCollectionTool {
            name: "search_continodocs".to_string(),
            collection: "contino-gdrive".to_string(),
            description: "This tool enables the querying of a specialized vector store named ['contino-gdrive'] a repository where users archive valuable technical documentation they have encountered.".to_string(),
        },
        DocumentCollectionTool {
            name: "search_techdocs".to_string(),
            collection: DEFAULT_COLLECTION.to_string(),
            description: "This tool enables the querying of a specialized vector store named ['techdocs'] a repository with valuable technical documentation. You may have a wide range of topics within this vector store. Try to format queries as fully formed question sentences and include all filters and conditions from original requests and conversation context. It is important to check the 'TechDocs' whenever possible to see if it contains useful information.".to_string(),
        },
        DocumentCollectionTool {
            name: "search_cognizant_gen_ai_sales_materials".to_string(),
            collection: "cog_gen_ai_sales_materials".to_string(),
            description: "This tool enables the querying of a vector store named ['cog_gen_ai_sales_materials'] a repository with Cognizant Gen AI Sales documentation.".to_string(),
        },
        DocumentCollectionTool {
            name: "search_kaiburr_docs".to_string(),
            collection: "Kaiburr".to_string(),
            description: "This tool enables the querying of the Kaiburr vector store. A repository with information about Kaiburr.".to_string(),
        },
    ]
}

pub fn default_url_denylist() -> Vec<String> {
    [
        "localhost",
        "*.localhost",
        "127.0.0.1",
        "0.0.0.0",
        "192.168.*",
        "10.*",
        "169.254.*",
        "::1",
        "fd*",
        "fe80:*",
    ]
    .iter()
    .map(|pattern| pattern.to_string())
    .collect()
}
