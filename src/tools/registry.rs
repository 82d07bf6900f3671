use std::sync::Arc;

use reqwest::Client;

use super::{
    DocumentSearchTool, DuckDuckGoSource, DuckDuckGoTool, JargonTool, LoadWebDocumentTool,
    SerpApiTool, Tool, WikipediaTool,
};
use crate::core::config::settings::ToolSettings;
use crate::ingest::WebDocumentLoader;
use crate::llm::LlmProvider;
use crate::rag::DocumentSearch;

/// Everything the built-in tools need at construction time.
pub struct ToolDeps {
    pub http: Client,
    pub llm: Arc<dyn LlmProvider>,
    pub search: Arc<DocumentSearch>,
    pub web_loader: Arc<WebDocumentLoader>,
}

/// Ordered name -> tool mapping.
#[derive(Default, Clone)]
pub struct ToolRegistry {
    tools: Vec<Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The built-in tool set, in prompt order.
    pub fn with_builtin_tools(settings: &ToolSettings, deps: ToolDeps) -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(SerpApiTool::new(
            deps.http.clone(),
            settings.serpapi_api_key.clone(),
        )));
        for source in [
            DuckDuckGoSource::Text,
            DuckDuckGoSource::News,
            DuckDuckGoSource::Videos,
        ] {
            registry.register(Arc::new(DuckDuckGoTool::new(
                deps.http.clone(),
                source,
                settings.duckduckgo_max_results,
            )));
        }
        registry.register(Arc::new(WikipediaTool::new(deps.http.clone())));
        registry.register(Arc::new(LoadWebDocumentTool::new(
            deps.web_loader,
            settings.web_document_collection.clone(),
        )));
        for collection in &settings.document_collections {
            registry.register(Arc::new(DocumentSearchTool::new(
                collection.name.clone(),
                collection.description.clone(),
                collection.collection.clone(),
                deps.search.clone(),
            )));
        }
        registry.register(Arc::new(JargonTool::new(deps.llm)));
        registry
    }

    /// Adds `tool`, replacing any tool registered under the same name in place.
    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        match self.tools.iter().position(|t| t.name() == tool.name()) {
            Some(idx) => self.tools[idx] = tool,
            None => self.tools.push(tool),
        }
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.iter().find(|t| t.name() == name).cloned()
    }

    pub fn names(&self) -> Vec<String> {
        self.tools.iter().map(|t| t.name().to_string()).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Tools whose names appear in `enabled`, in registry order. Unknown
    /// names are ignored.
    pub fn select(&self, enabled: &[String]) -> Vec<Arc<dyn Tool>> {
        let unknown = enabled
            .iter()
            .filter(|name| self.get(name).is_none())
            .collect::<Vec<_>>();
        if !unknown.is_empty() {
            tracing::warn!("Ignoring unknown tools: {:?}", unknown);
        }
        self.tools
            .iter()
            .filter(|t| enabled.iter().any(|name| name == t.name()))
            .cloned()
            .collect()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::tools::ToolError;
    use async_trait::async_trait;

    /// Echoes its input, or fails when `fail` is set.
    pub(crate) struct EchoTool {
        pub name: &'static str,
        pub fail: bool,
    }

    #[async_trait]
    impl Tool for EchoTool {
        fn name(&self) -> &str {
            self.name
        }

        fn description(&self) -> &str {
            "echoes input"
        }

        async fn invoke(&self, input: &str) -> Result<String, ToolError> {
            if self.fail {
                return Err(ToolError::NotConfigured(self.name.to_string()));
            }
            Ok(format!("{} saw {}", self.name, input))
        }
    }

    fn registry(names: &[&'static str]) -> ToolRegistry {
        let mut registry = ToolRegistry::new();
        for name in names {
            registry.register(Arc::new(EchoTool { name, fail: false }));
        }
        registry
    }

    fn names(tools: &[Arc<dyn Tool>]) -> Vec<&str> {
        tools.iter().map(|t| t.name()).collect()
    }

    #[test]
    fn selection_keeps_registry_order_and_skips_unknown() {
        let registry = registry(&["search_google", "search_techdocs", "translate_to_jargon"]);
        let enabled = vec![
            "translate_to_jargon".to_string(),
            "nope".to_string(),
            "search_google".to_string(),
        ];

        let selected = registry.select(&enabled);

        assert_eq!(names(&selected), vec!["search_google", "translate_to_jargon"]);
        assert!(registry.select(&[]).is_empty());
    }

    #[test]
    fn registering_same_name_replaces_in_place() {
        let mut registry = registry(&["a", "b"]);
        registry.register(Arc::new(EchoTool { name: "a", fail: true }));
        assert_eq!(registry.names(), vec!["a", "b"]);
        assert_eq!(registry.len(), 2);
    }
}
