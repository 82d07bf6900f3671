use std::sync::Arc;
use std::time::Duration;

use crate::agent::{AgentService, TemplateRegistry};
use crate::core::config::settings::VectorBackend;
use crate::core::config::{AppPaths, Settings};
use crate::history::ChatHistoryStore;
use crate::ingest::{
    DocumentLoader, FileHashStore, Indexer, MetadataExtractor, PptxConverter, Scraper,
    WebDocumentLoader,
};
use crate::llm::{AzureOpenAiProvider, EmbeddingProvider, LlmProvider};
use crate::rag::{
    wait_until_available, DocumentSearch, QdrantStore, SplitterConfig, SqliteVectorStore,
    TextSplitter, VectorStore,
};
use crate::tools::{ToolDeps, ToolRegistry};
use crate::web::WebFetcher;

pub mod error;

use error::InitializationError;

/// Shared application state handed to every route.
///
/// Holds the loaded settings plus the long-lived services built from them:
/// the document loaders, retrieval, the scraper and the agent.
#[derive(Clone)]
pub struct AppState {
    pub paths: Arc<AppPaths>,
    pub settings: Arc<Settings>,
    pub loader: Arc<DocumentLoader>,
    pub web_loader: Arc<WebDocumentLoader>,
    pub scraper: Arc<Scraper>,
    pub search: Arc<DocumentSearch>,
    pub agent: Arc<AgentService>,
}

impl AppState {
    /// Connects the configured vector store and the Azure OpenAI
    /// deployments, then wires the services together.
    pub async fn initialize(
        paths: Arc<AppPaths>,
        settings: Settings,
    ) -> Result<Arc<Self>, InitializationError> {
        let store: Arc<dyn VectorStore> = match settings.vector_store.backend {
            VectorBackend::Qdrant => {
                let store = QdrantStore::new(
                    &settings.vector_store.url,
                    settings.vector_store.api_key.clone(),
                )
                .map_err(|e| InitializationError::VectorStore(e.into()))?;
                wait_until_available(
                    &store,
                    settings.vector_store.startup_retries,
                    Duration::from_secs(1),
                )
                .await
                .map_err(|e| InitializationError::VectorStore(e.into()))?;
                Arc::new(store)
            }
            VectorBackend::Sqlite => Arc::new(
                SqliteVectorStore::with_path(paths.resolve(&settings.vector_store.sqlite_path))
                    .await
                    .map_err(|e| InitializationError::VectorStore(e.into()))?,
            ),
        };

        let azure = Arc::new(
            AzureOpenAiProvider::new(&settings.openai)
                .map_err(|e| InitializationError::Llm(e.into()))?,
        );

        Self::build(paths, settings, store, azure.clone(), azure)
    }

    /// Wires the services over already-constructed backends.
    pub fn build(
        paths: Arc<AppPaths>,
        settings: Settings,
        store: Arc<dyn VectorStore>,
        llm: Arc<dyn LlmProvider>,
        embedder: Arc<dyn EmbeddingProvider>,
    ) -> Result<Arc<Self>, InitializationError> {
        let ingest = &settings.ingest;
        let splitter = TextSplitter::new(SplitterConfig {
            chunk_size: ingest.chunk_size,
            chunk_overlap: ingest.chunk_overlap,
        });
        let mut indexer = Indexer::new(store.clone(), embedder.clone(), splitter)
            .with_batch_size(ingest.embed_batch_size);
        if ingest.extract_metadata {
            indexer = indexer.with_extractor(MetadataExtractor::new(
                llm.clone(),
                ingest.keywords,
                ingest.questions,
            ));
        }
        let indexer = Arc::new(indexer);

        let converter = Arc::new(PptxConverter::discover(
            &ingest.converter_program,
            ingest.max_conversion_retries,
        ));
        let loader = Arc::new(
            DocumentLoader::new(
                indexer.clone(),
                FileHashStore::new(paths.hash_db_dir.clone()),
                converter,
                paths.resolve(&ingest.output_dir),
            )
            .with_hash_check_scope(ingest.hash_check_scope),
        );

        let fetcher = WebFetcher::new(settings.web.clone())
            .map_err(|e| InitializationError::Web(e.into()))?;
        let web_loader = Arc::new(WebDocumentLoader::new(fetcher.clone(), indexer));
        let scraper = Arc::new(Scraper::new(fetcher, paths.resolve(&ingest.source_dir)));

        let search = Arc::new(DocumentSearch::new(
            store,
            embedder,
            llm.clone(),
            settings.tools.search_top_k,
            settings.tools.rerank_top_n,
        ));

        let tools = ToolRegistry::with_builtin_tools(
            &settings.tools,
            ToolDeps {
                http: reqwest::Client::builder()
                    .timeout(Duration::from_secs(settings.web.fetch_timeout_secs))
                    .build()
                    .map_err(|e| InitializationError::Web(e.into()))?,
                llm: llm.clone(),
                search: search.clone(),
                web_loader: web_loader.clone(),
            },
        );
        tracing::info!("Registered tools: {:?}", tools.names());

        let templates = TemplateRegistry::load(&paths.template_dir)
            .map_err(|e| InitializationError::Templates(e.into()))?;
        tracing::info!("Agent templates: {:?}", templates.agent_names());
        let agent = Arc::new(AgentService::new(
            llm,
            tools,
            templates,
            ChatHistoryStore::new(paths.chat_history_dir.clone()),
            settings.agent.clone(),
        ));

        Ok(Arc::new(AppState {
            paths,
            settings: Arc::new(settings),
            loader,
            web_loader,
            scraper,
            search,
            agent,
        }))
    }
}
