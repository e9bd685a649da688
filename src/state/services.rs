use std::path::PathBuf;
use std::sync::Arc;

use crate::core::config::{AppPaths, Settings};
use crate::llm::LlmService;
use crate::rag::{open_retriever, Retriever};
use crate::report::{HttpReportRenderer, ReportRenderer};
use crate::tools::search::SearchService;

/// External capabilities handed to every node through `NodeContext`.
///
/// Read-only during a run; concurrent runs share one instance.
#[derive(Clone)]
pub struct Services {
    pub llm: LlmService,
    pub search: SearchService,
    pub retriever: Arc<dyn Retriever>,
    pub renderer: Arc<dyn ReportRenderer>,
    /// Where rendered PDFs are written
    pub output_dir: PathBuf,
    /// Snippets requested per retrieval
    pub rag_top_k: usize,
}

impl Services {
    pub fn new(
        llm: LlmService,
        search: SearchService,
        retriever: Arc<dyn Retriever>,
        renderer: Arc<dyn ReportRenderer>,
        output_dir: PathBuf,
    ) -> Self {
        Self {
            llm,
            search,
            retriever,
            renderer,
            output_dir,
            rag_top_k: 5,
        }
    }

    pub fn with_rag_top_k(mut self, k: usize) -> Self {
        self.rag_top_k = k;
        self
    }

    /// Production wiring: OpenAI-compatible model, web search, persisted index, HTTP renderer.
    pub async fn from_settings(settings: &Settings, paths: &AppPaths) -> Self {
        let llm = LlmService::from_settings(&settings.llm);
        let search = SearchService::from_settings(&settings.search);
        let retriever = open_retriever(&settings.rag, &settings.llm, paths, &llm).await;
        let renderer = Arc::new(HttpReportRenderer::new(&settings.report));

        Self::new(
            llm,
            search,
            retriever,
            renderer,
            paths.resolve(&settings.report.output_dir),
        )
        .with_rag_top_k(settings.rag.top_k)
    }

    /// Default wiring that never gets called; for exercising graph plumbing.
    #[cfg(test)]
    pub fn for_tests() -> Self {
        let settings = Settings::default();
        Self::new(
            LlmService::from_settings(&settings.llm),
            SearchService::from_settings(&settings.search),
            Arc::new(crate::rag::NoRetriever),
            Arc::new(HttpReportRenderer::new(&settings.report)),
            std::env::temp_dir(),
        )
    }
}
