use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use serde_json::Value;

use crate::core::config::SearchSettings;
use crate::core::errors::{bounded, CapabilityError};

#[derive(Debug, Clone, Serialize)]
pub struct SearchResult {
    pub title: String,
    pub url: String,
    pub snippet: String,
}

#[async_trait]
pub trait SearchProvider: Send + Sync {
    async fn search(&self, query: &str) -> Result<Vec<SearchResult>, CapabilityError>;
}

/// Google Custom Search when both keys are configured, DuckDuckGo otherwise.
#[derive(Clone)]
pub struct WebSearch {
    client: Client,
    google_api_key: Option<String>,
    google_engine_id: Option<String>,
}

impl WebSearch {
    pub fn new(settings: &SearchSettings) -> Self {
        Self {
            client: Client::new(),
            google_api_key: settings.google_api_key.clone(),
            google_engine_id: settings.google_engine_id.clone(),
        }
    }

    async fn google_search(
        &self,
        query: &str,
        api_key: &str,
        engine_id: &str,
    ) -> Result<Vec<SearchResult>, CapabilityError> {
        let url = format!(
            "https://www.googleapis.com/customsearch/v1?key={}&cx={}&q={}",
            api_key,
            engine_id,
            urlencoding::encode(query)
        );

        let response = self.client.get(url).send().await.map_err(search_error)?;

        if !response.status().is_success() {
            return Err(CapabilityError::Search(format!(
                "Google search failed: {}",
                response.status()
            )));
        }

        let payload: Value = response.json().await.map_err(search_error)?;
        let items = payload
            .get("items")
            .and_then(|v| v.as_array())
            .cloned()
            .unwrap_or_default();

        let mut results = Vec::new();
        for item in items {
            let field = |key: &str| {
                item.get(key)
                    .and_then(|v| v.as_str())
                    .unwrap_or("")
                    .to_string()
            };
            let (title, url, snippet) = (field("title"), field("link"), field("snippet"));
            if !title.is_empty() && !url.is_empty() {
                results.push(SearchResult {
                    title,
                    url,
                    snippet,
                });
            }
        }

        Ok(results)
    }

    async fn duckduckgo_search(&self, query: &str) -> Result<Vec<SearchResult>, CapabilityError> {
        let url = format!(
            "https://api.duckduckgo.com/?q={}&format=json&no_redirect=1&no_html=1",
            urlencoding::encode(query)
        );

        let response = self.client.get(url).send().await.map_err(search_error)?;

        if !response.status().is_success() {
            return Err(CapabilityError::Search(format!(
                "DuckDuckGo search failed: {}",
                response.status()
            )));
        }

        let payload: Value = response.json().await.map_err(search_error)?;
        Ok(parse_duckduckgo(&payload))
    }
}

#[async_trait]
impl SearchProvider for WebSearch {
    async fn search(&self, query: &str) -> Result<Vec<SearchResult>, CapabilityError> {
        if let (Some(api_key), Some(engine_id)) = (&self.google_api_key, &self.google_engine_id) {
            match self.google_search(query, api_key, engine_id).await {
                Ok(results) if !results.is_empty() => return Ok(results),
                Ok(_) => tracing::debug!("Google search returned nothing, trying DuckDuckGo"),
                Err(err) => tracing::warn!("Google search failed, trying DuckDuckGo: {}", err),
            }
        }

        self.duckduckgo_search(query).await
    }
}

fn search_error<E: std::fmt::Display>(err: E) -> CapabilityError {
    CapabilityError::Search(err.to_string())
}

fn parse_duckduckgo(payload: &Value) -> Vec<SearchResult> {
    let mut results = Vec::new();

    if let Some(abstract_text) = payload.get("AbstractText").and_then(|v| v.as_str()) {
        if let Some(url) = payload.get("AbstractURL").and_then(|v| v.as_str()) {
            if !abstract_text.is_empty() && !url.is_empty() {
                results.push(SearchResult {
                    title: abstract_text
                        .split(" - ")
                        .next()
                        .unwrap_or(abstract_text)
                        .to_string(),
                    url: url.to_string(),
                    snippet: abstract_text.to_string(),
                });
            }
        }
    }

    if let Some(items) = payload.get("Results").and_then(|v| v.as_array()) {
        extract_ddg_topics(items, &mut results);
    }
    if let Some(items) = payload.get("RelatedTopics").and_then(|v| v.as_array()) {
        extract_ddg_topics(items, &mut results);
    }

    results
}

fn extract_ddg_topics(items: &[Value], results: &mut Vec<SearchResult>) {
    for item in items {
        if let Some(topics) = item.get("Topics").and_then(|v| v.as_array()) {
            extract_ddg_topics(topics, results);
            continue;
        }
        let text = item.get("Text").and_then(|v| v.as_str()).unwrap_or("");
        let url = item.get("FirstURL").and_then(|v| v.as_str()).unwrap_or("");
        if text.is_empty() || url.is_empty() {
            continue;
        }
        results.push(SearchResult {
            title: text.split(" - ").next().unwrap_or(text).to_string(),
            url: url.to_string(),
            snippet: text.to_string(),
        });
    }
}

/// Search as prompt-ready text, truncated to a character budget.
#[derive(Clone)]
pub struct SearchService {
    provider: Arc<dyn SearchProvider>,
    max_chars: usize,
    timeout: Duration,
}

impl SearchService {
    pub fn new(provider: Arc<dyn SearchProvider>, settings: &SearchSettings) -> Self {
        Self {
            provider,
            max_chars: settings.max_chars,
            timeout: settings.timeout(),
        }
    }

    pub fn from_settings(settings: &SearchSettings) -> Self {
        Self::new(Arc::new(WebSearch::new(settings)), settings)
    }

    pub async fn search_text(&self, query: &str) -> Result<String, CapabilityError> {
        self.search_text_limited(query, self.max_chars).await
    }

    pub async fn search_text_limited(
        &self,
        query: &str,
        max_chars: usize,
    ) -> Result<String, CapabilityError> {
        let results = bounded("search", self.timeout, self.provider.search(query)).await?;
        tracing::debug!(query, hits = results.len(), "search completed");
        Ok(truncate_chars(&render_results(&results), max_chars))
    }
}

fn render_results(results: &[SearchResult]) -> String {
    results
        .iter()
        .map(|r| format!("{}\n{}\n{}", r.title, r.url, r.snippet))
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Cuts `text` to at most `max_chars` characters, never splitting a code point.
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => text[..idx].to_string(),
        None => text.to_string(),
    }
}
