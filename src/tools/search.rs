//! Web search tools: Google through SerpAPI and DuckDuckGo.

use async_trait::async_trait;
use reqwest::Client;
use scraper::{Html, Selector};
use serde::Serialize;
use serde_json::Value;

use super::{require_input, Tool, ToolError};

const SEARCH_SUFFIX: &str = "If you run a search, please provide URL to the useful links in markdown.";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchResult {
    pub title: String,
    pub url: String,
    pub snippet: String,
}

/// `[snippet: ..., title: ..., link: ...], [...]`, the listing format the
/// agent prompts were written against.
pub fn format_results(results: &[SearchResult]) -> String {
    results
        .iter()
        .map(|r| format!("[snippet: {}, title: {}, link: {}]", r.snippet, r.title, r.url))
        .collect::<Vec<_>>()
        .join(", ")
}

pub struct SerpApiTool {
    client: Client,
    api_key: Option<String>,
    description: String,
}

impl SerpApiTool {
    pub fn new(client: Client, api_key: Option<String>) -> Self {
        Self {
            client,
            api_key: api_key.filter(|k| !k.trim().is_empty()),
            description: format!(
                "This is a tool that conducts Google searches via the SerpAPI to retrieve \
                 real-time search results programmatically, allowing for efficient extraction \
                 and analysis of search data to obtain current and relevant web information for \
                 a given query. {}",
                SEARCH_SUFFIX
            ),
        }
    }
}

#[async_trait]
impl Tool for SerpApiTool {
    fn name(&self) -> &str {
        "search_google"
    }

    fn description(&self) -> &str {
        &self.description
    }

    async fn invoke(&self, input: &str) -> Result<String, ToolError> {
        let query = require_input(input)?;
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| ToolError::NotConfigured("SerpAPI key".to_string()))?;

        let response = self
            .client
            .get("https://serpapi.com/search")
            .query(&[("engine", "google"), ("q", query), ("api_key", api_key)])
            .send()
            .await
            .map_err(ToolError::Http)?;
        if !response.status().is_success() {
            return Err(ToolError::Upstream {
                service: "SerpAPI".to_string(),
                status: response.status().as_u16(),
            });
        }

        let payload: Value = response.json().await.map_err(ToolError::Http)?;
        Ok(summarize_serp(&payload))
    }
}

/// Prefers a direct answer, then the knowledge graph, then organic snippets.
pub fn summarize_serp(payload: &Value) -> String {
    if let Some(error) = payload.get("error").and_then(|v| v.as_str()) {
        return format!("Got error from SerpAPI: {}", error);
    }

    let answer_box = payload.get("answer_box");
    for key in ["answer", "snippet"] {
        if let Some(text) = answer_box.and_then(|b| b.get(key)).and_then(|v| v.as_str()) {
            return text.to_string();
        }
    }
    if let Some(text) = payload
        .get("knowledge_graph")
        .and_then(|kg| kg.get("description"))
        .and_then(|v| v.as_str())
    {
        return text.to_string();
    }

    let results = payload
        .get("organic_results")
        .and_then(|v| v.as_array())
        .map(|items| {
            items
                .iter()
                .filter_map(|item| {
                    let title = item.get("title")?.as_str()?;
                    let url = item.get("link")?.as_str()?;
                    let snippet = item.get("snippet").and_then(|v| v.as_str()).unwrap_or("");
                    Some(SearchResult {
                        title: title.to_string(),
                        url: url.to_string(),
                        snippet: snippet.to_string(),
                    })
                })
                .collect::<Vec<_>>()
        })
        .unwrap_or_default();

    if results.is_empty() {
        "No good search result found".to_string()
    } else {
        format_results(&results)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DuckDuckGoSource {
    Text,
    News,
    Videos,
}

impl DuckDuckGoSource {
    fn tool_name(self) -> &'static str {
        match self {
            DuckDuckGoSource::Text => "search_duckduckgo",
            DuckDuckGoSource::News => "search_duckduckgo_news",
            DuckDuckGoSource::Videos => "search_duckduckgo_videos",
        }
    }

    fn description(self) -> String {
        let (kind, info) = match self {
            DuckDuckGoSource::Text => ("web searches", "search data to obtain current and relevant web"),
            DuckDuckGoSource::News => ("news searches", "news data to obtain current and relevant news"),
            DuckDuckGoSource::Videos => ("video searches", "video data to obtain current and relevant video"),
        };
        let results = match self {
            DuckDuckGoSource::Text => "search",
            DuckDuckGoSource::News => "news",
            DuckDuckGoSource::Videos => "video",
        };
        format!(
            "This is a tool that conducts {} to retrieve real-time {} results programmatically, \
             allowing for efficient extraction and analysis of {} information for a given \
             query. {}",
            kind, results, info, SEARCH_SUFFIX
        )
    }

    fn vertical(self) -> Option<&'static str> {
        match self {
            DuckDuckGoSource::Text => None,
            DuckDuckGoSource::News => Some("news"),
            DuckDuckGoSource::Videos => Some("videos"),
        }
    }
}

pub struct DuckDuckGoTool {
    client: Client,
    source: DuckDuckGoSource,
    max_results: usize,
    description: String,
}

impl DuckDuckGoTool {
    pub fn new(client: Client, source: DuckDuckGoSource, max_results: usize) -> Self {
        Self {
            client,
            source,
            max_results: max_results.max(1),
            description: source.description(),
        }
    }

    /// Instant-answer API: good for entities, often empty for open queries.
    async fn instant_answers(&self, query: &str) -> Result<Vec<SearchResult>, ToolError> {
        let response = self
            .client
            .get("https://api.duckduckgo.com/")
            .query(&[
                ("q", query),
                ("format", "json"),
                ("no_redirect", "1"),
                ("no_html", "1"),
            ])
            .send()
            .await
            .map_err(ToolError::Http)?;
        if !response.status().is_success() {
            return Err(ToolError::Upstream {
                service: "DuckDuckGo".to_string(),
                status: response.status().as_u16(),
            });
        }
        let payload: Value = response.json().await.map_err(ToolError::Http)?;
        Ok(parse_instant_answers(&payload))
    }

    async fn html_results(&self, query: &str) -> Result<Vec<SearchResult>, ToolError> {
        let mut params = vec![("q", query), ("kl", "wt-wt")];
        if let Some(vertical) = self.source.vertical() {
            params.push(("iar", vertical));
        }
        let response = self
            .client
            .get("https://html.duckduckgo.com/html/")
            .query(&params)
            .send()
            .await
            .map_err(ToolError::Http)?;
        if !response.status().is_success() {
            return Err(ToolError::Upstream {
                service: "DuckDuckGo".to_string(),
                status: response.status().as_u16(),
            });
        }
        let body = response.text().await.map_err(ToolError::Http)?;
        Ok(parse_html_results(&body))
    }
}

#[async_trait]
impl Tool for DuckDuckGoTool {
    fn name(&self) -> &str {
        self.source.tool_name()
    }

    fn description(&self) -> &str {
        &self.description
    }

    async fn invoke(&self, input: &str) -> Result<String, ToolError> {
        let query = require_input(input)?;

        let mut results = Vec::new();
        if self.source == DuckDuckGoSource::Text {
            match self.instant_answers(query).await {
                Ok(found) => results = found,
                Err(err) => tracing::debug!("DuckDuckGo instant answers failed: {}", err),
            }
        }
        if results.is_empty() {
            results = self.html_results(query).await?;
        }
        results.truncate(self.max_results);

        if results.is_empty() {
            return Ok("No good DuckDuckGo Search Result was found".to_string());
        }
        Ok(format_results(&results))
    }
}

pub fn parse_instant_answers(payload: &Value) -> Vec<SearchResult> {
    let mut results = Vec::new();

    if let (Some(text), Some(url)) = (
        payload.get("AbstractText").and_then(|v| v.as_str()),
        payload.get("AbstractURL").and_then(|v| v.as_str()),
    ) {
        if !text.is_empty() && !url.is_empty() {
            results.push(SearchResult {
                title: payload
                    .get("Heading")
                    .and_then(|v| v.as_str())
                    .filter(|h| !h.is_empty())
                    .unwrap_or_else(|| text.split(" - ").next().unwrap_or(text))
                    .to_string(),
                url: url.to_string(),
                snippet: text.to_string(),
            });
        }
    }

    for key in ["Results", "RelatedTopics"] {
        if let Some(items) = payload.get(key).and_then(|v| v.as_array()) {
            collect_topics(items, &mut results);
        }
    }
    results
}

fn collect_topics(items: &[Value], results: &mut Vec<SearchResult>) {
    for item in items {
        if let Some(topics) = item.get("Topics").and_then(|v| v.as_array()) {
            collect_topics(topics, results);
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

/// Results page of the no-JavaScript frontend.
pub fn parse_html_results(body: &str) -> Vec<SearchResult> {
    let document = Html::parse_document(body);
    let (Ok(result), Ok(link), Ok(snippet_sel)) = (
        Selector::parse(".result"),
        Selector::parse("a.result__a"),
        Selector::parse(".result__snippet"),
    ) else {
        return Vec::new();
    };

    document
        .select(&result)
        .filter_map(|node| {
            let anchor = node.select(&link).next()?;
            let href = anchor.value().attr("href")?;
            let title = anchor.text().collect::<String>().trim().to_string();
            let snippet = node
                .select(&snippet_sel)
                .next()
                .map(|s| s.text().collect::<String>().trim().to_string())
                .unwrap_or_default();
            Some(SearchResult {
                title,
                url: resolve_redirect(href),
                snippet,
            })
        })
        .filter(|r| !r.title.is_empty())
        .collect()
}

/// Result links point at `//duckduckgo.com/l/?uddg=<encoded target>`.
fn resolve_redirect(href: &str) -> String {
    href.split_once("uddg=")
        .map(|(_, rest)| rest.split('&').next().unwrap_or(rest))
        .and_then(|encoded| urlencoding::decode(encoded).ok())
        .map(|decoded| decoded.into_owned())
        .unwrap_or_else(|| href.to_string())
}
