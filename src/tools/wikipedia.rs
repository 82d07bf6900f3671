use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;

use super::{require_input, Tool, ToolError};

const API: &str = "https://en.wikipedia.org/w/api.php";
const TOP_K_RESULTS: usize = 3;
const MAX_CHARS: usize = 4000;

pub struct WikipediaTool {
    client: Client,
}

impl WikipediaTool {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    async fn get(&self, params: &[(&str, &str)]) -> Result<Value, ToolError> {
        let response = self
            .client
            .get(API)
            .query(params)
            .send()
            .await
            .map_err(ToolError::Http)?;
        if !response.status().is_success() {
            return Err(ToolError::Upstream {
                service: "Wikipedia".to_string(),
                status: response.status().as_u16(),
            });
        }
        response.json().await.map_err(ToolError::Http)
    }
}

#[async_trait]
impl Tool for WikipediaTool {
    fn name(&self) -> &str {
        "search_wikipedia"
    }

    fn description(&self) -> &str {
        "This is a tool that conducts Wikipedia searches to retrieve real-time search results \
         programmatically, allowing for efficient extraction and analysis of general information \
         for a given query. Wikipedia is an excellent resource for relevant information about \
         popular topics, people, and places. If you run a search, please provide URL to the \
         useful links in markdown."
    }

    async fn invoke(&self, input: &str) -> Result<String, ToolError> {
        let query = require_input(input)?;
        let limit = TOP_K_RESULTS.to_string();
        let found = self
            .get(&[
                ("action", "query"),
                ("list", "search"),
                ("srsearch", query),
                ("srlimit", &limit),
                ("format", "json"),
            ])
            .await?;

        let mut pages = Vec::new();
        for title in search_titles(&found) {
            let extract = self
                .get(&[
                    ("action", "query"),
                    ("prop", "extracts"),
                    ("exintro", "1"),
                    ("explaintext", "1"),
                    ("redirects", "1"),
                    ("titles", &title),
                    ("format", "json"),
                ])
                .await;
            match extract {
                Ok(payload) => {
                    if let Some(summary) = page_extract(&payload) {
                        pages.push(format_page(&title, &summary));
                    }
                }
                Err(err) => tracing::warn!("Wikipedia extract for '{}' failed: {}", title, err),
            }
        }

        if pages.is_empty() {
            return Ok("No good Wikipedia Search Result was found".to_string());
        }
        Ok(pages.join("\n\n").chars().take(MAX_CHARS).collect())
    }
}

fn search_titles(payload: &Value) -> Vec<String> {
    payload
        .pointer("/query/search")
        .and_then(|v| v.as_array())
        .map(|items| {
            items
                .iter()
                .filter_map(|item| item.get("title")?.as_str().map(str::to_string))
                .take(TOP_K_RESULTS)
                .collect()
        })
        .unwrap_or_default()
}

fn page_extract(payload: &Value) -> Option<String> {
    payload
        .pointer("/query/pages")?
        .as_object()?
        .values()
        .find_map(|page| page.get("extract")?.as_str().map(str::to_string))
        .filter(|text| !text.trim().is_empty())
}

fn format_page(title: &str, summary: &str) -> String {
    format!(
        "Page: {}\nURL: https://en.wikipedia.org/wiki/{}\nSummary: {}",
        title,
        urlencoding::encode(&title.replace(' ', "_")),
        summary.trim()
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn reads_titles_and_extracts() {
        let search = json!({ "query": { "search": [{ "title": "Rust (programming language)" }, { "title": "Cargo" }] } });
        assert_eq!(search_titles(&search), vec!["Rust (programming language)", "Cargo"]);

        let extract = json!({ "query": { "pages": { "123": { "title": "Cargo", "extract": "Cargo builds crates." } } } });
        assert_eq!(page_extract(&extract).as_deref(), Some("Cargo builds crates."));
        assert_eq!(page_extract(&json!({ "query": { "pages": { "-1": { "missing": "" } } } })), None);
    }

    #[test]
    fn pages_link_to_the_article() {
        let rendered = format_page("Rust (programming language)", " Systems language. ");
        assert!(rendered.starts_with("Page: Rust (programming language)\n"));
        assert!(rendered.contains("wiki/Rust_%28programming_language%29"));
        assert!(rendered.ends_with("Summary: Systems language."));
    }
}
