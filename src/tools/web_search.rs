//! Web search through the DuckDuckGo Instant Answer API

use super::{http_error, Tool, ToolError};
use crate::config::ToolsConfig;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::Duration;
use tracing::debug;

const DEFAULT_MAX_RESULTS: usize = 5;

/// A single search hit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchResult {
    pub title: String,
    pub url: String,
    pub snippet: String,
}

/// DuckDuckGo search tool
pub struct WebSearchTool {
    http: Client,
    endpoint: String,
    timeout: Duration,
}

impl WebSearchTool {
    pub fn new(config: &ToolsConfig) -> Result<Self, ToolError> {
        let http = Client::builder()
            .timeout(config.timeout())
            .user_agent(config.user_agent.as_str())
            .build()
            .map_err(|e| ToolError::Exec(e.to_string()))?;

        Ok(Self {
            http,
            endpoint: config.search_url.trim_end_matches('/').to_string(),
            timeout: config.timeout(),
        })
    }

    /// Run a query and return up to `max_results` hits
    pub async fn search(&self, query: &str, max_results: usize) -> Result<Vec<SearchResult>, ToolError> {
        debug!("Searching DuckDuckGo for '{}'", query);

        let response = self
            .http
            .get(format!("{}/", self.endpoint))
            .query(&[
                ("q", query),
                ("format", "json"),
                ("no_html", "1"),
                ("skip_disambig", "1"),
            ])
            .send()
            .await
            .map_err(|e| http_error(e, self.timeout))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ToolError::Upstream(format!("Search returned {}", status)));
        }

        let body = response.text().await.map_err(|e| http_error(e, self.timeout))?;
        let answer: InstantAnswer = serde_json::from_str(&body)?;
        Ok(answer.into_results(max_results))
    }
}

#[async_trait]
impl Tool for WebSearchTool {
    fn name(&self) -> &'static str {
        "duckduckgo_search"
    }

    fn description(&self) -> &'static str {
        "Search the web using DuckDuckGo"
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "query": {"type": "string", "description": "The search query"},
                "max_results": {
                    "type": "integer",
                    "description": "Maximum number of results to return",
                    "default": DEFAULT_MAX_RESULTS
                }
            },
            "required": ["query"]
        })
    }

    async fn invoke(&self, input: Value) -> Result<String, ToolError> {
        let query = input
            .get("query")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|q| !q.is_empty())
            .ok_or_else(|| ToolError::Invalid("'query' must be a non-empty string".to_string()))?;
        let max_results = input
            .get("max_results")
            .and_then(Value::as_u64)
            .map(|n| n as usize)
            .unwrap_or(DEFAULT_MAX_RESULTS);

        let results = self.search(query, max_results).await?;
        if results.is_empty() {
            return Ok("No results found".to_string());
        }

        Ok(serde_json::to_string(&results)?)
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct InstantAnswer {
    #[serde(default)]
    heading: String,
    #[serde(default)]
    abstract_text: String,
    #[serde(default, rename = "AbstractURL")]
    abstract_url: String,
    #[serde(default)]
    results: Vec<Topic>,
    #[serde(default)]
    related_topics: Vec<Topic>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct Topic {
    #[serde(default)]
    text: String,
    #[serde(default, rename = "FirstURL")]
    first_url: String,
    /// Present on topic groups
    #[serde(default)]
    topics: Vec<Topic>,
}

impl InstantAnswer {
    fn into_results(self, max_results: usize) -> Vec<SearchResult> {
        let mut results = Vec::new();

        if !self.abstract_text.is_empty() && !self.abstract_url.is_empty() {
            results.push(SearchResult {
                title: self.heading,
                url: self.abstract_url,
                snippet: self.abstract_text,
            });
        }

        let mut topics = Vec::new();
        flatten_topics(self.results, &mut topics);
        flatten_topics(self.related_topics, &mut topics);

        results.extend(
            topics
                .into_iter()
                .filter(|t| !t.text.is_empty() && !t.first_url.is_empty())
                .map(|t| SearchResult {
                    title: t.text.split(" - ").next().unwrap_or_default().to_string(),
                    url: t.first_url,
                    snippet: t.text,
                }),
        );

        results.truncate(max_results);
        results
    }
}

fn flatten_topics(topics: Vec<Topic>, out: &mut Vec<Topic>) {
    for mut topic in topics {
        let nested = std::mem::take(&mut topic.topics);
        out.push(topic);
        flatten_topics(nested, out);
    }
}
