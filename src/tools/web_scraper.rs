//! Main-content extraction from web pages

use super::{http_error, url_list, Tool, ToolError};
use crate::config::ToolsConfig;
use async_trait::async_trait;
use reqwest::Client;
use scraper::{ElementRef, Html, Node, Selector};
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, warn};

/// Returned when no link yields any text
pub const NO_CONTENT: &str = "No content could be extracted from the provided URLs.";

/// Candidate content roots, most specific first
const CONTENT_ROOTS: &[&str] = &["main", "article", "[role=\"main\"]", "#content", ".content"];

/// Fetches pages and returns their main text
pub struct WebScraperTool {
    http: Client,
    timeout: Duration,
}

impl WebScraperTool {
    pub fn new(config: &ToolsConfig) -> Result<Self, ToolError> {
        let http = Client::builder()
            .timeout(config.timeout())
            .user_agent(config.user_agent.as_str())
            .build()
            .map_err(|e| ToolError::Exec(e.to_string()))?;

        Ok(Self {
            http,
            timeout: config.timeout(),
        })
    }

    async fn scrape(&self, link: &str) -> Result<String, ToolError> {
        let response = self
            .http
            .get(link)
            .send()
            .await
            .map_err(|e| http_error(e, self.timeout))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ToolError::Upstream(format!("{} returned {}", link, status)));
        }

        let html = response.text().await.map_err(|e| http_error(e, self.timeout))?;
        Ok(extract_main_text(&html))
    }
}

#[async_trait]
impl Tool for WebScraperTool {
    fn name(&self) -> &'static str {
        "web_scraper"
    }

    fn description(&self) -> &'static str {
        "Use this tool to scrape web data, like news, articles, and blogs etc."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "web_links": {
                    "type": "array",
                    "items": {"type": "string"},
                    "description": "The web links to be scraped. Make sure that their format is correct."
                }
            },
            "required": ["web_links"]
        })
    }

    async fn invoke(&self, input: Value) -> Result<String, ToolError> {
        let links = url_list(&input, "web_links")?;
        let mut documents = Vec::new();

        for link in &links {
            match self.scrape(link).await {
                Ok(text) if !text.is_empty() => {
                    debug!("Scraped {} characters from {}", text.len(), link);
                    documents.push(format!("Source: {}\n\n{}", link, text));
                }
                Ok(_) => warn!("No text found at {}", link),
                Err(e) => warn!("Error scraping {}: {}", link, e),
            }
        }

        if documents.is_empty() {
            return Ok(NO_CONTENT.to_string());
        }

        Ok(documents.join("\n\n---\n\n"))
    }
}

/// Text of the page's main content, falling back to the body
pub fn extract_main_text(html: &str) -> String {
    let document = Html::parse_document(html);

    let root = CONTENT_ROOTS
        .iter()
        .chain(std::iter::once(&"body"))
        .filter_map(|s| Selector::parse(s).ok())
        .find_map(|selector| document.select(&selector).next());

    let Some(root) = root else {
        return String::new();
    };

    let mut lines = Vec::new();
    collect_text(root, &mut lines);
    lines.join("\n")
}

fn collect_text(element: ElementRef<'_>, lines: &mut Vec<String>) {
    if matches!(element.value().name(), "script" | "style" | "noscript" | "template") {
        return;
    }

    for child in element.children() {
        match child.value() {
            Node::Text(text) => {
                let normalized = text.split_whitespace().collect::<Vec<_>>().join(" ");
                if !normalized.is_empty() {
                    lines.push(normalized);
                }
            }
            Node::Element(_) => {
                if let Some(child) = ElementRef::wrap(child) {
                    collect_text(child, lines);
                }
            }
            _ => {}
        }
    }
}
