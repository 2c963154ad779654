//! YouTube video search
//!
//! The results page embeds its data as a `ytInitialData` JSON object; video
//! entries are its `videoRenderer` nodes, in page order.

use super::{http_error, Tool, ToolError};
use crate::config::ToolsConfig;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::Duration;
use tracing::debug;

const DEFAULT_MAX_RESULTS: usize = 5;

const INITIAL_DATA_MARKERS: &[&str] = &["var ytInitialData = ", "window[\"ytInitialData\"] = "];

/// A video found by search
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoResult {
    pub title: String,
    pub url: String,
    pub duration: String,
    pub views: String,
    pub channel: String,
}

/// YouTube search tool
pub struct YoutubeSearchTool {
    http: Client,
    base_url: String,
    timeout: Duration,
}

impl YoutubeSearchTool {
    pub fn new(config: &ToolsConfig) -> Result<Self, ToolError> {
        let http = Client::builder()
            .timeout(config.timeout())
            .user_agent(config.user_agent.as_str())
            .build()
            .map_err(|e| ToolError::Exec(e.to_string()))?;

        Ok(Self {
            http,
            base_url: config.youtube_url.trim_end_matches('/').to_string(),
            timeout: config.timeout(),
        })
    }

    /// Search videos and return up to `max_results` of them
    pub async fn search(&self, query: &str, max_results: usize) -> Result<Vec<VideoResult>, ToolError> {
        debug!("Searching YouTube for '{}'", query);

        let response = self
            .http
            .get(format!("{}/results", self.base_url))
            .query(&[("search_query", query)])
            .send()
            .await
            .map_err(|e| http_error(e, self.timeout))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ToolError::Upstream(format!("YouTube search returned {}", status)));
        }

        let page = response.text().await.map_err(|e| http_error(e, self.timeout))?;
        let data = initial_data(&page)?;

        let mut videos = Vec::new();
        collect_videos(&data, max_results, &mut videos);
        Ok(videos)
    }
}

#[async_trait]
impl Tool for YoutubeSearchTool {
    fn name(&self) -> &'static str {
        "youtube_search"
    }

    fn description(&self) -> &'static str {
        "Search for YouTube videos by query"
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "query": {"type": "string", "description": "The search query for YouTube videos"},
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

        let videos = self.search(query, max_results).await?;
        if videos.is_empty() {
            return Ok("No results found".to_string());
        }

        Ok(serde_json::to_string(&videos)?)
    }
}

/// Parse the `ytInitialData` object out of a results page
fn initial_data(page: &str) -> Result<Value, ToolError> {
    let start = INITIAL_DATA_MARKERS
        .iter()
        .find_map(|marker| page.find(marker).map(|i| i + marker.len()))
        .ok_or_else(|| ToolError::Upstream("Search page carries no video data".to_string()))?;

    // The object is followed by the rest of the script, so read just one value
    serde_json::Deserializer::from_str(&page[start..])
        .into_iter::<Value>()
        .next()
        .ok_or_else(|| ToolError::Upstream("Search page video data is empty".to_string()))?
        .map_err(ToolError::from)
}

fn collect_videos(node: &Value, max_results: usize, out: &mut Vec<VideoResult>) {
    if out.len() >= max_results {
        return;
    }

    match node {
        Value::Object(map) => {
            if let Some(renderer) = map.get("videoRenderer") {
                if let Some(video) = video_result(renderer) {
                    out.push(video);
                }
                return;
            }
            for value in map.values() {
                collect_videos(value, max_results, out);
            }
        }
        Value::Array(items) => {
            for item in items {
                collect_videos(item, max_results, out);
            }
        }
        _ => {}
    }
}

fn video_result(renderer: &Value) -> Option<VideoResult> {
    let video_id = renderer.get("videoId")?.as_str()?;
    let url_suffix = renderer
        .pointer("/navigationEndpoint/commandMetadata/webCommandMetadata/url")
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| format!("/watch?v={}", video_id));

    Some(VideoResult {
        title: text_of(renderer.get("title")),
        url: format!("https://youtube.com{}", url_suffix),
        duration: text_of(renderer.get("lengthText")),
        views: text_of(renderer.get("viewCountText")),
        channel: text_of(renderer.get("longBylineText").or_else(|| renderer.get("ownerText"))),
    })
}

/// Text of a `{simpleText}` or `{runs: [{text}]}` node
fn text_of(node: Option<&Value>) -> String {
    let Some(node) = node else {
        return String::new();
    };
    if let Some(text) = node.get("simpleText").and_then(Value::as_str) {
        return text.to_string();
    }
    node.get("runs")
        .and_then(Value::as_array)
        .map(|runs| {
            runs.iter()
                .filter_map(|run| run.get("text").and_then(Value::as_str))
                .collect::<String>()
        })
        .unwrap_or_default()
}
