//! Tools the agent can call

use crate::provider::ToolSpec;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

pub mod web_scraper;
pub mod web_search;
pub mod youtube_search;
pub mod youtube_transcript;

pub use web_scraper::WebScraperTool;
pub use web_search::WebSearchTool;
pub use youtube_search::YoutubeSearchTool;
pub use youtube_transcript::YoutubeTranscriptTool;

/// Tool execution errors
#[derive(Error, Debug)]
pub enum ToolError {
    #[error("Execution error: {0}")]
    Exec(String),

    #[error("Invalid input: {0}")]
    Invalid(String),

    #[error("Upstream error: {0}")]
    Upstream(String),

    #[error("Timeout after {0:?}")]
    Timeout(Duration),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Map an HTTP client failure, keeping timeouts distinct
pub(crate) fn http_error(e: reqwest::Error, timeout: Duration) -> ToolError {
    if e.is_timeout() {
        ToolError::Timeout(timeout)
    } else {
        ToolError::Upstream(e.to_string())
    }
}

/// A capability the model may invoke by name
#[async_trait]
pub trait Tool: Send + Sync {
    /// Tool name (must be unique)
    fn name(&self) -> &'static str;

    /// Tool description
    fn description(&self) -> &'static str {
        "No description available"
    }

    /// JSON schema of the arguments
    fn parameters(&self) -> Value;

    /// Execute the tool with given input
    async fn invoke(&self, input: Value) -> Result<String, ToolError>;

    /// Description advertised to the model
    fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: self.name().to_string(),
            description: self.description().to_string(),
            parameters: self.parameters(),
        }
    }
}

/// Tool registry for managing available tools
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
        }
    }

    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        let name = tool.name().to_string();
        self.tools.insert(name, tool);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    /// Tool names, sorted
    pub fn list(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.tools.keys().map(|s| s.as_str()).collect();
        names.sort_unstable();
        names
    }

    /// Specs of every registered tool, sorted by name
    pub fn specs(&self) -> Vec<ToolSpec> {
        self.list()
            .into_iter()
            .filter_map(|name| self.tools.get(name))
            .map(|tool| tool.spec())
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Read a list of URLs from `input[field]`
pub(crate) fn url_list(input: &Value, field: &str) -> Result<Vec<String>, ToolError> {
    let links = input
        .get(field)
        .and_then(Value::as_array)
        .ok_or_else(|| ToolError::Invalid(format!("'{}' must be a list of URLs", field)))?;

    links
        .iter()
        .map(|link| {
            link.as_str()
                .map(str::to_string)
                .ok_or_else(|| ToolError::Invalid(format!("'{}' entries must be strings", field)))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct MockTool;

    #[async_trait]
    impl Tool for MockTool {
        fn name(&self) -> &'static str {
            "mock"
        }

        fn parameters(&self) -> Value {
            json!({"type": "object", "properties": {}})
        }

        async fn invoke(&self, input: Value) -> Result<String, ToolError> {
            Ok(input.to_string())
        }
    }

    #[test]
    fn test_tool_registry() {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(MockTool));

        assert!(registry.get("mock").is_some());
        assert!(registry.get("nonexistent").is_none());
        assert_eq!(registry.list(), vec!["mock"]);

        let specs = registry.specs();
        assert_eq!(specs.len(), 1);
        assert_eq!(specs[0].name, "mock");
        assert_eq!(specs[0].description, "No description available");
    }

    #[test]
    fn test_url_list() {
        let urls = url_list(&json!({"web_links": ["https://a.example", "https://b.example"]}), "web_links")
            .unwrap();
        assert_eq!(urls.len(), 2);

        assert!(matches!(
            url_list(&json!({"web_links": "https://a.example"}), "web_links"),
            Err(ToolError::Invalid(_))
        ));
        assert!(matches!(
            url_list(&json!({"web_links": [1, 2]}), "web_links"),
            Err(ToolError::Invalid(_))
        ));
    }
}
