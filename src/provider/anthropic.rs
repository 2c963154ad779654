//! Provider-side token counting for Claude models

use crate::config::AnthropicConfig;
use crate::context::token_counter::RemoteTokenCounter;
use crate::error::{AssistantError, Result};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Client for Anthropic's `count_tokens` endpoint
pub struct AnthropicTokenCounter {
    http: Client,
    api_url: String,
    api_key: SecretString,
    version: String,
}

impl AnthropicTokenCounter {
    /// Create a counter; requires an API key
    pub fn new(config: &AnthropicConfig) -> Result<Self> {
        let api_key = config.api_key.clone().ok_or_else(|| {
            AssistantError::Configuration("Anthropic API key is not set".to_string())
        })?;

        let http = Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| AssistantError::Configuration(e.to_string()))?;

        Ok(Self {
            http,
            api_url: config.api_url.trim_end_matches('/').to_string(),
            api_key,
            version: config.version.clone(),
        })
    }
}

#[async_trait]
impl RemoteTokenCounter for AnthropicTokenCounter {
    async fn count(&self, text: &str, model: &str) -> Result<usize> {
        let url = format!("{}/v1/messages/count_tokens", self.api_url);
        let body = CountRequest {
            model,
            messages: vec![CountMessage {
                role: "user",
                content: text,
            }],
        };

        let response = self
            .http
            .post(&url)
            .header("x-api-key", self.api_key.expose_secret())
            .header("anthropic-version", &self.version)
            .json(&body)
            .send()
            .await
            .map_err(|e| AssistantError::Transport(e.to_string()))?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(AssistantError::RateLimited(
                response.text().await.unwrap_or_default(),
            ));
        }
        if !status.is_success() {
            return Err(AssistantError::Provider {
                status: Some(status.as_u16()),
                message: response.text().await.unwrap_or_default(),
            });
        }

        let parsed: CountResponse = response.json().await.map_err(|e| AssistantError::Provider {
            status: None,
            message: format!("Failed to parse token count: {}", e),
        })?;

        debug!("Remote token count for {}: {}", model, parsed.input_tokens);
        Ok(parsed.input_tokens)
    }
}

#[derive(Debug, Serialize)]
struct CountRequest<'a> {
    model: &'a str,
    messages: Vec<CountMessage<'a>>,
}

#[derive(Debug, Serialize)]
struct CountMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct CountResponse {
    input_tokens: usize,
}
