//! Error types shared across the assistant

use crate::tools::ToolError;
use std::time::Duration;
use thiserror::Error;

/// Substrings providers use when a request exceeds the model's context length
const CONTEXT_LENGTH_MARKERS: &[&str] = &[
    "context_length_exceeded",
    "maximum context length",
    "context window",
    "prompt is too long",
    "too many tokens",
];

/// Assistant errors
#[derive(Debug, Error)]
pub enum AssistantError {
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Rate limited by provider: {0}")]
    RateLimited(String),

    #[error("Provider error (status {status:?}): {message}")]
    Provider {
        status: Option<u16>,
        message: String,
    },

    #[error("Context overflow: {tokens} tokens exceed the limit of {limit} after {rounds} summarization rounds")]
    ContextOverflow {
        tokens: usize,
        limit: usize,
        rounds: usize,
    },

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Agent error: {0}")]
    Agent(String),

    #[error("Tool error: {0}")]
    Tool(#[from] ToolError),

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Timed out after {0:?}")]
    Timeout(Duration),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Config error: {0}")]
    Config(#[from] ::config::ConfigError),
}

impl AssistantError {
    /// Whether the caller may reasonably retry or surface the error and continue
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::Transport(_) | Self::RateLimited(_) | Self::Timeout(_)
        )
    }

    /// Whether the provider rejected the request for exceeding the context length
    pub fn is_context_length_exceeded(&self) -> bool {
        let text = self.to_string().to_lowercase();
        CONTEXT_LENGTH_MARKERS.iter().any(|m| text.contains(m))
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, AssistantError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_context_length_detection() {
        let err = AssistantError::Provider {
            status: Some(400),
            message: "This model's maximum context length is 128000 tokens".to_string(),
        };
        assert!(err.is_context_length_exceeded());

        let err = AssistantError::Provider {
            status: Some(400),
            message: "invalid_request_error: context_length_exceeded".to_string(),
        };
        assert!(err.is_context_length_exceeded());

        let err = AssistantError::Transport("connection reset".to_string());
        assert!(!err.is_context_length_exceeded());
    }

    #[test]
    fn test_recoverable() {
        assert!(AssistantError::Transport("dns".to_string()).is_recoverable());
        assert!(AssistantError::Timeout(Duration::from_secs(1)).is_recoverable());
        assert!(!AssistantError::InvalidInput("bad url".to_string()).is_recoverable());
        assert!(!AssistantError::ContextOverflow {
            tokens: 10,
            limit: 5,
            rounds: 5
        }
        .is_recoverable());
    }
}
