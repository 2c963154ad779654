//! Configuration for the assistant
//!
//! Loaded from an optional TOML file, then `ASSISTANT__SECTION__FIELD`
//! environment variables. Provider keys fall back to the conventional
//! `OPENAI_API_KEY` / `ANTHROPIC_API_KEY` variables.

pub mod model_selection;

pub use model_selection::ModelSelection;

use crate::error::Result;
use secrecy::SecretString;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

/// Top-level configuration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub model: ModelConfig,
    #[serde(default)]
    pub provider: ProviderConfig,
    #[serde(default)]
    pub anthropic: AnthropicConfig,
    #[serde(default)]
    pub summarizer: SummarizerConfig,
    #[serde(default)]
    pub agent: AgentConfig,
    #[serde(default)]
    pub tools: ToolsConfig,
    #[serde(default)]
    pub transcripts: TranscriptConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load from a TOML file (optional) and the environment
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let settings = ::config::Config::builder()
            .add_source(::config::File::from(path.as_ref()).required(false))
            .add_source(::config::Environment::with_prefix("ASSISTANT").separator("__"))
            .build()?;

        let config: Config = settings.try_deserialize()?;
        Ok(config.with_env_keys())
    }

    /// Fill unset API keys from the conventional environment variables
    pub fn with_env_keys(mut self) -> Self {
        if self.provider.api_key.is_none() {
            if let Ok(key) = std::env::var("OPENAI_API_KEY") {
                self.provider.api_key = Some(SecretString::new(key));
            }
        }

        if self.anthropic.api_key.is_none() {
            if let Ok(key) = std::env::var("ANTHROPIC_API_KEY") {
                self.anthropic.api_key = Some(SecretString::new(key));
            }
        }

        self
    }
}

/// Model selection
#[derive(Debug, Clone, Deserialize)]
pub struct ModelConfig {
    /// JSON file holding the persisted model selection
    #[serde(default = "default_selection_file")]
    pub selection_file: String,

    /// Model used when no selection has been persisted
    #[serde(default = "default_model")]
    pub default_model: String,
}

fn default_selection_file() -> String {
    "model_config.json".to_string()
}

fn default_model() -> String {
    "gpt-4o".to_string()
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            selection_file: default_selection_file(),
            default_model: default_model(),
        }
    }
}

/// OpenAI-compatible chat completion provider
#[derive(Debug, Clone, Deserialize)]
pub struct ProviderConfig {
    /// Base URL, `/chat/completions` is appended
    #[serde(default = "default_provider_url")]
    pub api_url: String,

    #[serde(default)]
    pub api_key: Option<SecretString>,

    #[serde(default = "default_provider_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_provider_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_provider_timeout_ms() -> u64 {
    120_000
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            api_url: default_provider_url(),
            api_key: None,
            timeout_ms: default_provider_timeout_ms(),
        }
    }
}

impl ProviderConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Anthropic token counting endpoint
#[derive(Debug, Clone, Deserialize)]
pub struct AnthropicConfig {
    #[serde(default = "default_anthropic_url")]
    pub api_url: String,

    #[serde(default)]
    pub api_key: Option<SecretString>,

    #[serde(default = "default_anthropic_version")]
    pub version: String,

    #[serde(default = "default_anthropic_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_anthropic_url() -> String {
    "https://api.anthropic.com".to_string()
}

fn default_anthropic_version() -> String {
    "2023-06-01".to_string()
}

fn default_anthropic_timeout_ms() -> u64 {
    10_000
}

impl Default for AnthropicConfig {
    fn default() -> Self {
        Self {
            api_url: default_anthropic_url(),
            api_key: None,
            version: default_anthropic_version(),
            timeout_ms: default_anthropic_timeout_ms(),
        }
    }
}

impl AnthropicConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Recursive summarizer settings
#[derive(Debug, Clone, Deserialize)]
pub struct SummarizerConfig {
    /// Model that produces summaries
    #[serde(default = "default_summarizer_model")]
    pub model: String,

    #[serde(default = "default_summarizer_temperature")]
    pub temperature: Option<f32>,

    /// Reduction rounds before giving up with a context overflow
    #[serde(default = "default_max_rounds")]
    pub max_rounds: usize,

    /// Chunk summaries in flight at once
    #[serde(default = "default_max_concurrent_chunks")]
    pub max_concurrent_chunks: usize,

    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap_tokens: usize,
}

fn default_summarizer_model() -> String {
    "o3-mini".to_string()
}

fn default_summarizer_temperature() -> Option<f32> {
    Some(0.3)
}

fn default_max_rounds() -> usize {
    5
}

fn default_max_concurrent_chunks() -> usize {
    4
}

fn default_chunk_overlap() -> usize {
    100
}

impl Default for SummarizerConfig {
    fn default() -> Self {
        Self {
            model: default_summarizer_model(),
            temperature: default_summarizer_temperature(),
            max_rounds: default_max_rounds(),
            max_concurrent_chunks: default_max_concurrent_chunks(),
            chunk_overlap_tokens: default_chunk_overlap(),
        }
    }
}

/// Agent loop settings
#[derive(Debug, Clone, Deserialize)]
pub struct AgentConfig {
    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,

    #[serde(default)]
    pub temperature: Option<f32>,

    /// Share of the model's input budget a single tool output may occupy
    #[serde(default = "default_tool_output_share")]
    pub tool_output_share: f32,

    /// Overall deadline for one request, in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: Option<u64>,
}

fn default_max_iterations() -> usize {
    8
}

fn default_tool_output_share() -> f32 {
    0.5
}

fn default_request_timeout() -> Option<u64> {
    Some(600)
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_iterations: default_max_iterations(),
            temperature: None,
            tool_output_share: default_tool_output_share(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

impl AgentConfig {
    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_secs.map(Duration::from_secs)
    }
}

/// Web tools
#[derive(Debug, Clone, Deserialize)]
pub struct ToolsConfig {
    /// DuckDuckGo Instant Answer API base URL
    #[serde(default = "default_search_url")]
    pub search_url: String,

    /// YouTube site used for video search
    #[serde(default = "default_youtube_url")]
    pub youtube_url: String,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    #[serde(default = "default_tool_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_search_url() -> String {
    "https://api.duckduckgo.com".to_string()
}

fn default_youtube_url() -> String {
    "https://www.youtube.com".to_string()
}

fn default_user_agent() -> String {
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36".to_string()
}

fn default_tool_timeout_ms() -> u64 {
    20_000
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            search_url: default_search_url(),
            youtube_url: default_youtube_url(),
            user_agent: default_user_agent(),
            timeout_ms: default_tool_timeout_ms(),
        }
    }
}

impl ToolsConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Video transcript retrieval
#[derive(Debug, Clone, Deserialize)]
pub struct TranscriptConfig {
    #[serde(default = "default_timedtext_url")]
    pub timedtext_url: String,

    #[serde(default = "default_language")]
    pub language: String,

    /// Transcripts kept in memory
    #[serde(default = "default_cache_size")]
    pub cache_size: u64,

    /// Evict entries not read for this many seconds
    #[serde(default)]
    pub cache_idle_secs: Option<u64>,
}

fn default_timedtext_url() -> String {
    "https://www.youtube.com/api/timedtext".to_string()
}

fn default_language() -> String {
    "en".to_string()
}

fn default_cache_size() -> u64 {
    100
}

impl Default for TranscriptConfig {
    fn default() -> Self {
        Self {
            timedtext_url: default_timedtext_url(),
            language: default_language(),
            cache_size: default_cache_size(),
            cache_idle_secs: None,
        }
    }
}

/// Logging
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Emit JSON lines instead of human-readable output
    #[serde(default)]
    pub json: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}
