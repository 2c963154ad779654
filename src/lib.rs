//! Conversational content assistant with context-window management
//!
//! Answers user requests through a tool-calling language-model agent while
//! keeping every request inside the token budget of the selected model:
//! history is evicted oldest-first and oversized material is summarized
//! recursively until it fits.

pub mod agent;
pub mod config;
pub mod context;
pub mod error;
pub mod metrics;
pub mod orchestrator;
pub mod provider;
pub mod telemetry;
pub mod tools;
pub mod youtube;

pub use agent::{AgentLoop, AgentRequest, PromptTemplate, ToolCallingAgent};
pub use config::{Config, ModelSelection};
pub use context::{
    ContextWindowEnforcer, ConversationHistory, ConversationTurn, ModelTokenCounter,
    RecursiveSummarizer, TokenCounter,
};
pub use error::{AssistantError, Result};
pub use orchestrator::ResponseOrchestrator;

use crate::context::token_counter::RemoteTokenCounter;
use crate::provider::{AnthropicTokenCounter, CompletionProvider, OpenAiProvider};
use crate::tools::{
    ToolRegistry, WebScraperTool, WebSearchTool, YoutubeSearchTool, YoutubeTranscriptTool,
};
use crate::youtube::{TimedTextSource, TranscriptCache, TranscriptLoader};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Wired components of a running assistant
pub struct Assistant {
    pub orchestrator: ResponseOrchestrator,
    pub summarizer: Arc<RecursiveSummarizer>,
    pub counter: Arc<dyn TokenCounter>,
    pub tools: Arc<ToolRegistry>,
}

/// Build the assistant from configuration
pub fn init_assistant(config: &Config) -> Result<Assistant> {
    let mut counter = ModelTokenCounter::new()?;
    if config.anthropic.api_key.is_some() {
        let remote: Arc<dyn RemoteTokenCounter> =
            Arc::new(AnthropicTokenCounter::new(&config.anthropic)?);
        counter = counter.with_remote(remote);
        info!("Claude token counts use the provider endpoint");
    }
    let counter: Arc<dyn TokenCounter> = Arc::new(counter);

    let provider: Arc<dyn CompletionProvider> = Arc::new(OpenAiProvider::new(&config.provider)?);
    let summarizer = Arc::new(RecursiveSummarizer::new(
        provider.clone(),
        counter.clone(),
        config.summarizer.clone(),
    ));

    let tools = Arc::new(build_tools(config)?);
    info!("Registered tools: {}", tools.list().join(", "));

    let agent = Arc::new(ToolCallingAgent::new(
        provider,
        tools.clone(),
        summarizer.clone(),
        config.agent.clone(),
    ));

    let orchestrator = ResponseOrchestrator::new(
        ContextWindowEnforcer::new(counter.clone()),
        agent,
        config.agent.request_timeout(),
    );

    Ok(Assistant {
        orchestrator,
        summarizer,
        counter,
        tools,
    })
}

fn build_tools(config: &Config) -> Result<ToolRegistry> {
    let transcripts = TranscriptLoader::new(
        Arc::new(TimedTextSource::new(
            &config.transcripts,
            &config.tools.user_agent,
            config.tools.timeout(),
        )?),
        TranscriptCache::new(
            config.transcripts.cache_size,
            config.transcripts.cache_idle_secs.map(Duration::from_secs),
        ),
    );

    let mut registry = ToolRegistry::new();
    registry.register(Arc::new(WebSearchTool::new(&config.tools)?));
    registry.register(Arc::new(WebScraperTool::new(&config.tools)?));
    registry.register(Arc::new(YoutubeSearchTool::new(&config.tools)?));
    registry.register(Arc::new(YoutubeTranscriptTool::new(Arc::new(transcripts))));
    Ok(registry)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_assistant_registers_tools() {
        let assistant = init_assistant(&Config::default()).unwrap();
        assert_eq!(
            assistant.tools.list(),
            vec![
                "duckduckgo_search",
                "web_scraper",
                "youtube_search",
                "youtube_transcript_loader_tool"
            ]
        );
        assert_eq!(assistant.summarizer.default_model(), "o3-mini");
    }
}
