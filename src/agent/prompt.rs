//! Agent prompt template

use crate::context::models::ConversationHistory;
use crate::provider::ChatMessage;

/// System prompt used when none is configured
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a research assistant that helps users write \
well-sourced content. Answer in the user's language and keep a clear structure.";

/// Guidance on the available tools, appended to every system prompt
pub const TOOL_GUIDANCE: &str = "## Tools
Use your tools to gather material before writing when the request needs facts you do not have.
- `duckduckgo_search` finds relevant pages; follow up with `web_scraper` on the best links to read them.
- `youtube_search` finds YouTube videos on a topic; `youtube_transcript_loader_tool` loads their timestamped transcripts from the links.
For detailed posts, combine both chains: search and scrape the web, and load transcripts of related videos.
Explain to the user which sources you used.";

/// System prompt plus the layout of history and input
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptTemplate {
    system: String,
}

impl PromptTemplate {
    pub fn new(system: impl Into<String>) -> Self {
        Self {
            system: system.into(),
        }
    }

    /// Full system message, tool guidance included
    pub fn system_message(&self) -> String {
        if self.system.trim().is_empty() {
            TOOL_GUIDANCE.to_string()
        } else {
            format!("{}\n\n{}", self.system.trim_end(), TOOL_GUIDANCE)
        }
    }

    /// Messages for a request: system prompt, history in order, then the input
    pub fn render(&self, history: &ConversationHistory, input: &str) -> Vec<ChatMessage> {
        let mut messages = Vec::with_capacity(history.len() + 2);
        messages.push(ChatMessage::system(self.system_message()));
        messages.extend(history.iter().map(ChatMessage::from));
        messages.push(ChatMessage::user(input));
        messages
    }
}

impl Default for PromptTemplate {
    fn default() -> Self {
        Self::new(DEFAULT_SYSTEM_PROMPT)
    }
}
