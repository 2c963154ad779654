//! Data models for context management

use serde::{Deserialize, Serialize};
use std::fmt;

/// Disclosure note placed in front of text that was produced by summarization
pub const SUMMARY_DISCLOSURE: &str =
    "[Note: the following content was automatically summarized to fit within the model's context window.]";

/// Token limits for a model
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelProfile {
    pub identifier: String,
    /// Maximum input tokens the model accepts
    pub context_window: usize,
    /// Maximum tokens the model may generate
    pub max_output_tokens: usize,
}

impl ModelProfile {
    pub fn new(identifier: impl Into<String>, context_window: usize, max_output_tokens: usize) -> Self {
        Self {
            identifier: identifier.into(),
            context_window,
            max_output_tokens,
        }
    }

    /// Tokens available for input once room for generation is reserved
    pub fn input_budget(&self) -> usize {
        self.context_window.saturating_sub(self.max_output_tokens)
    }
}

/// Speaker of a conversation turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single message produced by either party
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub role: Role,
    pub content: String,
}

impl ConversationTurn {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    /// Line form used for token accounting
    pub fn render(&self) -> String {
        format!("{}: {}", self.role, self.content)
    }
}

/// Ordered conversation history, trimmed only from the oldest end
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConversationHistory {
    turns: Vec<ConversationTurn>,
}

impl ConversationHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, turn: ConversationTurn) {
        self.turns.push(turn);
    }

    pub fn push_user(&mut self, content: impl Into<String>) {
        self.push(ConversationTurn::user(content));
    }

    pub fn push_assistant(&mut self, content: impl Into<String>) {
        self.push(ConversationTurn::assistant(content));
    }

    pub fn turns(&self) -> &[ConversationTurn] {
        &self.turns
    }

    pub fn iter(&self) -> impl Iterator<Item = &ConversationTurn> {
        self.turns.iter()
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    /// Drop the `count` oldest turns
    pub(crate) fn evict_oldest(&mut self, count: usize) {
        let count = count.min(self.turns.len());
        self.turns.drain(..count);
    }
}

impl From<Vec<ConversationTurn>> for ConversationHistory {
    fn from(turns: Vec<ConversationTurn>) -> Self {
        Self { turns }
    }
}

/// A bounded slice of a larger text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextChunk {
    pub sequence_index: usize,
    pub text: String,
    pub approx_token_count: usize,
    /// Byte offset of the chunk within the source text
    pub offset: usize,
}

/// Output of the recursive summarizer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SummaryResult {
    pub text: String,
    pub was_summarized: bool,
}

impl SummaryResult {
    /// Text ready for use, carrying the disclosure note when it was summarized
    pub fn disclosed(&self) -> String {
        if self.was_summarized {
            format!("{}\n\n{}", SUMMARY_DISCLOSURE, self.text)
        } else {
            self.text.clone()
        }
    }
}
