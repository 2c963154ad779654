//! Context window management
//!
//! Token accounting across tokenizer schemes, model limits, chunking,
//! recursive summarization and history eviction.

pub mod models;
pub mod registry;
pub mod splitter;
pub mod summarizer;
pub mod token_counter;
pub mod token_estimator;
pub mod window;

pub use models::{
    ConversationHistory, ConversationTurn, ModelProfile, Role, SummaryResult, TextChunk,
    SUMMARY_DISCLOSURE,
};
pub use registry::get_profile;
pub use splitter::{reassemble, ChunkSplitter, DEFAULT_CHUNK_OVERLAP};
pub use summarizer::RecursiveSummarizer;
pub use token_counter::{ModelTokenCounter, RemoteTokenCounter, TokenCounter, TokenizerFamily};
pub use token_estimator::{BpeScheme, TiktokenEstimator, TokenEstimator, WordBasedEstimator};
pub use window::{ContextWindowEnforcer, EnforcedHistory};
