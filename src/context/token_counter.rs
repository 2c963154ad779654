//! Model-aware token counting
//!
//! Picks a tokenization scheme per model family. OpenAI families are counted
//! locally with tiktoken; Claude models are counted by the provider when a
//! remote counter is configured. Anything unrecognized falls back to the
//! default byte-pair scheme.

use super::token_estimator::{BpeScheme, TiktokenEstimator, TokenEstimator};
use crate::error::Result;
use crate::metrics::METRICS;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, warn};

/// Tokenization scheme family for a model
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenizerFamily {
    Cl100k,
    O200k,
    /// Counted by the provider over the network
    Anthropic,
}

impl TokenizerFamily {
    pub fn for_model(model: &str) -> Self {
        let model = model.to_ascii_lowercase();
        if model.starts_with("claude") {
            Self::Anthropic
        } else if model.starts_with("gpt-4o")
            || model.starts_with("gpt-4.1")
            || model.starts_with("o1")
            || model.starts_with("o3")
            || model.starts_with("o4")
        {
            Self::O200k
        } else {
            Self::Cl100k
        }
    }
}

/// Provider-side token counting
#[async_trait]
pub trait RemoteTokenCounter: Send + Sync {
    async fn count(&self, text: &str, model: &str) -> Result<usize>;
}

/// Token counting adapter used by the splitter, summarizer and enforcer
#[async_trait]
pub trait TokenCounter: Send + Sync {
    /// Count tokens of `text` under the scheme of `model`
    async fn count_tokens(&self, text: &str, model: &str) -> Result<usize>;

    /// Synchronous local estimator for `model`, used where per-piece network
    /// round trips are not acceptable
    fn estimator_for(&self, model: &str) -> Arc<dyn TokenEstimator>;
}

/// Default token counter
pub struct ModelTokenCounter {
    cl100k: Arc<dyn TokenEstimator>,
    o200k: Arc<dyn TokenEstimator>,
    remote: Option<Arc<dyn RemoteTokenCounter>>,
}

impl ModelTokenCounter {
    /// Create a counter with local tiktoken encodings only
    pub fn new() -> Result<Self> {
        Ok(Self {
            cl100k: Arc::new(TiktokenEstimator::new(BpeScheme::Cl100k)?),
            o200k: Arc::new(TiktokenEstimator::new(BpeScheme::O200k)?),
            remote: None,
        })
    }

    /// Use one estimator for every model family
    pub fn uniform(estimator: Arc<dyn TokenEstimator>) -> Self {
        Self {
            cl100k: estimator.clone(),
            o200k: estimator,
            remote: None,
        }
    }

    /// Count Claude models through the provider
    pub fn with_remote(mut self, remote: Arc<dyn RemoteTokenCounter>) -> Self {
        self.remote = Some(remote);
        self
    }
}

#[async_trait]
impl TokenCounter for ModelTokenCounter {
    async fn count_tokens(&self, text: &str, model: &str) -> Result<usize> {
        match (TokenizerFamily::for_model(model), &self.remote) {
            (TokenizerFamily::Anthropic, Some(remote)) => match remote.count(text, model).await {
                Ok(count) => {
                    METRICS.record_remote_token_count(true);
                    Ok(count)
                }
                Err(e) => {
                    METRICS.record_remote_token_count(false);
                    warn!("Remote token count failed for {}: {}", model, e);
                    Err(e)
                }
            },
            (TokenizerFamily::Anthropic, None) => {
                debug!("No remote token counter configured for {}, using default encoding", model);
                Ok(self.cl100k.estimate(text))
            }
            _ => Ok(self.estimator_for(model).estimate(text)),
        }
    }

    fn estimator_for(&self, model: &str) -> Arc<dyn TokenEstimator> {
        match TokenizerFamily::for_model(model) {
            TokenizerFamily::O200k => self.o200k.clone(),
            TokenizerFamily::Cl100k | TokenizerFamily::Anthropic => self.cl100k.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::token_estimator::WordBasedEstimator;
    use crate::error::AssistantError;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FixedRemote {
        calls: AtomicUsize,
        fail: bool,
    }

    #[async_trait]
    impl RemoteTokenCounter for FixedRemote {
        async fn count(&self, _text: &str, _model: &str) -> Result<usize> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                Err(AssistantError::Transport("connection refused".to_string()))
            } else {
                Ok(42)
            }
        }
    }

    #[test]
    fn test_family_selection() {
        assert_eq!(TokenizerFamily::for_model("gpt-4o-mini"), TokenizerFamily::O200k);
        assert_eq!(TokenizerFamily::for_model("o3-mini"), TokenizerFamily::O200k);
        assert_eq!(TokenizerFamily::for_model("gpt-4-turbo"), TokenizerFamily::Cl100k);
        assert_eq!(
            TokenizerFamily::for_model("claude-3-5-sonnet-latest"),
            TokenizerFamily::Anthropic
        );
        assert_eq!(TokenizerFamily::for_model("foo-9000"), TokenizerFamily::Cl100k);
    }

    #[tokio::test]
    async fn test_unknown_model_counts_with_default_encoding() {
        let counter = ModelTokenCounter::new().unwrap();
        let text = "The quick brown fox jumps over the lazy dog.";
        let unknown = counter.count_tokens(text, "foo-9000").await.unwrap();
        let gpt4 = counter.count_tokens(text, "gpt-4").await.unwrap();
        assert!(unknown > 0);
        assert_eq!(unknown, gpt4);
    }

    #[tokio::test]
    async fn test_claude_uses_remote_counter() {
        let remote = Arc::new(FixedRemote {
            calls: AtomicUsize::new(0),
            fail: false,
        });
        let counter = ModelTokenCounter::uniform(Arc::new(WordBasedEstimator::new(1.0)))
            .with_remote(remote.clone());

        let count = counter
            .count_tokens("a b c", "claude-3-5-sonnet-latest")
            .await
            .unwrap();
        assert_eq!(count, 42);
        assert_eq!(remote.calls.load(Ordering::SeqCst), 1);

        // OpenAI families never leave the process
        let local = counter.count_tokens("a b c", "gpt-4o").await.unwrap();
        assert_eq!(local, 3);
        assert_eq!(remote.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_remote_failure_propagates() {
        let remote = Arc::new(FixedRemote {
            calls: AtomicUsize::new(0),
            fail: true,
        });
        let counter = ModelTokenCounter::uniform(Arc::new(WordBasedEstimator::new(1.0)))
            .with_remote(remote);

        let result = counter.count_tokens("a b c", "claude-3-5-haiku-latest").await;
        assert!(matches!(result, Err(AssistantError::Transport(_))));
    }

    #[tokio::test]
    async fn test_claude_without_remote_falls_back() {
        let counter = ModelTokenCounter::uniform(Arc::new(WordBasedEstimator::new(1.0)));
        let count = counter
            .count_tokens("one two", "claude-3-5-haiku-latest")
            .await
            .unwrap();
        assert_eq!(count, 2);
    }
}
