//! Recursive summarization for text that exceeds a model's context window
//!
//! Summarization runs as an explicit state machine:
//!
//! ```text
//! CheckFit -> SinglePass  -> CheckFit
//!          -> ChunkedPass -> Reduce -> CheckFit
//! ```
//!
//! Every pass increments the round counter. Text that still does not fit after
//! `max_rounds` passes fails with [`AssistantError::ContextOverflow`].

use super::models::{SummaryResult, SUMMARY_DISCLOSURE};
use super::registry::get_profile;
use super::splitter::ChunkSplitter;
use super::token_counter::TokenCounter;
use crate::config::SummarizerConfig;
use crate::error::{AssistantError, Result};
use crate::metrics::METRICS;
use crate::provider::{ChatMessage, CompletionProvider};
use futures::stream::{self, StreamExt, TryStreamExt};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Separator placed between chunk summaries
pub const SECTION_BREAK: &str = "\n\n=== Section Break ===\n\n";

/// Framing placed in front of combined chunk summaries that need another round
pub const META_SUMMARY_FRAMING: &str = "This is a meta-summary combining multiple detailed section summaries. \
Each section represents a distinct part of the original content.\n\n";

const SUMMARY_INSTRUCTION: &str = "Write a detailed summary of the text below. Keep as much specific \
information as the length allows.

Guidelines:
1. Keep events and topics in their original order
2. Preserve names, dates, numbers and statistics
3. Preserve technical terms together with their explanations
4. Preserve key arguments, their evidence and cause-and-effect relationships
5. Keep methods, processes, examples and important quotes
6. Organize the summary into clear sections, using lists for dense material
7. Mention caveats and limitations stated in the text
8. Prefer specific facts over general statements

Text to summarize:
";

/// Summarization state
#[derive(Debug)]
enum Stage {
    CheckFit { text: String },
    SinglePass { text: String },
    ChunkedPass { text: String },
    Reduce { combined: String },
}

/// Summarizes text until it fits a token limit
pub struct RecursiveSummarizer {
    provider: Arc<dyn CompletionProvider>,
    counter: Arc<dyn TokenCounter>,
    config: SummarizerConfig,
}

impl RecursiveSummarizer {
    pub fn new(
        provider: Arc<dyn CompletionProvider>,
        counter: Arc<dyn TokenCounter>,
        config: SummarizerConfig,
    ) -> Self {
        Self {
            provider,
            counter,
            config,
        }
    }

    /// Counter used for fit checks
    pub fn token_counter(&self) -> &Arc<dyn TokenCounter> {
        &self.counter
    }

    /// Model used for summarization unless the caller picks another
    pub fn default_model(&self) -> &str {
        &self.config.model
    }

    /// Fit `text` into the context window of `target_model`
    pub async fn summarize(
        &self,
        text: &str,
        target_model: &str,
        summarizer_model: &str,
        cancel: &CancellationToken,
    ) -> Result<SummaryResult> {
        let limit = get_profile(target_model).context_window;
        self.summarize_to_limit(text, limit, target_model, summarizer_model, cancel)
            .await
    }

    /// Fit `text` into `limit` tokens as counted for `target_model`.
    ///
    /// Text that already fits is returned untouched. Summarized text leaves
    /// room for the disclosure note, so [`SummaryResult::disclosed`] fits too.
    pub async fn summarize_to_limit(
        &self,
        text: &str,
        limit: usize,
        target_model: &str,
        summarizer_model: &str,
        cancel: &CancellationToken,
    ) -> Result<SummaryResult> {
        let note_tokens = self
            .counter
            .count_tokens(&format!("{}\n\n", SUMMARY_DISCLOSURE), target_model)
            .await?;

        let mut round = 0usize;
        let mut stage = Stage::CheckFit {
            text: text.to_string(),
        };

        loop {
            if cancel.is_cancelled() {
                return Err(AssistantError::Cancelled);
            }

            stage = match stage {
                Stage::CheckFit { text } => {
                    let limit_now = if round == 0 {
                        limit
                    } else {
                        limit.saturating_sub(note_tokens)
                    };
                    let tokens = self.counter.count_tokens(&text, target_model).await?;

                    if tokens <= limit_now {
                        if round > 0 {
                            info!(
                                "Summarized to {} tokens (limit {}) in {} rounds",
                                tokens, limit_now, round
                            );
                        }
                        METRICS.record_summary_rounds(round, false);
                        return Ok(SummaryResult {
                            text,
                            was_summarized: round > 0,
                        });
                    }

                    if round >= self.config.max_rounds {
                        warn!(
                            "Text still {} tokens over a limit of {} after {} rounds",
                            tokens, limit_now, round
                        );
                        METRICS.record_summary_rounds(round, true);
                        return Err(AssistantError::ContextOverflow {
                            tokens,
                            limit: limit_now,
                            rounds: round,
                        });
                    }

                    debug!(
                        "Round {}: {} tokens exceed limit {} for {}",
                        round + 1,
                        tokens,
                        limit_now,
                        target_model
                    );

                    if self.fits_single_pass(&text, summarizer_model).await? {
                        Stage::SinglePass { text }
                    } else {
                        Stage::ChunkedPass { text }
                    }
                }

                Stage::SinglePass { text } => {
                    round += 1;
                    METRICS.record_summarization("single", 1);
                    let summary = self
                        .summarize_once(instruction(&text), summarizer_model, cancel)
                        .await?;
                    Stage::CheckFit { text: summary }
                }

                Stage::ChunkedPass { text } => {
                    round += 1;
                    let combined = self.summarize_chunks(&text, summarizer_model, cancel).await?;
                    Stage::Reduce { combined }
                }

                Stage::Reduce { combined } => {
                    let tokens = self.counter.count_tokens(&combined, target_model).await?;
                    if tokens <= limit.saturating_sub(note_tokens) {
                        Stage::CheckFit { text: combined }
                    } else {
                        Stage::CheckFit {
                            text: format!("{}{}", META_SUMMARY_FRAMING, combined),
                        }
                    }
                }
            };
        }
    }

    /// Whether the whole text plus instruction fits one summarizer call
    async fn fits_single_pass(&self, text: &str, summarizer_model: &str) -> Result<bool> {
        let budget = get_profile(summarizer_model).input_budget();
        let tokens = self
            .counter
            .count_tokens(&instruction(text), summarizer_model)
            .await?;
        Ok(tokens <= budget)
    }

    /// Summarize each chunk concurrently and join the results in chunk order
    async fn summarize_chunks(
        &self,
        text: &str,
        summarizer_model: &str,
        cancel: &CancellationToken,
    ) -> Result<String> {
        let overhead = self
            .counter
            .count_tokens(&instruction(&part_prompt(999, 999, "")), summarizer_model)
            .await?;
        let chunk_size = get_profile(summarizer_model)
            .input_budget()
            .saturating_sub(overhead);

        let splitter = ChunkSplitter::new(
            self.counter.estimator_for(summarizer_model),
            chunk_size,
            self.config.chunk_overlap_tokens,
        );
        let chunks = splitter.split(text);
        let total = chunks.len();

        info!(
            "Summarizing {} chunks of up to {} tokens with {}",
            total, chunk_size, summarizer_model
        );
        METRICS.record_summarization("chunked", total);

        let summaries: Vec<String> = stream::iter(chunks.into_iter().map(|chunk| {
            let prompt = instruction(&part_prompt(chunk.sequence_index + 1, total, &chunk.text));
            async move {
                let summary = self.summarize_once(prompt, summarizer_model, cancel).await?;
                debug!("Chunk {}/{} summarized", chunk.sequence_index + 1, total);
                Ok::<_, AssistantError>(summary)
            }
        }))
        .buffered(self.config.max_concurrent_chunks.max(1))
        .try_collect()
        .await?;

        Ok(summaries.join(SECTION_BREAK))
    }

    async fn summarize_once(
        &self,
        prompt: String,
        summarizer_model: &str,
        cancel: &CancellationToken,
    ) -> Result<String> {
        let max_output = get_profile(summarizer_model).max_output_tokens;
        let request = self.provider.complete_text(
            vec![ChatMessage::user(prompt)],
            summarizer_model,
            max_output,
            self.config.temperature,
        );

        tokio::select! {
            _ = cancel.cancelled() => Err(AssistantError::Cancelled),
            result = request => result,
        }
    }
}

fn instruction(text: &str) -> String {
    format!("{}{}", SUMMARY_INSTRUCTION, text)
}

fn part_prompt(index: usize, total: usize, chunk: &str) -> String {
    format!("Part {} of {}:\n\n{}", index, total, chunk)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::token_counter::ModelTokenCounter;
    use crate::context::token_estimator::WordBasedEstimator;
    use crate::provider::{Completion, CompletionRequest};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn counter() -> Arc<dyn TokenCounter> {
        Arc::new(ModelTokenCounter::uniform(Arc::new(WordBasedEstimator::new(1.0))))
    }

    fn config() -> SummarizerConfig {
        SummarizerConfig::default()
    }

    fn prompt_body(request: &CompletionRequest) -> String {
        request.messages[0].content.clone().unwrap_or_default()
    }

    /// Replies with a fixed short summary
    struct ShortProvider {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl CompletionProvider for ShortProvider {
        async fn complete(&self, _request: CompletionRequest) -> Result<Completion> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(Completion {
                content: Some("a short summary".to_string()),
                tool_calls: Vec::new(),
            })
        }
    }

    /// Replies with the part label, finishing earlier parts last
    struct OutOfOrderProvider;

    #[async_trait]
    impl CompletionProvider for OutOfOrderProvider {
        async fn complete(&self, request: CompletionRequest) -> Result<Completion> {
            let body = prompt_body(&request);
            let label = body
                .lines()
                .find(|l| l.starts_with("Part "))
                .unwrap_or("single")
                .trim_end_matches(':')
                .to_string();
            let index: u64 = label
                .split_whitespace()
                .nth(1)
                .and_then(|n| n.parse().ok())
                .unwrap_or(0);
            tokio::time::sleep(Duration::from_millis(50u64.saturating_sub(index * 10))).await;
            Ok(Completion {
                content: Some(label),
                tool_calls: Vec::new(),
            })
        }
    }

    /// Echoes its whole prompt back, so nothing ever shrinks
    struct EchoProvider;

    #[async_trait]
    impl CompletionProvider for EchoProvider {
        async fn complete(&self, request: CompletionRequest) -> Result<Completion> {
            Ok(Completion {
                content: Some(prompt_body(&request)),
                tool_calls: Vec::new(),
            })
        }
    }

    struct FailingProvider;

    #[async_trait]
    impl CompletionProvider for FailingProvider {
        async fn complete(&self, _request: CompletionRequest) -> Result<Completion> {
            Err(AssistantError::RateLimited("slow down".to_string()))
        }
    }

    /// Returns a completion without content
    struct SilentProvider;

    #[async_trait]
    impl CompletionProvider for SilentProvider {
        async fn complete(&self, _request: CompletionRequest) -> Result<Completion> {
            Ok(Completion::default())
        }
    }

    struct PendingProvider;

    #[async_trait]
    impl CompletionProvider for PendingProvider {
        async fn complete(&self, _request: CompletionRequest) -> Result<Completion> {
            futures::future::pending::<()>().await;
            unreachable!()
        }
    }

    #[tokio::test]
    async fn test_fitting_text_returned_untouched() {
        let provider = Arc::new(ShortProvider {
            calls: AtomicUsize::new(0),
        });
        let summarizer = RecursiveSummarizer::new(provider.clone(), counter(), config());
        let cancel = CancellationToken::new();

        let result = summarizer
            .summarize("a few words here", "gpt-4o", "o3-mini", &cancel)
            .await
            .unwrap();

        assert_eq!(result.text, "a few words here");
        assert!(!result.was_summarized);
        assert_eq!(provider.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_single_pass_summary_fits() {
        let provider = Arc::new(ShortProvider {
            calls: AtomicUsize::new(0),
        });
        let summarizer = RecursiveSummarizer::new(provider.clone(), counter(), config());
        let cancel = CancellationToken::new();
        let text = "word ".repeat(500);

        let result = summarizer
            .summarize_to_limit(&text, 100, "gpt-4o", "o3-mini", &cancel)
            .await
            .unwrap();

        assert!(result.was_summarized);
        assert_eq!(result.text, "a short summary");
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
        assert!(result.disclosed().split_whitespace().count() <= 100);
    }

    #[tokio::test]
    async fn test_chunk_summaries_keep_document_order() {
        let summarizer = RecursiveSummarizer::new(Arc::new(OutOfOrderProvider), counter(), config());
        let cancel = CancellationToken::new();
        // gpt-4-turbo leaves 123904 input tokens, so this needs several chunks
        let text = "alpha beta gamma delta epsilon.\n\n".repeat(100_000);

        let result = summarizer
            .summarize_to_limit(&text, 10_000, "gpt-4o", "gpt-4-turbo", &cancel)
            .await
            .unwrap();

        assert!(result.was_summarized);
        let parts: Vec<&str> = result.text.split(SECTION_BREAK).collect();
        assert!(parts.len() > 1);
        for (i, part) in parts.iter().enumerate() {
            assert_eq!(*part, format!("Part {} of {}", i + 1, parts.len()));
        }
    }

    #[tokio::test]
    async fn test_non_shrinking_summaries_overflow() {
        let mut settings = config();
        settings.max_rounds = 3;
        let summarizer = RecursiveSummarizer::new(Arc::new(EchoProvider), counter(), settings);
        let cancel = CancellationToken::new();
        let text = "word ".repeat(300);

        let result = summarizer
            .summarize_to_limit(&text, 50, "gpt-4o", "o3-mini", &cancel)
            .await;

        match result {
            Err(AssistantError::ContextOverflow { rounds, limit, tokens }) => {
                assert_eq!(rounds, 3);
                assert!(tokens > limit);
            }
            other => panic!("expected overflow, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_generation_failure_propagates() {
        let summarizer = RecursiveSummarizer::new(Arc::new(FailingProvider), counter(), config());
        let cancel = CancellationToken::new();
        let text = "word ".repeat(300);

        let result = summarizer
            .summarize_to_limit(&text, 50, "gpt-4o", "o3-mini", &cancel)
            .await;
        assert!(matches!(result, Err(AssistantError::RateLimited(_))));
    }

    #[tokio::test]
    async fn test_empty_summary_is_error() {
        let summarizer = RecursiveSummarizer::new(Arc::new(SilentProvider), counter(), config());
        let cancel = CancellationToken::new();
        let text = "word ".repeat(300);

        let result = summarizer
            .summarize_to_limit(&text, 50, "gpt-4o", "o3-mini", &cancel)
            .await;
        assert!(matches!(result, Err(AssistantError::Provider { .. })));
    }

    #[tokio::test]
    async fn test_cancellation_aborts_in_flight_calls() {
        let summarizer = RecursiveSummarizer::new(Arc::new(PendingProvider), counter(), config());
        let cancel = CancellationToken::new();
        let text = "word ".repeat(300);

        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            trigger.cancel();
        });

        let result = tokio::time::timeout(
            Duration::from_secs(5),
            summarizer.summarize_to_limit(&text, 50, "gpt-4o", "o3-mini", &cancel),
        )
        .await
        .expect("cancellation should end summarization");
        assert!(matches!(result, Err(AssistantError::Cancelled)));
    }

    #[test]
    fn test_part_prompt_format() {
        assert_eq!(part_prompt(2, 5, "body"), "Part 2 of 5:\n\nbody");
        assert!(instruction("body").ends_with("body"));
    }
}
