//! Request orchestration
//!
//! Fits the history to the model, runs the agent under a deadline and turns
//! context-length rejections into a fixed apology.

use crate::agent::{AgentLoop, AgentRequest, PromptTemplate};
use crate::context::models::ConversationHistory;
use crate::context::window::ContextWindowEnforcer;
use crate::error::{AssistantError, Result};
use crate::metrics::METRICS;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn, Instrument};
use uuid::Uuid;

/// Returned when the provider rejects a request for its length
pub const CONTEXT_APOLOGY: &str = "I'm sorry, but this conversation has become too long for the selected model \
to process. Please start a new conversation or shorten your request.";

/// Placed in front of the user query when older turns were dropped
pub const TRUNCATION_NOTE: &str = "[Note: earlier parts of this conversation were omitted to fit the model's context window.]";

/// Produces the assistant's reply to a user query
pub struct ResponseOrchestrator {
    enforcer: ContextWindowEnforcer,
    agent: Arc<dyn AgentLoop>,
    request_timeout: Option<Duration>,
}

impl ResponseOrchestrator {
    pub fn new(
        enforcer: ContextWindowEnforcer,
        agent: Arc<dyn AgentLoop>,
        request_timeout: Option<Duration>,
    ) -> Self {
        Self {
            enforcer,
            agent,
            request_timeout,
        }
    }

    /// Generate a reply to `user_query` with `model`
    pub async fn generate(
        &self,
        user_query: &str,
        template: &PromptTemplate,
        history: &ConversationHistory,
        model: &str,
        cancel: &CancellationToken,
    ) -> Result<String> {
        let request_id = Uuid::new_v4();
        let span = tracing::info_span!("generate", %request_id, model);

        self.generate_inner(user_query, template, history, model, cancel)
            .instrument(span)
            .await
    }

    async fn generate_inner(
        &self,
        user_query: &str,
        template: &PromptTemplate,
        history: &ConversationHistory,
        model: &str,
        cancel: &CancellationToken,
    ) -> Result<String> {
        let mut enforced = self.enforcer.enforce(history, user_query, model).await?;

        let input = if enforced.truncated {
            // The note is part of the request, so the kept turns must leave room for it
            let noted = format!("{}\n\n{}", TRUNCATION_NOTE, user_query);
            let refit = self.enforcer.enforce(&enforced.history, &noted, model).await?;
            enforced.evicted += refit.evicted;
            enforced.history = refit.history;
            enforced.tokens = refit.tokens;

            info!("History truncated, {} turns evicted", enforced.evicted);
            noted
        } else {
            user_query.to_string()
        };

        let child = cancel.child_token();
        let request = AgentRequest {
            model,
            template,
            history: &enforced.history,
            input: &input,
        };

        let result = match self.request_timeout {
            Some(limit) => match tokio::time::timeout(limit, self.agent.run(request, &child)).await {
                Ok(result) => result,
                Err(_) => {
                    child.cancel();
                    warn!("Request timed out after {:?}", limit);
                    Err(AssistantError::Timeout(limit))
                }
            },
            None => self.agent.run(request, &child).await,
        };

        match result {
            Err(e) if e.is_context_length_exceeded() => {
                warn!("Context length exceeded: {}", e);
                METRICS.context_length_apologies.inc();
                Ok(CONTEXT_APOLOGY.to_string())
            }
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::registry::get_profile;
    use crate::context::token_counter::ModelTokenCounter;
    use crate::context::token_estimator::WordBasedEstimator;
    use async_trait::async_trait;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingAgent {
        seen: Mutex<Vec<(usize, String)>>,
    }

    #[async_trait]
    impl AgentLoop for RecordingAgent {
        async fn run(&self, request: AgentRequest<'_>, _cancel: &CancellationToken) -> Result<String> {
            self.seen
                .lock()
                .unwrap()
                .push((request.history.len(), request.input.to_string()));
            Ok(format!("reply to {}", request.input))
        }
    }

    struct FailingAgent {
        error: fn() -> AssistantError,
    }

    #[async_trait]
    impl AgentLoop for FailingAgent {
        async fn run(&self, _request: AgentRequest<'_>, _cancel: &CancellationToken) -> Result<String> {
            Err((self.error)())
        }
    }

    struct SlowAgent;

    #[async_trait]
    impl AgentLoop for SlowAgent {
        async fn run(&self, _request: AgentRequest<'_>, cancel: &CancellationToken) -> Result<String> {
            cancel.cancelled().await;
            Err(AssistantError::Cancelled)
        }
    }

    fn enforcer() -> ContextWindowEnforcer {
        ContextWindowEnforcer::new(Arc::new(ModelTokenCounter::uniform(Arc::new(
            WordBasedEstimator::new(1.0),
        ))))
    }

    #[tokio::test]
    async fn test_small_history_passes_through() {
        let agent = Arc::new(RecordingAgent::default());
        let orchestrator = ResponseOrchestrator::new(enforcer(), agent.clone(), None);
        let mut history = ConversationHistory::new();
        history.push_user("hi");
        history.push_assistant("hello");

        let reply = orchestrator
            .generate(
                "how are you",
                &PromptTemplate::default(),
                &history,
                "gpt-4o",
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        assert_eq!(reply, "reply to how are you");
        assert_eq!(agent.seen.lock().unwrap()[0], (2, "how are you".to_string()));
    }

    #[tokio::test]
    async fn test_truncation_note_prepended() {
        let agent = Arc::new(RecordingAgent::default());
        let orchestrator = ResponseOrchestrator::new(enforcer(), agent.clone(), None);
        let mut history = ConversationHistory::new();
        for _ in 0..3 {
            history.push_user("word ".repeat(50_000));
        }

        orchestrator
            .generate(
                "next",
                &PromptTemplate::default(),
                &history,
                "gpt-4o",
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        let seen = agent.seen.lock().unwrap();
        assert_eq!(seen[0].0, 2);
        assert!(seen[0].1.starts_with(TRUNCATION_NOTE));
        assert!(seen[0].1.ends_with("next"));
    }

    #[tokio::test]
    async fn test_truncation_note_counts_against_budget() {
        let agent = Arc::new(RecordingAgent::default());
        let orchestrator = ResponseOrchestrator::new(enforcer(), agent.clone(), None);
        let budget = get_profile("gpt-4o").input_budget();

        // Dropping the first turn fits the bare query but leaves no room for the note
        let note_words = TRUNCATION_NOTE.split_whitespace().count();
        let mut history = ConversationHistory::new();
        history.push_user("word ".repeat(50_000));
        history.push_user("word ".repeat(50_000));
        history.push_user("word ".repeat(budget - 50_001 - 2 - 1 - note_words / 2));

        orchestrator
            .generate(
                "next",
                &PromptTemplate::default(),
                &history,
                "gpt-4o",
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        let seen = agent.seen.lock().unwrap();
        assert_eq!(seen[0].0, 1);
        assert!(seen[0].1.starts_with(TRUNCATION_NOTE));
    }

    #[tokio::test]
    async fn test_context_length_error_becomes_apology() {
        let agent = Arc::new(FailingAgent {
            error: || AssistantError::Provider {
                status: Some(400),
                message: "This model's maximum context length is 128000 tokens".to_string(),
            },
        });
        let orchestrator = ResponseOrchestrator::new(enforcer(), agent, None);

        let reply = orchestrator
            .generate(
                "q",
                &PromptTemplate::default(),
                &ConversationHistory::new(),
                "gpt-4o",
                &CancellationToken::new(),
            )
            .await
            .unwrap();
        assert_eq!(reply, CONTEXT_APOLOGY);
    }

    #[tokio::test]
    async fn test_other_errors_propagate() {
        let agent = Arc::new(FailingAgent {
            error: || AssistantError::RateLimited("slow down".to_string()),
        });
        let orchestrator = ResponseOrchestrator::new(enforcer(), agent, None);

        let result = orchestrator
            .generate(
                "q",
                &PromptTemplate::default(),
                &ConversationHistory::new(),
                "gpt-4o",
                &CancellationToken::new(),
            )
            .await;
        assert!(matches!(result, Err(AssistantError::RateLimited(_))));
    }

    #[tokio::test]
    async fn test_deadline_cancels_agent() {
        let orchestrator = ResponseOrchestrator::new(
            enforcer(),
            Arc::new(SlowAgent),
            Some(Duration::from_millis(20)),
        );

        let result = orchestrator
            .generate(
                "q",
                &PromptTemplate::default(),
                &ConversationHistory::new(),
                "gpt-4o",
                &CancellationToken::new(),
            )
            .await;
        assert!(matches!(result, Err(AssistantError::Timeout(_))));
    }
}
