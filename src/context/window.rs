//! Conversation history enforcement
//!
//! Keeps the history sent with a request inside the model's input budget
//! (context window minus reserved output). Turns are evicted whole, oldest
//! first; the new message is never evicted.

use super::models::{ConversationHistory, ConversationTurn, Role};
use super::registry::get_profile;
use super::token_counter::TokenCounter;
use crate::error::Result;
use crate::metrics::METRICS;
use std::sync::Arc;
use tracing::{debug, info};

/// History after enforcement
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnforcedHistory {
    pub history: ConversationHistory,
    /// Whether any turn was evicted
    pub truncated: bool,
    /// Number of evicted turns
    pub evicted: usize,
    /// Tokens of the kept history plus the new message
    pub tokens: usize,
}

/// Evicts the oldest turns until the history fits
pub struct ContextWindowEnforcer {
    counter: Arc<dyn TokenCounter>,
}

impl ContextWindowEnforcer {
    pub fn new(counter: Arc<dyn TokenCounter>) -> Self {
        Self { counter }
    }

    /// Enforce the input budget of `model`
    pub async fn enforce(
        &self,
        history: &ConversationHistory,
        new_message: &str,
        model: &str,
    ) -> Result<EnforcedHistory> {
        let budget = get_profile(model).input_budget();
        self.enforce_with_budget(history, new_message, model, budget)
            .await
    }

    /// Enforce an explicit token budget, counting with the scheme of `model`
    pub async fn enforce_with_budget(
        &self,
        history: &ConversationHistory,
        new_message: &str,
        model: &str,
        budget: usize,
    ) -> Result<EnforcedHistory> {
        let message_tokens = self
            .counter
            .count_tokens(
                &ConversationTurn::new(Role::User, new_message).render(),
                model,
            )
            .await?;

        let mut costs = Vec::with_capacity(history.len());
        for turn in history.iter() {
            costs.push(self.counter.count_tokens(&turn.render(), model).await?);
        }

        let mut total = message_tokens + costs.iter().sum::<usize>();
        let mut evicted = 0usize;
        while total > budget && evicted < costs.len() {
            total -= costs[evicted];
            evicted += 1;
        }

        let mut kept = history.clone();
        kept.evict_oldest(evicted);

        if evicted > 0 {
            info!(
                "Evicted {} of {} turns to fit {} tokens for {} ({} remaining)",
                evicted,
                history.len(),
                budget,
                model,
                total
            );
        } else {
            debug!("History of {} turns fits: {}/{} tokens", history.len(), total, budget);
        }
        METRICS.record_history_enforcement(evicted);

        Ok(EnforcedHistory {
            history: kept,
            truncated: evicted > 0,
            evicted,
            tokens: total,
        })
    }
}
