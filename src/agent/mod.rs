//! Tool-calling agent loop
//!
//! The model decides which tools to call; the loop executes them, feeds the
//! results back and stops at the first answer without tool calls.

pub mod prompt;

pub use prompt::PromptTemplate;

use crate::config::AgentConfig;
use crate::context::models::ConversationHistory;
use crate::context::registry::get_profile;
use crate::context::summarizer::RecursiveSummarizer;
use crate::error::{AssistantError, Result};
use crate::metrics::METRICS;
use crate::provider::{ChatMessage, CompletionProvider, CompletionRequest, ToolCall};
use crate::tools::ToolRegistry;
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Input of one agent run
#[derive(Debug, Clone, Copy)]
pub struct AgentRequest<'a> {
    pub model: &'a str,
    pub template: &'a PromptTemplate,
    pub history: &'a ConversationHistory,
    pub input: &'a str,
}

/// Produces a final answer for a request
#[async_trait]
pub trait AgentLoop: Send + Sync {
    async fn run(&self, request: AgentRequest<'_>, cancel: &CancellationToken) -> Result<String>;
}

/// Agent that lets the model call registered tools
pub struct ToolCallingAgent {
    provider: Arc<dyn CompletionProvider>,
    tools: Arc<ToolRegistry>,
    summarizer: Arc<RecursiveSummarizer>,
    config: AgentConfig,
}

impl ToolCallingAgent {
    pub fn new(
        provider: Arc<dyn CompletionProvider>,
        tools: Arc<ToolRegistry>,
        summarizer: Arc<RecursiveSummarizer>,
        config: AgentConfig,
    ) -> Self {
        Self {
            provider,
            tools,
            summarizer,
            config,
        }
    }

    /// Run one tool call; failures become text for the model
    async fn execute(
        &self,
        call: &ToolCall,
        model: &str,
        limit: usize,
        cancel: &CancellationToken,
    ) -> Result<String> {
        let Some(tool) = self.tools.get(&call.name) else {
            warn!("Model requested unknown tool '{}'", call.name);
            return Ok(format!("Error: unknown tool '{}'", call.name));
        };

        let arguments = if call.arguments.trim().is_empty() {
            Value::Object(Default::default())
        } else {
            match serde_json::from_str::<Value>(&call.arguments) {
                Ok(value) => value,
                Err(e) => {
                    METRICS.record_tool_invocation(tool.name(), false);
                    return Ok(format!("Error: invalid arguments for '{}': {}", call.name, e));
                }
            }
        };

        debug!("Invoking tool '{}'", call.name);
        let outcome = tokio::select! {
            _ = cancel.cancelled() => return Err(AssistantError::Cancelled),
            outcome = tool.invoke(arguments) => outcome,
        };

        let output = match outcome {
            Ok(output) => {
                METRICS.record_tool_invocation(tool.name(), true);
                output
            }
            Err(e) => {
                METRICS.record_tool_invocation(tool.name(), false);
                warn!("Tool '{}' failed: {}", call.name, e);
                return Ok(format!("Error: {}", e));
            }
        };

        self.fit_tool_output(output, model, limit, cancel).await
    }

    /// Tokens one tool output may use: an even split of what the messages so
    /// far leave of the input budget, capped at `tool_output_share` of it
    async fn tool_output_limit(
        &self,
        messages: &[ChatMessage],
        model: &str,
        pending_calls: usize,
    ) -> Result<usize> {
        let budget = get_profile(model).input_budget();
        let used = self
            .summarizer
            .token_counter()
            .count_tokens(&render_messages(messages), model)
            .await?;
        let cap = (budget as f64 * self.config.tool_output_share as f64) as usize;
        let remaining = budget.saturating_sub(used) / pending_calls.max(1);

        debug!(
            "Tool output limit {} tokens ({} of {} used, {} calls pending)",
            cap.min(remaining),
            used,
            budget,
            pending_calls
        );
        Ok(cap.min(remaining))
    }

    /// Reduce a tool output to `limit` tokens
    async fn fit_tool_output(
        &self,
        output: String,
        model: &str,
        limit: usize,
        cancel: &CancellationToken,
    ) -> Result<String> {
        if limit == 0 {
            warn!("No room left in the input budget for tool output");
            return Ok("Error: no room left in the context window for this tool output".to_string());
        }

        match self
            .summarizer
            .summarize_to_limit(&output, limit, model, self.summarizer.default_model(), cancel)
            .await
        {
            Ok(summary) => Ok(summary.disclosed()),
            Err(AssistantError::Cancelled) => Err(AssistantError::Cancelled),
            Err(e) => {
                warn!("Could not reduce tool output to {} tokens: {}", limit, e);
                Ok(format!("Error: the tool output was too large to use: {}", e))
            }
        }
    }
}

#[async_trait]
impl AgentLoop for ToolCallingAgent {
    async fn run(&self, request: AgentRequest<'_>, cancel: &CancellationToken) -> Result<String> {
        let profile = get_profile(request.model);
        let specs = self.tools.specs();
        let mut messages = request.template.render(request.history, request.input);

        for iteration in 1..=self.config.max_iterations {
            if cancel.is_cancelled() {
                return Err(AssistantError::Cancelled);
            }

            let completion_request = CompletionRequest {
                model: request.model.to_string(),
                messages: messages.clone(),
                max_output_tokens: profile.max_output_tokens,
                temperature: self.config.temperature,
                tools: specs.clone(),
            };

            let completion = tokio::select! {
                _ = cancel.cancelled() => return Err(AssistantError::Cancelled),
                completion = self.provider.complete(completion_request) => completion?,
            };

            if completion.tool_calls.is_empty() {
                return match completion.content {
                    Some(content) if !content.trim().is_empty() => {
                        info!("Agent answered after {} iterations", iteration);
                        Ok(content)
                    }
                    _ => Err(AssistantError::Agent(
                        "Model returned neither content nor tool calls".to_string(),
                    )),
                };
            }

            debug!(
                "Iteration {}: {} tool calls",
                iteration,
                completion.tool_calls.len()
            );
            messages.push(ChatMessage::assistant_tool_calls(
                completion.content,
                completion.tool_calls.clone(),
            ));

            let calls = completion.tool_calls.len();
            for (position, call) in completion.tool_calls.iter().enumerate() {
                let limit = self
                    .tool_output_limit(&messages, request.model, calls - position)
                    .await?;
                let output = self.execute(call, request.model, limit, cancel).await?;
                messages.push(ChatMessage::tool_result(call.id.clone(), output));
            }
        }

        Err(AssistantError::Agent(format!(
            "No final answer after {} iterations",
            self.config.max_iterations
        )))
    }
}

/// Flatten messages into the text counted against the input budget
fn render_messages(messages: &[ChatMessage]) -> String {
    let mut out = String::new();
    for message in messages {
        if let Some(content) = &message.content {
            out.push_str(content);
            out.push('\n');
        }
        for call in &message.tool_calls {
            out.push_str(&call.name);
            out.push(' ');
            out.push_str(&call.arguments);
            out.push('\n');
        }
    }
    out
}
