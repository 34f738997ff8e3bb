//! Tool Coordinator for Multi-Turn Tool Calling
//!
//! `ToolCoordinator` drives the researcher's tool loop against any `LLMClient`
//! and any `ToolInvoker`:
//!
//! 1. Send the conversation with the available tools to the LLM
//! 2. If the model requests tool calls, execute them
//! 3. Append the results to the conversation in the model's call order
//! 4. Repeat until the model stops calling tools or a budget is reached
//!
//! Non-reflection calls of one turn run concurrently. Reflection calls run
//! after that batch has completed, one at a time.
//!
//! # Example
//!
//! ```rust,ignore
//! use deepsearch::llm::{ToolCallingConfig, ToolCoordinator};
//! use deepsearch::tools::ToolRegistry;
//! use deepsearch::types::ConversationMessage;
//! use std::sync::Arc;
//!
//! let coordinator = ToolCoordinator::new(
//!     client,
//!     Arc::new(ToolRegistry::with_default_tools()),
//!     ToolCallingConfig::default(),
//! );
//! let seed = vec![
//!     ConversationMessage::system("You are a researcher."),
//!     ConversationMessage::user("Rust async runtimes"),
//! ];
//! let result = coordinator.execute_conversation(seed).await?;
//! println!("{} tool calls over {} rounds", result.tool_calls.len(), result.rounds);
//! ```

use crate::llm::client::{LLMClient, TokenUsage};
use crate::tools::registry::ToolInvoker;
use crate::types::{CompletionError, ConversationMessage, ToolCall, ToolError};
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::timeout;

/// Budgets for one tool-calling session.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolCallingConfig {
    /// Maximum number of tool-execution rounds. Must be at least 1.
    pub max_tool_rounds: usize,

    /// Timeout for individual tool execution.
    pub tool_timeout: Duration,

    /// Cumulative failed tool calls after which the session stops.
    pub max_tool_errors: usize,
}

impl Default for ToolCallingConfig {
    fn default() -> Self {
        Self {
            max_tool_rounds: 5,
            tool_timeout: Duration::from_secs(30),
            max_tool_errors: 6,
        }
    }
}

/// Record of a single tool call execution.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolCallRecord {
    /// Identifier for this tool call (from the LLM).
    pub id: String,
    /// Name of the tool that was called.
    pub name: String,
    /// Arguments passed to the tool.
    pub arguments: serde_json::Value,
    /// Result returned by the tool (or error object).
    pub result: serde_json::Value,
    /// Whether the tool execution was successful.
    pub success: bool,
    /// Time taken to execute the tool in milliseconds.
    pub duration_ms: u64,
    /// Error message if the tool failed.
    pub error: Option<String>,
    /// Whether this was a reflection call.
    pub reflection: bool,
}

/// Reason why a tool coordination session ended.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum FinishReason {
    /// Model decided to stop (no more tool calls).
    Stop,
    /// Hit the tool round budget.
    MaxToolRounds,
    /// Hit the cumulative tool error budget.
    ToolErrorBudget,
}

impl std::fmt::Display for FinishReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FinishReason::Stop => write!(f, "stop"),
            FinishReason::MaxToolRounds => write!(f, "max_tool_rounds"),
            FinishReason::ToolErrorBudget => write!(f, "tool_error_budget"),
        }
    }
}

/// Result of a complete tool coordination session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoordinatorResult {
    /// Content of the last assistant turn.
    pub content: String,

    /// All tool calls made during the session, in execution-round then call order.
    pub tool_calls: Vec<ToolCallRecord>,

    /// Number of tool-execution rounds performed.
    pub rounds: usize,

    /// Why the session ended.
    pub finish_reason: FinishReason,

    /// Accumulated token usage across all LLM calls.
    pub total_usage: TokenUsage,

    /// Full message history, including the seed messages.
    pub message_history: Vec<ConversationMessage>,
}

impl CoordinatorResult {
    /// Number of tool calls that failed.
    pub fn failed_calls(&self) -> usize {
        self.tool_calls.iter().filter(|c| !c.success).count()
    }
}

/// Tool-calling loop over an `LLMClient` and a `ToolInvoker`.
pub struct ToolCoordinator {
    client: Arc<dyn LLMClient>,
    tools: Arc<dyn ToolInvoker>,
    config: ToolCallingConfig,
}

impl ToolCoordinator {
    pub fn new(
        client: Arc<dyn LLMClient>,
        tools: Arc<dyn ToolInvoker>,
        config: ToolCallingConfig,
    ) -> Self {
        Self {
            client,
            tools,
            config,
        }
    }

    /// Run the loop over an already seeded conversation.
    ///
    /// Tool failures are fed back to the model as `{"error": ...}` payloads and
    /// never abort the session. Only a failing completion call does.
    pub async fn execute_conversation(
        &self,
        mut messages: Vec<ConversationMessage>,
    ) -> Result<CoordinatorResult, CompletionError> {
        let tools = self.tools.definitions();
        let mut all_tool_calls: Vec<ToolCallRecord> = Vec::new();
        let mut total_usage = TokenUsage::default();
        let mut rounds = 0;
        let mut failures = 0;

        loop {
            let response = self
                .client
                .generate_with_tools_and_history(&messages, &tools)
                .await?;

            if let Some(usage) = response.usage {
                total_usage = total_usage.add(usage);
            }

            messages.push(ConversationMessage::assistant(
                &response.content,
                response.tool_calls.clone(),
            ));

            if response.tool_calls.is_empty() {
                return Ok(CoordinatorResult {
                    content: response.content,
                    tool_calls: all_tool_calls,
                    rounds,
                    finish_reason: FinishReason::Stop,
                    total_usage,
                    message_history: messages,
                });
            }

            let records = self.execute_tool_calls(&response.tool_calls).await;
            rounds += 1;

            for record in records {
                if !record.success {
                    failures += 1;
                    tracing::warn!(
                        tool = %record.name,
                        error = record.error.as_deref().unwrap_or_default(),
                        "Tool call failed"
                    );
                }
                messages.push(ConversationMessage::tool_result(&record.id, &record.result));
                all_tool_calls.push(record);
            }

            let finish_reason = if failures >= self.config.max_tool_errors {
                Some(FinishReason::ToolErrorBudget)
            } else if rounds >= self.config.max_tool_rounds {
                Some(FinishReason::MaxToolRounds)
            } else {
                None
            };

            if let Some(finish_reason) = finish_reason {
                tracing::info!(rounds, failures, %finish_reason, "Tool loop stopped by budget");
                return Ok(CoordinatorResult {
                    content: response.content,
                    tool_calls: all_tool_calls,
                    rounds,
                    finish_reason,
                    total_usage,
                    message_history: messages,
                });
            }
        }
    }

    /// Execute one turn's tool calls. Records come back in call order.
    async fn execute_tool_calls(&self, calls: &[ToolCall]) -> Vec<ToolCallRecord> {
        let (reflections, batch): (Vec<_>, Vec<_>) = calls
            .iter()
            .enumerate()
            .partition(|(_, call)| self.tools.is_reflection(&call.name));

        let mut slots: Vec<Option<ToolCallRecord>> = vec![None; calls.len()];

        let futures = batch
            .iter()
            .map(|(_, call)| self.execute_single_tool(call, false));
        let results = join_all(futures).await;
        for ((index, _), record) in batch.iter().zip(results) {
            slots[*index] = Some(record);
        }

        // Reflections only start once the concurrent batch has fully completed.
        for (index, call) in reflections {
            slots[index] = Some(self.execute_single_tool(call, true).await);
        }

        slots.into_iter().flatten().collect()
    }

    /// Execute a single tool call with timeout.
    async fn execute_single_tool(&self, call: &ToolCall, reflection: bool) -> ToolCallRecord {
        let start = Instant::now();

        let result = timeout(
            self.config.tool_timeout,
            self.tools.invoke(&call.name, call.arguments.clone()),
        )
        .await
        .unwrap_or(Err(ToolError::Timeout(self.config.tool_timeout)));

        let duration_ms = start.elapsed().as_millis() as u64;

        let (result, success, error) = match result {
            Ok(value) => (value, true, None),
            Err(e) => (
                serde_json::json!({ "error": e.to_string() }),
                false,
                Some(e.to_string()),
            ),
        };

        ToolCallRecord {
            id: call.id.clone(),
            name: call.name.clone(),
            arguments: call.arguments.clone(),
            result,
            success,
            duration_ms,
            error,
            reflection,
        }
    }

    /// Get a reference to the configuration.
    pub fn config(&self) -> &ToolCallingConfig {
        &self.config
    }
}
