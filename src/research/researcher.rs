//! Researcher sub-agent
//!
//! Each delegated topic gets a private conversation, a tool-calling loop and a
//! final compression call that turns the gathered material into a
//! citation-bearing findings report.

use crate::llm::coordinator::CoordinatorResult;
use crate::llm::{LLMClient, ToolCallingConfig, ToolCoordinator};
use crate::research::brief::ResearchBrief;
use crate::research::supervisor::TopicResearcher;
use crate::research::{citations, prompts};
use crate::tools::ToolInvoker;
use crate::types::{CompletionError, ConversationMessage, MessageRole, ResearchError};
use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::info;

pub struct Researcher {
    client: Arc<dyn LLMClient>,
    tools: Arc<dyn ToolInvoker>,
    config: ToolCallingConfig,
}

impl Researcher {
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

    /// The only context a researcher starts from.
    fn seed(&self, brief: &ResearchBrief, topic: &str, date: &str) -> Vec<ConversationMessage> {
        vec![
            ConversationMessage::system(prompts::researcher_instructions(
                date,
                self.config.max_tool_rounds,
            )),
            ConversationMessage::system(topic),
            ConversationMessage::user(brief.text()),
        ]
    }

    async fn compress(
        &self,
        result: &CoordinatorResult,
        date: &str,
    ) -> Result<String, CompletionError> {
        let mut messages = without_reflections(result);
        messages.push(ConversationMessage::system(prompts::compress_instructions(date)));

        let response = self.client.generate_with_history(&messages).await?;
        if response.content.trim().is_empty() {
            return Err(CompletionError::EmptyResponse);
        }
        Ok(citations::normalize(&response.content))
    }
}

#[async_trait]
impl TopicResearcher for Researcher {
    async fn research(&self, brief: &ResearchBrief, topic: &str) -> Result<String, ResearchError> {
        let date = prompts::today();
        let coordinator =
            ToolCoordinator::new(self.client.clone(), self.tools.clone(), self.config.clone());

        let result = coordinator
            .execute_conversation(self.seed(brief, topic, &date))
            .await?;
        info!(
            rounds = result.rounds,
            tool_calls = result.tool_calls.len(),
            failed = result.failed_calls(),
            finish_reason = %result.finish_reason,
            "Research loop finished, compressing findings"
        );

        Ok(self.compress(&result, &date).await?)
    }
}

/// The loop's history with reflection calls and their results removed.
pub fn without_reflections(result: &CoordinatorResult) -> Vec<ConversationMessage> {
    let reflection_ids: HashSet<&str> = result
        .tool_calls
        .iter()
        .filter(|record| record.reflection)
        .map(|record| record.id.as_str())
        .collect();

    result
        .message_history
        .iter()
        .filter(|message| {
            message
                .tool_call_id
                .as_deref()
                .map_or(true, |id| !reflection_ids.contains(id))
        })
        .filter_map(|message| {
            if message.role != MessageRole::Assistant || message.tool_calls.is_empty() {
                return Some(message.clone());
            }
            let mut message = message.clone();
            message
                .tool_calls
                .retain(|call| !reflection_ids.contains(call.id.as_str()));
            if message.tool_calls.is_empty() && message.content.trim().is_empty() {
                None
            } else {
                Some(message)
            }
        })
        .collect()
}
