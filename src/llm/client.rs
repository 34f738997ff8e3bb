//! LLM client abstraction and provider selection
//!
//! Every provider is reached through an OpenAI-compatible chat completions
//! endpoint:
//! - **OpenAI**: the public API or any compatible gateway (OpenRouter, vLLM, ...)
//! - **Ollama**: a local Ollama server through its `/v1` compatibility layer

use crate::types::{CompletionError, ConversationMessage, ToolCall, ToolDefinition};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Raw (free-text) completion client.
///
/// All providers implement this trait, so the research stages never depend on
/// a concrete backend.
#[async_trait]
pub trait LLMClient: Send + Sync {
    /// Generate a completion from a single user prompt
    async fn generate(&self, prompt: &str) -> Result<String, CompletionError> {
        let response = self
            .generate_with_history(&[ConversationMessage::user(prompt)])
            .await?;
        Ok(response.content)
    }

    /// Generate with conversation history
    async fn generate_with_history(
        &self,
        messages: &[ConversationMessage],
    ) -> Result<LLMResponse, CompletionError>;

    /// Generate with conversation history and tool calling support
    async fn generate_with_tools_and_history(
        &self,
        messages: &[ConversationMessage],
        tools: &[ToolDefinition],
    ) -> Result<LLMResponse, CompletionError>;

    /// Get the model name/identifier
    fn model_name(&self) -> &str;
}

/// Token usage reported by the provider.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

impl TokenUsage {
    pub fn new(prompt_tokens: u32, completion_tokens: u32) -> Self {
        Self {
            prompt_tokens,
            completion_tokens,
            total_tokens: prompt_tokens + completion_tokens,
        }
    }

    /// Sum of two usage records.
    pub fn add(self, other: TokenUsage) -> Self {
        Self::new(
            self.prompt_tokens + other.prompt_tokens,
            self.completion_tokens + other.completion_tokens,
        )
    }
}

/// Response from an LLM generation request
#[derive(Debug, Clone, PartialEq)]
pub struct LLMResponse {
    /// The text content of the response
    pub content: String,
    /// Any tool calls requested by the model
    pub tool_calls: Vec<ToolCall>,
    /// The reason generation stopped (e.g., "stop", "tool_calls", "length")
    pub finish_reason: String,
    /// Token usage, when the provider reports it
    pub usage: Option<TokenUsage>,
}

impl LLMResponse {
    /// A plain text response without tool calls.
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            tool_calls: Vec::new(),
            finish_reason: "stop".to_string(),
            usage: None,
        }
    }
}

/// Sampling parameters forwarded with every request.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ModelParams {
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
}

/// Provider enum for runtime selection
#[derive(Debug, Clone, PartialEq)]
pub enum Provider {
    /// OpenAI API provider (including compatible APIs)
    ///
    /// # Example
    /// ```rust,ignore
    /// let provider = Provider::OpenAI {
    ///     api_key: "sk-...".to_string(),
    ///     api_base: "https://api.openai.com/v1".to_string(),
    ///     model: "gpt-4o-mini".to_string(),
    ///     params: Default::default(),
    /// };
    /// ```
    OpenAI {
        api_key: String,
        api_base: String,
        model: String,
        params: ModelParams,
    },

    /// Ollama local LLM provider
    ///
    /// Tool calling requires a model that supports it (`llama3.1`, `qwen2.5`, ...).
    Ollama {
        base_url: String,
        model: String,
        params: ModelParams,
    },
}

impl Provider {
    /// Create a client instance for this provider
    pub fn create_client(&self) -> Box<dyn LLMClient> {
        match self {
            Provider::OpenAI {
                api_key,
                api_base,
                model,
                params,
            } => Box::new(super::openai::OpenAIClient::new(
                Some(api_key.clone()),
                api_base.clone(),
                model.clone(),
                *params,
            )),

            Provider::Ollama {
                base_url,
                model,
                params,
            } => Box::new(super::openai::OpenAIClient::new(
                None,
                format!("{}/v1", base_url.trim_end_matches('/')),
                model.clone(),
                *params,
            )),
        }
    }

    /// Get a human-readable name for this provider
    pub fn name(&self) -> &'static str {
        match self {
            Provider::OpenAI { .. } => "OpenAI",
            Provider::Ollama { .. } => "Ollama",
        }
    }

    /// The model identifier sent to the provider
    pub fn model(&self) -> &str {
        match self {
            Provider::OpenAI { model, .. } | Provider::Ollama { model, .. } => model,
        }
    }
}
