//! LLM Provider Clients and Abstractions
//!
//! This module provides the model-facing layer of the research pipeline. It
//! abstracts provider-specific details behind traits so the research stages
//! can be driven by a real provider or by scripted test doubles.
//!
//! # Architecture
//!
//! - [`LLMClient`] - Free-text and tool-calling completions
//! - [`StructuredCompletionClient`] - Schema-validated JSON completions
//! - [`FixingStructuredClient`] - Repair decorator for invalid structured output
//! - [`ToolCoordinator`] - Multi-turn tool-calling loop used by researchers
//!
//! # Example
//!
//! ```ignore
//! use deepsearch::llm::{LLMClient, Provider};
//!
//! let client = provider.create_client();
//! let answer = client.generate("What is 2+2?").await?;
//! ```

/// Core LLM client trait and provider selection.
pub mod client;
/// Multi-turn tool calling with bounded rounds and reflection scheduling.
pub mod coordinator;
/// OpenAI-compatible HTTP client.
pub mod openai;
/// Schema-constrained generation and the fix-up decorator.
pub mod structured;

pub use client::{LLMClient, LLMResponse, ModelParams, Provider, TokenUsage};
pub use coordinator::{CoordinatorResult, FinishReason, ToolCallingConfig, ToolCoordinator};
pub use structured::{
    FixingStructuredClient, LlmStructuredClient, StructuredCompletionClient, StructuredRequest,
};
