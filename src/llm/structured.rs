//! Structured (schema-constrained) generation
//!
//! A structured request carries a JSON schema derived with `schemars`, optional
//! worked examples and a validator. Validation is serde deserialisation into the
//! target type, so "valid" means exactly "usable by the caller".
//!
//! Two layers:
//! - [`LlmStructuredClient`] issues one generation and validates it.
//! - [`FixingStructuredClient`] decorates any [`StructuredCompletionClient`]; when
//!   the inner client reports a validation failure it sends bounded repair
//!   requests to a fixer model, feeding back the validation error each time.
//!
//! ```rust,ignore
//! let structured = FixingStructuredClient::new(
//!     Arc::new(LlmStructuredClient::new(main_model)),
//!     fixer_model,
//!     3,
//! );
//! let brief: BriefSchema = (&structured as &dyn StructuredCompletionClient)
//!     .complete(&messages, &[])
//!     .await?;
//! ```

use crate::llm::client::LLMClient;
use crate::types::{CompletionError, ConversationMessage};
use async_trait::async_trait;
use schemars::JsonSchema;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, warn};

/// Checks that a parsed value conforms to the requested type.
pub type Validator = fn(&Value) -> Result<(), String>;

/// A schema-constrained completion request.
#[derive(Debug, Clone)]
pub struct StructuredRequest {
    /// Conversation to complete.
    pub messages: Vec<ConversationMessage>,
    /// Name of the schema, used in instructions.
    pub schema_name: String,
    /// JSON schema the output must follow.
    pub schema: Value,
    /// Example outputs shown to the model.
    pub examples: Vec<Value>,
    /// Validation applied to the parsed output.
    pub validator: Validator,
}

impl StructuredRequest {
    /// Build a request whose schema and validator come from `T`.
    pub fn for_type<T>(messages: &[ConversationMessage], examples: &[T]) -> Self
    where
        T: DeserializeOwned + Serialize + JsonSchema,
    {
        let schema = serde_json::to_value(schemars::schema_for!(T)).unwrap_or(Value::Null);
        Self {
            messages: messages.to_vec(),
            schema_name: T::schema_name().to_string(),
            schema,
            examples: examples
                .iter()
                .filter_map(|example| serde_json::to_value(example).ok())
                .collect(),
            validator: validate_as::<T>,
        }
    }

    /// Instruction appended to the conversation describing the expected output.
    pub fn format_instructions(&self) -> String {
        let mut text = format!(
            "Respond with a single JSON object of type `{}` matching this JSON schema, \
             without any surrounding prose:\n{}",
            self.schema_name,
            serde_json::to_string_pretty(&self.schema).unwrap_or_default()
        );
        if !self.examples.is_empty() {
            text.push_str("\n\nExamples of valid responses:");
            for example in &self.examples {
                text.push('\n');
                text.push_str(&example.to_string());
            }
        }
        text
    }
}

fn validate_as<T: DeserializeOwned>(value: &Value) -> Result<(), String> {
    serde_json::from_value::<T>(value.clone())
        .map(|_| ())
        .map_err(|e| e.to_string())
}

/// Extract the JSON payload from a model response.
///
/// Accepts bare JSON, fenced code blocks and JSON embedded in surrounding prose.
pub fn extract_json(raw: &str) -> Result<Value, String> {
    let trimmed = raw.trim();
    if let Ok(value) = serde_json::from_str::<Value>(trimmed) {
        return Ok(value);
    }

    if let Some(start) = trimmed.find("```") {
        let after = &trimmed[start + 3..];
        let body_start = after.find('\n').map(|i| i + 1).unwrap_or(0);
        let body = &after[body_start..];
        if let Some(end) = body.find("```") {
            if let Ok(value) = serde_json::from_str::<Value>(body[..end].trim()) {
                return Ok(value);
            }
        }
    }

    match (trimmed.find('{'), trimmed.rfind('}')) {
        (Some(start), Some(end)) if start < end => {
            serde_json::from_str::<Value>(&trimmed[start..=end]).map_err(|e| e.to_string())
        }
        _ => Err("no JSON object found in response".to_string()),
    }
}

/// Parse and validate a raw model response against a request.
pub fn parse_response(request: &StructuredRequest, raw: &str) -> Result<Value, CompletionError> {
    let value = extract_json(raw).map_err(|reason| CompletionError::Validation {
        reason,
        raw: raw.to_string(),
    })?;
    (request.validator)(&value).map_err(|reason| CompletionError::Validation {
        reason,
        raw: raw.to_string(),
    })?;
    Ok(value)
}

/// Completion client returning schema-validated JSON.
#[async_trait]
pub trait StructuredCompletionClient: Send + Sync {
    /// Complete the request and return a value that passed `request.validator`.
    async fn complete_value(&self, request: &StructuredRequest) -> Result<Value, CompletionError>;
}

impl dyn StructuredCompletionClient {
    /// Typed convenience over [`StructuredCompletionClient::complete_value`].
    pub async fn complete<T>(
        &self,
        messages: &[ConversationMessage],
        examples: &[T],
    ) -> Result<T, CompletionError>
    where
        T: DeserializeOwned + Serialize + JsonSchema,
    {
        let request = StructuredRequest::for_type(messages, examples);
        let value = self.complete_value(&request).await?;
        serde_json::from_value(value).map_err(|e| CompletionError::Validation {
            reason: e.to_string(),
            raw: String::new(),
        })
    }
}

/// Single-shot structured generation on top of a raw [`LLMClient`].
pub struct LlmStructuredClient {
    client: Arc<dyn LLMClient>,
}

impl LlmStructuredClient {
    pub fn new(client: Arc<dyn LLMClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl StructuredCompletionClient for LlmStructuredClient {
    async fn complete_value(&self, request: &StructuredRequest) -> Result<Value, CompletionError> {
        let mut messages = request.messages.clone();
        messages.push(ConversationMessage::system(request.format_instructions()));

        let response = self.client.generate_with_history(&messages).await?;
        debug!(
            schema = %request.schema_name,
            model = self.client.model_name(),
            "Structured response received"
        );
        parse_response(request, &response.content)
    }
}

/// Decorator that repairs invalid structured output with a fixer model.
///
/// Only [`CompletionError::Validation`] triggers repair; transport and provider
/// failures propagate unchanged.
pub struct FixingStructuredClient {
    inner: Arc<dyn StructuredCompletionClient>,
    fixer: Arc<dyn LLMClient>,
    retries: usize,
}

impl FixingStructuredClient {
    pub fn new(
        inner: Arc<dyn StructuredCompletionClient>,
        fixer: Arc<dyn LLMClient>,
        retries: usize,
    ) -> Self {
        Self {
            inner,
            fixer,
            retries,
        }
    }

    fn repair_prompt(request: &StructuredRequest, raw: &str, reason: &str) -> String {
        format!(
            "The following output was supposed to be a JSON object of type `{}` but failed \
             validation.\n\nValidation error:\n{}\n\nOutput:\n{}\n\nReturn only the corrected \
             JSON object, preserving all information from the output.\n\nSchema:\n{}",
            request.schema_name,
            reason,
            raw,
            serde_json::to_string_pretty(&request.schema).unwrap_or_default()
        )
    }
}

#[async_trait]
impl StructuredCompletionClient for FixingStructuredClient {
    async fn complete_value(&self, request: &StructuredRequest) -> Result<Value, CompletionError> {
        let (mut raw, mut reason) = match self.inner.complete_value(request).await {
            Ok(value) => return Ok(value),
            Err(CompletionError::Validation { reason, raw }) => (raw, reason),
            Err(other) => return Err(other),
        };

        for attempt in 1..=self.retries {
            warn!(
                schema = %request.schema_name,
                attempt,
                max = self.retries,
                error = %reason,
                "Structured output invalid, requesting repair"
            );

            let prompt = Self::repair_prompt(request, &raw, &reason);
            let repaired = self
                .fixer
                .generate_with_history(&[ConversationMessage::user(prompt)])
                .await?;

            match parse_response(request, &repaired.content) {
                Ok(value) => return Ok(value),
                Err(CompletionError::Validation {
                    reason: next_reason,
                    raw: next_raw,
                }) => {
                    reason = next_reason;
                    raw = next_raw;
                }
                Err(other) => return Err(other),
            }
        }

        Err(CompletionError::RetriesExhausted {
            attempts: self.retries,
            last_error: reason,
        })
    }
}
