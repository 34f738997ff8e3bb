use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

// ============= Conversation Types =============

/// Role of a message sender in a conversation.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    /// System instructions.
    System,
    /// User message.
    User,
    /// Assistant response.
    Assistant,
    /// Tool execution result.
    Tool,
}

impl MessageRole {
    /// Wire name of the role.
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageRole::System => "system",
            MessageRole::User => "user",
            MessageRole::Assistant => "assistant",
            MessageRole::Tool => "tool",
        }
    }
}

/// A single message exchanged with a model.
///
/// Covers plain turns as well as assistant tool-call requests and tool results.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConversationMessage {
    /// The role of the message sender.
    pub role: MessageRole,
    /// The text content of the message.
    pub content: String,
    /// Tool calls requested by the assistant (only for Assistant role).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,
    /// Id of the call this message answers (only for Tool role).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

impl ConversationMessage {
    /// Create a system message.
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::System,
            content: content.into(),
            tool_calls: Vec::new(),
            tool_call_id: None,
        }
    }

    /// Create a user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: content.into(),
            tool_calls: Vec::new(),
            tool_call_id: None,
        }
    }

    /// Create an assistant message with optional tool calls.
    pub fn assistant(content: impl Into<String>, tool_calls: Vec<ToolCall>) -> Self {
        Self {
            role: MessageRole::Assistant,
            content: content.into(),
            tool_calls,
            tool_call_id: None,
        }
    }

    /// Create a tool result message.
    pub fn tool_result(tool_call_id: impl Into<String>, result: &serde_json::Value) -> Self {
        Self {
            role: MessageRole::Tool,
            content: serde_json::to_string(result).unwrap_or_else(|_| "{}".to_string()),
            tool_calls: Vec::new(),
            tool_call_id: Some(tool_call_id.into()),
        }
    }
}

/// Ordered, append-only record of the exchange with the user.
///
/// Stages receive a snapshot (clone) and return a new value; nothing edits
/// or removes an existing turn.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Conversation {
    turns: Vec<ConversationMessage>,
}

impl Conversation {
    /// Start a conversation from the user's initial request.
    pub fn from_user(input: impl Into<String>) -> Self {
        Self {
            turns: vec![ConversationMessage::user(input)],
        }
    }

    /// Append a turn.
    pub fn push(&mut self, turn: ConversationMessage) {
        self.turns.push(turn);
    }

    /// Consume and return the conversation with one more turn.
    pub fn with_turn(mut self, turn: ConversationMessage) -> Self {
        self.push(turn);
        self
    }

    /// All turns in order.
    pub fn turns(&self) -> &[ConversationMessage] {
        &self.turns
    }

    /// Number of turns.
    pub fn len(&self) -> usize {
        self.turns.len()
    }

    /// True if no turn has been recorded.
    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    /// Render the turns as `role: content` lines for embedding into a prompt.
    pub fn fold(&self) -> String {
        self.turns
            .iter()
            .map(|turn| format!("{}: {}", turn.role.as_str(), turn.content))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

// ============= Tool Types =============

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    pub arguments: serde_json::Value,
}

// ============= Error Types =============

/// Failure of a single model call, structured or free-text.
#[derive(Debug, Clone, thiserror::Error, PartialEq)]
pub enum CompletionError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("provider returned {status}: {body}")]
    Provider { status: u16, body: String },

    #[error("model returned an empty response")]
    EmptyResponse,

    #[error("response failed schema validation: {reason}")]
    Validation { reason: String, raw: String },

    #[error("structured output still invalid after {attempts} repair attempts: {last_error}")]
    RetriesExhausted { attempts: usize, last_error: String },
}

/// Failure of a single tool invocation. Always recoverable by the caller.
#[derive(Debug, Clone, thiserror::Error, PartialEq)]
pub enum ToolError {
    #[error("Tool not found: {0}")]
    NotFound(String),

    #[error("Invalid arguments: {0}")]
    InvalidArguments(String),

    #[error("Tool execution failed: {0}")]
    Execution(String),

    #[error("Tool execution timed out after {0:?}")]
    Timeout(Duration),
}

/// Why a researcher sub-agent could not produce a report.
#[derive(Debug, Clone, thiserror::Error, PartialEq)]
pub enum ResearchError {
    #[error(transparent)]
    Completion(#[from] CompletionError),

    #[error("researcher exceeded its {0:?} time budget")]
    Timeout(Duration),

    #[error("researcher task panicked: {0}")]
    Panicked(String),
}

/// Why the clarification stage gave up.
#[derive(Debug, Clone, thiserror::Error, PartialEq)]
pub enum ClarificationError {
    #[error(transparent)]
    Completion(#[from] CompletionError),

    #[error("still unclear after {0} clarifying questions")]
    RoundLimit(usize),
}

/// One topic that failed inside a delegated batch.
#[derive(Debug, Clone, PartialEq)]
pub struct TopicFailure {
    pub topic: String,
    pub error: ResearchError,
}

impl fmt::Display for TopicFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "'{}': {}", self.topic, self.error)
    }
}

/// Pipeline stage an error originated from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Clarification,
    Brief,
    Planning,
    Supervisor,
    Research,
    Setup,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Clarification => "clarification",
            Stage::Brief => "brief",
            Stage::Planning => "planning",
            Stage::Supervisor => "supervisor",
            Stage::Research => "research",
            Stage::Setup => "setup",
        };
        f.write_str(name)
    }
}

/// Fatal error of a research run.
#[derive(Debug, Clone, thiserror::Error, PartialEq)]
pub enum PipelineError {
    #[error("clarification failed: {0}")]
    ClarificationFailed(#[source] ClarificationError),

    #[error("research brief compilation failed: {0}")]
    BriefCompilationFailed(#[source] CompletionError),

    #[error("research planning failed: {0}")]
    PlanningFailed(#[source] CompletionError),

    #[error("research plan rejected: {0}")]
    InvalidPlan(String),

    #[error("supervisor decision failed: {0}")]
    SupervisorFailed(#[source] CompletionError),

    /// Delegated researchers aborted. Each failure carries its topic and the
    /// researcher's own error.
    #[error("delegation failed for {}", format_failures(.failures))]
    DelegationFailed { failures: Vec<TopicFailure> },

    #[error("configuration error: {0}")]
    Configuration(String),
}

fn format_failures(failures: &[TopicFailure]) -> String {
    failures
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

impl PipelineError {
    /// The stage the error originated from.
    pub fn stage(&self) -> Stage {
        match self {
            PipelineError::ClarificationFailed(_) => Stage::Clarification,
            PipelineError::BriefCompilationFailed(_) => Stage::Brief,
            PipelineError::PlanningFailed(_) | PipelineError::InvalidPlan(_) => Stage::Planning,
            PipelineError::SupervisorFailed(_) => Stage::Supervisor,
            PipelineError::DelegationFailed { .. } => Stage::Research,
            PipelineError::Configuration(_) => Stage::Setup,
        }
    }

    /// Short machine-friendly error kind.
    pub fn kind(&self) -> &'static str {
        match self {
            PipelineError::ClarificationFailed(_) => "ClarificationFailed",
            PipelineError::BriefCompilationFailed(_) => "BriefCompilationFailed",
            PipelineError::PlanningFailed(_) | PipelineError::InvalidPlan(_) => "PlanningFailed",
            PipelineError::SupervisorFailed(_) => "CompletionError",
            PipelineError::DelegationFailed { .. } => "DelegationFailed",
            PipelineError::Configuration(_) => "ConfigurationError",
        }
    }
}

pub type Result<T, E = PipelineError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conversation_is_append_only() {
        let conversation = Conversation::from_user("Compare X vs Y")
            .with_turn(ConversationMessage::user("Focus on cost"));
        assert_eq!(conversation.len(), 2);
        assert_eq!(conversation.turns()[0].content, "Compare X vs Y");
        assert_eq!(conversation.turns()[1].content, "Focus on cost");
    }

    #[test]
    fn test_conversation_fold() {
        let conversation = Conversation::from_user("hello")
            .with_turn(ConversationMessage::assistant("hi", vec![]));
        assert_eq!(conversation.fold(), "user: hello\nassistant: hi");
    }

    #[test]
    fn test_tool_result_message() {
        let msg = ConversationMessage::tool_result("call_1", &serde_json::json!({"result": 42}));
        assert_eq!(msg.role, MessageRole::Tool);
        assert_eq!(msg.tool_call_id.as_deref(), Some("call_1"));
        assert!(msg.content.contains("42"));
    }

    #[test]
    fn test_pipeline_error_stage_and_kind() {
        let err = PipelineError::BriefCompilationFailed(CompletionError::EmptyResponse);
        assert_eq!(err.stage(), Stage::Brief);
        assert_eq!(err.kind(), "BriefCompilationFailed");

        let err = PipelineError::DelegationFailed {
            failures: vec![TopicFailure {
                topic: "Topic A".to_string(),
                error: ResearchError::Timeout(Duration::from_secs(1)),
            }],
        };
        assert_eq!(err.stage(), Stage::Research);
        assert_eq!(err.kind(), "DelegationFailed");
        assert!(err.to_string().contains("'Topic A'"));

        let err = PipelineError::SupervisorFailed(CompletionError::EmptyResponse);
        assert_eq!(err.stage(), Stage::Supervisor);
    }
}
