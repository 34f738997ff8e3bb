//! Clarification state machine
//!
//! Asks the user follow-up questions until the model judges the request
//! specific enough to research. Only the user's answers are appended to the
//! conversation, never the questions.

use crate::llm::StructuredCompletionClient;
use crate::research::prompts;
use crate::types::{ClarificationError, Conversation, ConversationMessage};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};

/// Model verdict on whether the request needs another question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ClarificationDecision {
    /// Whether the user needs to be asked a clarifying question.
    pub needs_clarification: bool,
    /// A question to ask the user to clarify the report scope.
    #[serde(default)]
    pub question: String,
    /// Message confirming that research will start.
    #[serde(default)]
    pub acknowledgement: String,
}

impl ClarificationDecision {
    pub fn ask(question: impl Into<String>) -> Self {
        Self {
            needs_clarification: true,
            question: question.into(),
            acknowledgement: String::new(),
        }
    }

    pub fn proceed(acknowledgement: impl Into<String>) -> Self {
        Self {
            needs_clarification: false,
            question: String::new(),
            acknowledgement: acknowledgement.into(),
        }
    }

    fn examples() -> [Self; 2] {
        [
            Self::ask("What is the model of a car you want to buy?"),
            Self::proceed("The chosen car is Honda Civic FD8, 1.8L"),
        ]
    }
}

/// Channel to the human asking for research.
#[cfg_attr(test, mockall::automock)]
pub trait UserInteraction: Send + Sync {
    /// Show `question` to the user and block until they answer.
    fn ask(&self, question: &str) -> String;
}

/// States of the clarification loop.
#[derive(Debug, Clone, PartialEq)]
pub enum ClarifyState {
    Start,
    AwaitDecision,
    AskUser { question: String },
    Done { acknowledgement: String },
}

/// Result of a finished clarification.
#[derive(Debug, Clone, PartialEq)]
pub struct ClarificationOutcome {
    /// The conversation including every answer the user gave.
    pub conversation: Conversation,
    /// The model's acknowledgement that research can begin.
    pub acknowledgement: String,
    /// Number of questions asked.
    pub questions_asked: usize,
}

pub struct ClarificationStateMachine {
    client: Arc<dyn StructuredCompletionClient>,
    user: Arc<dyn UserInteraction>,
    max_rounds: usize,
}

impl ClarificationStateMachine {
    pub fn new(
        client: Arc<dyn StructuredCompletionClient>,
        user: Arc<dyn UserInteraction>,
        max_rounds: usize,
    ) -> Self {
        Self {
            client,
            user,
            max_rounds,
        }
    }

    pub async fn run(
        &self,
        mut conversation: Conversation,
    ) -> Result<ClarificationOutcome, ClarificationError> {
        let mut state = ClarifyState::Start;
        let mut questions_asked = 0;

        loop {
            state = match state {
                ClarifyState::Start => ClarifyState::AwaitDecision,
                ClarifyState::AwaitDecision => {
                    let decision = self.decide(&conversation).await?;
                    debug!(?decision, "Clarification decision");
                    if !decision.needs_clarification {
                        ClarifyState::Done {
                            acknowledgement: decision.acknowledgement,
                        }
                    } else if questions_asked >= self.max_rounds {
                        return Err(ClarificationError::RoundLimit(self.max_rounds));
                    } else {
                        ClarifyState::AskUser {
                            question: decision.question,
                        }
                    }
                }
                ClarifyState::AskUser { question } => {
                    questions_asked += 1;
                    info!(round = questions_asked, "Asking user for clarification");
                    let answer = self.user.ask(&question);
                    conversation.push(ConversationMessage::user(answer));
                    ClarifyState::AwaitDecision
                }
                ClarifyState::Done { acknowledgement } => {
                    return Ok(ClarificationOutcome {
                        conversation,
                        acknowledgement,
                        questions_asked,
                    });
                }
            };
        }
    }

    async fn decide(
        &self,
        conversation: &Conversation,
    ) -> Result<ClarificationDecision, ClarificationError> {
        let messages = [ConversationMessage::system(prompts::clarify_instructions(
            &conversation.fold(),
            &prompts::today(),
        ))];
        let decision = self
            .client
            .complete(&messages, &ClarificationDecision::examples())
            .await?;
        Ok(decision)
    }
}
