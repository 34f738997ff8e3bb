//! Research brief compilation
//!
//! Turns the clarified conversation into the single research question every
//! later stage works from.

use crate::llm::StructuredCompletionClient;
use crate::research::prompts;
use crate::types::{CompletionError, Conversation, ConversationMessage};
use schemars::JsonSchema;
use serde::{de, Deserialize, Deserializer, Serialize};
use std::fmt;
use std::sync::Arc;

/// The structured restatement of the user's request. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResearchBrief {
    text: String,
}

impl ResearchBrief {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into().trim().to_string(),
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }
}

impl fmt::Display for ResearchBrief {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

/// Wire shape requested from the model.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
struct ResearchQuestion {
    /// A research question that will be used to guide the research.
    #[serde(deserialize_with = "non_blank")]
    #[schemars(with = "String")]
    research_brief: String,
}

fn non_blank<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    let text = String::deserialize(deserializer)?;
    if text.trim().is_empty() {
        return Err(de::Error::custom("research brief must not be blank"));
    }
    Ok(text)
}

pub struct BriefCompiler {
    client: Arc<dyn StructuredCompletionClient>,
}

impl BriefCompiler {
    pub fn new(client: Arc<dyn StructuredCompletionClient>) -> Self {
        Self { client }
    }

    /// One structured call over the whole conversation. Repairs are left to
    /// the structured client's own budget.
    pub async fn compile(&self, conversation: &Conversation) -> Result<ResearchBrief, CompletionError> {
        let messages = [ConversationMessage::system(prompts::brief_instructions(
            &conversation.fold(),
            &prompts::today(),
        ))];
        let question: ResearchQuestion = self.client.complete(&messages, &[]).await?;
        let brief = ResearchBrief::new(question.research_brief);
        tracing::debug!(brief = brief.text(), "Research brief compiled");
        Ok(brief)
    }
}
