//! Research planning
//!
//! Decomposes the brief into independent components. The component count is
//! enforced here, whatever the model returns.

use crate::llm::StructuredCompletionClient;
use crate::research::brief::ResearchBrief;
use crate::research::prompts;
use crate::types::{ConversationMessage, PipelineError};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

pub const MAX_COMPONENTS: usize = 5;
pub const MIN_COMPONENTS: usize = 3;

/// One independently researchable part of the brief.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ResearchComponent {
    /// Short, descriptive name of the component
    pub title: String,
    /// One-sentence research goal or question
    pub objective: String,
    /// 2-3 sentences explaining why this subtopic is distinct and important
    #[serde(default)]
    pub rationale: String,
}

impl ResearchComponent {
    fn is_blank(&self) -> bool {
        self.title.trim().is_empty() || self.objective.trim().is_empty()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
struct PlanResponse {
    /// Research topics for standalone research
    research_components: Vec<ResearchComponent>,
}

/// Ordered list of components, presentation order preserved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResearchPlan {
    components: Vec<ResearchComponent>,
}

impl ResearchPlan {
    /// Apply the component bounds: drop blank entries, keep at most
    /// [`MAX_COMPONENTS`], reject an empty plan.
    pub fn from_components(components: Vec<ResearchComponent>) -> Result<Self, String> {
        let total = components.len();
        let mut components: Vec<_> = components.into_iter().filter(|c| !c.is_blank()).collect();

        if components.len() < total {
            warn!(dropped = total - components.len(), "Dropped blank plan components");
        }
        if components.is_empty() {
            return Err("plan contains no usable components".to_string());
        }
        if components.len() > MAX_COMPONENTS {
            warn!(received = components.len(), "Plan truncated to {} components", MAX_COMPONENTS);
            components.truncate(MAX_COMPONENTS);
        }
        if components.len() < MIN_COMPONENTS {
            warn!(received = components.len(), "Plan has fewer components than suggested");
        }

        Ok(Self { components })
    }

    pub fn components(&self) -> &[ResearchComponent] {
        &self.components
    }

    pub fn len(&self) -> usize {
        self.components.len()
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    /// Markdown rendering used as the suggested decomposition in the
    /// supervisor's first planning prompt.
    pub fn render(&self) -> String {
        self.components
            .iter()
            .enumerate()
            .map(|(i, c)| {
                let mut line = format!("{}. {}: {}", i + 1, c.title.trim(), c.objective.trim());
                if !c.rationale.trim().is_empty() {
                    line.push_str(&format!(" ({})", c.rationale.trim()));
                }
                line
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

pub struct ResearchPlanner {
    client: Arc<dyn StructuredCompletionClient>,
}

impl ResearchPlanner {
    /// `client` may be bound to a different model than the other stages.
    pub fn new(client: Arc<dyn StructuredCompletionClient>) -> Self {
        Self { client }
    }

    pub async fn plan(&self, brief: &ResearchBrief) -> Result<ResearchPlan, PipelineError> {
        let messages = [
            ConversationMessage::system(prompts::PLANNER_INSTRUCTIONS),
            ConversationMessage::user(prompts::planner_input(brief.text())),
        ];
        let response: PlanResponse = self
            .client
            .complete(&messages, &[example_plan()])
            .await
            .map_err(PipelineError::PlanningFailed)?;

        let plan = ResearchPlan::from_components(response.research_components)
            .map_err(PipelineError::InvalidPlan)?;
        info!(components = plan.len(), "Research plan ready");
        Ok(plan)
    }
}

fn example_plan() -> PlanResponse {
    let component = |title: &str, objective: &str, rationale: &str| ResearchComponent {
        title: title.to_string(),
        objective: objective.to_string(),
        rationale: rationale.to_string(),
    };
    PlanResponse {
        research_components: vec![
            component(
                "Automation and Workforce Displacement",
                "Analyze how AI-driven automation affects employment rates in different industries.",
                "Focuses on the direct labor market impact and identifies the most vulnerable sectors.",
            ),
            component(
                "Evolving Skill Requirements",
                "Study how AI adoption changes the demand for specific technical and soft skills.",
                "Explores how workforce education and training must adapt.",
            ),
            component(
                "Ethical and Societal Implications",
                "Examine ethical concerns of widespread AI deployment in the workplace.",
                "Covers the non-economic dimensions of AI adoption.",
            ),
        ],
    }
}
