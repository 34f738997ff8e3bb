//! Supervisor loop
//!
//! Plans, delegates, executes and reflects across a bounded number of
//! iterations:
//!
//! 1. Past the iteration budget, completion is forced without asking the model
//! 2. Otherwise the model returns a [`SupervisorDecision`] from the brief and history
//! 3. Delegated topics are normalised and researched concurrently, bounded by a semaphore
//! 4. The iteration is appended to [`SupervisorState`] and an optional reflection is logged
//!
//! Iterations are strictly sequential. Researcher runs inside one iteration may
//! finish in any order, but their findings are folded back in delegation order.

use crate::llm::{LLMClient, StructuredCompletionClient};
use crate::research::brief::ResearchBrief;
use crate::research::planner::ResearchPlan;
use crate::research::prompts;
use crate::tools::think::record_reflection;
use crate::types::{ConversationMessage, PipelineError, ResearchError, TopicFailure};
use async_trait::async_trait;
use futures::FutureExt;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, info_span, warn, Instrument};

pub const BUDGET_EXHAUSTED_SUMMARY: &str =
    "Iteration budget exhausted. Proceeding to finalize based on gathered findings.";
pub const NOTHING_DELEGATED_SUMMARY: &str =
    "No further research delegated. Proceeding to finalize based on gathered findings.";

/// The supervisor's next move. Exactly one variant per decision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum SupervisorDecision {
    /// Spawn one researcher per topic.
    DelegateResearch { topics: Vec<String> },
    /// Stop researching; `summary` opens the final report.
    ResearchComplete { summary: String },
}

impl SupervisorDecision {
    fn examples() -> [Self; 2] {
        [
            SupervisorDecision::DelegateResearch {
                topics: vec![
                    "Research topic A in full standalone detail".to_string(),
                    "Research topic B in full standalone detail".to_string(),
                ],
            },
            SupervisorDecision::ResearchComplete {
                summary: "We have sufficient findings.".to_string(),
            },
        ]
    }
}

/// One completed round of delegation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SupervisorIteration {
    pub subtopics: Vec<String>,
    pub findings_summary: String,
}

/// Brief plus the append-only iteration history. Only the supervisor appends.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SupervisorState {
    brief: ResearchBrief,
    iterations: Vec<SupervisorIteration>,
}

impl SupervisorState {
    pub fn new(brief: ResearchBrief) -> Self {
        Self {
            brief,
            iterations: Vec::new(),
        }
    }

    pub fn brief(&self) -> &ResearchBrief {
        &self.brief
    }

    pub fn iterations(&self) -> &[SupervisorIteration] {
        &self.iterations
    }

    pub(crate) fn record(&mut self, iteration: SupervisorIteration) {
        self.iterations.push(iteration);
    }
}

/// How the run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Termination {
    /// The model decided research was complete.
    Completed,
    /// The iteration budget forced completion.
    BudgetExhausted,
    /// The model delegated no usable topic.
    NothingDelegated,
}

/// The terminal decision of a supervisor run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Conclusion {
    pub summary: String,
    pub termination: Termination,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SupervisorOutcome {
    pub state: SupervisorState,
    pub conclusion: Conclusion,
}

/// Researches one delegated topic and returns a findings report.
///
/// Each call owns its own conversation; nothing is shared between topics.
#[async_trait]
pub trait TopicResearcher: Send + Sync {
    async fn research(&self, brief: &ResearchBrief, topic: &str) -> Result<String, ResearchError>;
}

/// What to do when a researcher fails inside a delegated batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DelegationPolicy {
    /// Abort the iteration (and the run) on the first failure.
    #[default]
    FailFast,
    /// Keep the successful topics and note the missing ones.
    PartialSuccess,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SupervisorConfig {
    pub max_iterations: usize,
    pub max_concurrent_research_units: usize,
    pub researcher_timeout: Duration,
    pub delegation_policy: DelegationPolicy,
    pub reflection: bool,
    pub findings_prefix_chars: usize,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            max_iterations: 3,
            max_concurrent_research_units: 3,
            researcher_timeout: Duration::from_secs(600),
            delegation_policy: DelegationPolicy::FailFast,
            reflection: true,
            findings_prefix_chars: 1000,
        }
    }
}

/// Trim, drop blanks, deduplicate (first occurrence wins), cap to `limit`.
pub fn normalize_topics(topics: Vec<String>, limit: usize) -> Vec<String> {
    let mut retained: Vec<String> = Vec::with_capacity(topics.len().min(limit));
    for topic in topics {
        let topic = topic.trim();
        if topic.is_empty() || retained.iter().any(|t| t == topic) {
            continue;
        }
        if retained.len() == limit {
            warn!(limit, dropped = topic, "Delegated topic over the concurrency cap dropped");
            continue;
        }
        retained.push(topic.to_string());
    }
    retained
}

/// Render the iteration history for the planning prompt.
pub fn render_history(iterations: &[SupervisorIteration], prefix_chars: usize) -> String {
    if iterations.is_empty() {
        return "<empty>".to_string();
    }
    iterations
        .iter()
        .enumerate()
        .map(|(i, iteration)| {
            format!(
                "Iteration #{}:\n- Subtopics: {}\n- Findings summary: {}\n",
                i + 1,
                iteration.subtopics.join(", "),
                prefix(&iteration.findings_summary, prefix_chars)
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn prefix(text: &str, chars: usize) -> String {
    text.chars().take(chars).collect()
}

pub struct Supervisor {
    decider: Arc<dyn StructuredCompletionClient>,
    reflector: Arc<dyn LLMClient>,
    researcher: Arc<dyn TopicResearcher>,
    config: SupervisorConfig,
}

impl Supervisor {
    pub fn new(
        decider: Arc<dyn StructuredCompletionClient>,
        reflector: Arc<dyn LLMClient>,
        researcher: Arc<dyn TopicResearcher>,
        config: SupervisorConfig,
    ) -> Self {
        Self {
            decider,
            reflector,
            researcher,
            config,
        }
    }

    pub fn config(&self) -> &SupervisorConfig {
        &self.config
    }

    pub async fn run(
        &self,
        brief: ResearchBrief,
        plan: Option<&ResearchPlan>,
    ) -> Result<SupervisorOutcome, PipelineError> {
        let mut state = SupervisorState::new(brief);

        loop {
            let iteration = state.iterations().len() + 1;

            let decision = if state.iterations().len() >= self.config.max_iterations {
                info!(max_iterations = self.config.max_iterations, "Iteration budget exhausted");
                None
            } else {
                Some(self.decide(&state, plan).await?)
            };

            let topics = match decision {
                None => {
                    return Ok(conclude(
                        state,
                        BUDGET_EXHAUSTED_SUMMARY,
                        Termination::BudgetExhausted,
                    ));
                }
                Some(SupervisorDecision::ResearchComplete { summary }) => {
                    info!(iterations = state.iterations().len(), "Supervisor completed research");
                    return Ok(conclude(state, summary, Termination::Completed));
                }
                Some(SupervisorDecision::DelegateResearch { topics }) => {
                    normalize_topics(topics, self.config.max_concurrent_research_units)
                }
            };

            if topics.is_empty() {
                info!("Supervisor delegated no usable topic");
                return Ok(conclude(
                    state,
                    NOTHING_DELEGATED_SUMMARY,
                    Termination::NothingDelegated,
                ));
            }

            let span = info_span!("supervisor_iteration", iteration, topics = topics.len());
            let record = self
                .delegate(state.brief(), topics)
                .instrument(span)
                .await?;
            state.record(record);

            if self.config.reflection {
                self.reflect(&state).await;
            }
        }
    }

    async fn decide(
        &self,
        state: &SupervisorState,
        plan: Option<&ResearchPlan>,
    ) -> Result<SupervisorDecision, PipelineError> {
        let mut input = format!("Research brief:\n{}\n\n", state.brief());
        if let Some(plan) = plan.filter(|_| state.iterations().is_empty()) {
            input.push_str(&format!("Suggested decomposition:\n{}\n\n", plan.render()));
        }
        input.push_str(&format!(
            "History:\n{}",
            render_history(state.iterations(), self.config.findings_prefix_chars)
        ));

        let messages = [
            ConversationMessage::system(prompts::supervisor_instructions(
                &prompts::today(),
                self.config.max_iterations,
                self.config.max_concurrent_research_units,
            )),
            ConversationMessage::user(input),
        ];

        let decision = self
            .decider
            .complete(&messages, &SupervisorDecision::examples())
            .await
            .map_err(PipelineError::SupervisorFailed)?;
        debug!(?decision, "Supervisor decision");
        Ok(decision)
    }

    /// Run one researcher per topic, at most `max_concurrent_research_units`
    /// at a time, and fold the reports back in delegation order.
    async fn delegate(
        &self,
        brief: &ResearchBrief,
        topics: Vec<String>,
    ) -> Result<SupervisorIteration, PipelineError> {
        info!(topics = ?topics, "Delegating research");

        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrent_research_units));
        let deadline = self.config.researcher_timeout;
        let mut tasks = JoinSet::new();

        for (index, topic) in topics.iter().enumerate() {
            let semaphore = semaphore.clone();
            let researcher = self.researcher.clone();
            let brief = brief.clone();
            let topic = topic.clone();
            let span = info_span!("researcher", topic = %topic);

            tasks.spawn(
                async move {
                    let Ok(_permit) = semaphore.acquire_owned().await else {
                        return (index, Err(ResearchError::Panicked("limiter closed".to_string())));
                    };
                    let run = AssertUnwindSafe(researcher.research(&brief, &topic)).catch_unwind();
                    let outcome = match tokio::time::timeout(deadline, run).await {
                        Ok(Ok(result)) => result,
                        Ok(Err(panic)) => Err(ResearchError::Panicked(panic_message(panic))),
                        Err(_) => Err(ResearchError::Timeout(deadline)),
                    };
                    (index, outcome)
                }
                .instrument(span),
            );
        }

        let mut results: Vec<Option<Result<String, ResearchError>>> = vec![None; topics.len()];
        while let Some(joined) = tasks.join_next().await {
            let (index, outcome) = match joined {
                Ok(done) => done,
                Err(e) => {
                    warn!(error = %e, "Researcher task did not complete");
                    continue;
                }
            };

            if let Err(error) = &outcome {
                warn!(topic = %topics[index], %error, "Researcher failed");
                if self.config.delegation_policy == DelegationPolicy::FailFast {
                    tasks.abort_all();
                    return Err(PipelineError::DelegationFailed {
                        failures: vec![TopicFailure {
                            topic: topics[index].clone(),
                            error: error.clone(),
                        }],
                    });
                }
            }
            results[index] = Some(outcome);
        }

        let mut reports = Vec::with_capacity(topics.len());
        let mut failures = Vec::new();
        for (topic, result) in topics.iter().zip(results) {
            match result {
                Some(Ok(report)) => reports.push(report),
                Some(Err(error)) => failures.push(TopicFailure {
                    topic: topic.clone(),
                    error,
                }),
                None => failures.push(TopicFailure {
                    topic: topic.clone(),
                    error: ResearchError::Panicked("task did not complete".to_string()),
                }),
            }
        }

        let fail_fast = self.config.delegation_policy == DelegationPolicy::FailFast;
        if reports.is_empty() || (fail_fast && !failures.is_empty()) {
            return Err(PipelineError::DelegationFailed { failures });
        }

        let mut findings_summary = reports.join("\n\n");
        if !failures.is_empty() {
            findings_summary.push_str("\n\nMissing research:");
            for failure in &failures {
                findings_summary.push_str(&format!("\n- {}", failure));
            }
        }

        info!(
            succeeded = reports.len(),
            failed = failures.len(),
            "Delegated research finished"
        );

        Ok(SupervisorIteration {
            subtopics: topics,
            findings_summary,
        })
    }

    /// Ask for a short reflection on the latest findings. Used for logging
    /// only; failures are logged and ignored.
    async fn reflect(&self, state: &SupervisorState) {
        let latest = state
            .iterations()
            .last()
            .map(|it| prefix(&it.findings_summary, self.config.findings_prefix_chars))
            .unwrap_or_else(|| "<none>".to_string());

        let messages = [
            ConversationMessage::system(prompts::REFLECTION_INSTRUCTIONS),
            ConversationMessage::user(format!(
                "Brief:\n{}\n\nLatest findings summary:\n{}",
                state.brief(),
                latest
            )),
        ];

        match self.reflector.generate_with_history(&messages).await {
            Ok(response) => {
                record_reflection("supervisor", response.content.trim());
            }
            Err(e) => warn!(error = %e, "Supervisor reflection failed"),
        }
    }
}

fn conclude(
    state: SupervisorState,
    summary: impl Into<String>,
    termination: Termination,
) -> SupervisorOutcome {
    SupervisorOutcome {
        state,
        conclusion: Conclusion {
            summary: summary.into(),
            termination,
        },
    }
}

fn panic_message(payload: Box<dyn std::any::Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
