use crate::llm::{LLMClient, StructuredCompletionClient, ToolCallingConfig};
use crate::research::aggregator::{aggregate, FinalReport};
use crate::research::brief::BriefCompiler;
use crate::research::clarify::{ClarificationStateMachine, UserInteraction};
use crate::research::planner::ResearchPlanner;
use crate::research::researcher::Researcher;
use crate::research::supervisor::{Supervisor, SupervisorConfig};
use crate::tools::ToolInvoker;
use crate::types::{Conversation, PipelineError, Result};
use std::sync::Arc;
use tracing::{info, info_span, Instrument};
use uuid::Uuid;

/// Acknowledgement used when the clarification stage is turned off.
pub const SKIPPED_CLARIFICATION: &str = "Proceeding with the request as given.";

/// Model clients for each stage. Stages may share a client.
#[derive(Clone)]
pub struct StageClients {
    /// Structured client for clarification, brief and supervisor decisions.
    pub structured: Arc<dyn StructuredCompletionClient>,
    /// Structured client for the planner, possibly bound to another model.
    pub planner: Arc<dyn StructuredCompletionClient>,
    /// Raw client for researchers, compression and supervisor reflection.
    pub research: Arc<dyn LLMClient>,
}

/// Stage toggles and budgets outside the supervisor's own configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineSettings {
    pub allow_clarification: bool,
    pub max_clarification_rounds: usize,
    pub plan_research: bool,
    pub supervisor: SupervisorConfig,
    pub tool_calling: ToolCallingConfig,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            allow_clarification: true,
            max_clarification_rounds: 3,
            plan_research: true,
            supervisor: SupervisorConfig::default(),
            tool_calling: ToolCallingConfig::default(),
        }
    }
}

/// End-to-end research pipeline: clarify, brief, plan, supervise, aggregate.
pub struct ResearchCoordinator {
    clarifier: Option<ClarificationStateMachine>,
    brief_compiler: BriefCompiler,
    planner: Option<ResearchPlanner>,
    supervisor: Supervisor,
}

impl ResearchCoordinator {
    pub fn new(
        clarifier: Option<ClarificationStateMachine>,
        brief_compiler: BriefCompiler,
        planner: Option<ResearchPlanner>,
        supervisor: Supervisor,
    ) -> Self {
        Self {
            clarifier,
            brief_compiler,
            planner,
            supervisor,
        }
    }

    /// Wire every stage from shared clients, tools and settings.
    pub fn from_parts(
        clients: StageClients,
        tools: Arc<dyn ToolInvoker>,
        user: Arc<dyn UserInteraction>,
        settings: PipelineSettings,
    ) -> Self {
        let clarifier = settings.allow_clarification.then(|| {
            ClarificationStateMachine::new(
                clients.structured.clone(),
                user,
                settings.max_clarification_rounds,
            )
        });
        let planner = settings
            .plan_research
            .then(|| ResearchPlanner::new(clients.planner.clone()));
        let researcher = Arc::new(Researcher::new(
            clients.research.clone(),
            tools,
            settings.tool_calling,
        ));
        let supervisor = Supervisor::new(
            clients.structured.clone(),
            clients.research,
            researcher,
            settings.supervisor,
        );

        Self::new(
            clarifier,
            BriefCompiler::new(clients.structured),
            planner,
            supervisor,
        )
    }

    /// Execute deep research on a request
    pub async fn run(&self, initial_input: &str) -> Result<FinalReport> {
        let run_id = Uuid::new_v4();
        let span = info_span!("research_run", %run_id);
        self.run_stages(initial_input).instrument(span).await
    }

    async fn run_stages(&self, initial_input: &str) -> Result<FinalReport> {
        let mut conversation = Conversation::from_user(initial_input);

        if let Some(clarifier) = &self.clarifier {
            info!("Clarifying request");
            let outcome = clarifier
                .run(conversation)
                .await
                .map_err(PipelineError::ClarificationFailed)?;
            info!(
                questions = outcome.questions_asked,
                acknowledgement = %outcome.acknowledgement,
                "Request clarified"
            );
            conversation = outcome.conversation;
        } else {
            info!(acknowledgement = SKIPPED_CLARIFICATION, "Clarification disabled");
        }

        let brief = self
            .brief_compiler
            .compile(&conversation)
            .await
            .map_err(PipelineError::BriefCompilationFailed)?;
        info!(brief = brief.text(), "Research brief ready");

        let plan = match &self.planner {
            Some(planner) => Some(planner.plan(&brief).await?),
            None => None,
        };

        let outcome = self.supervisor.run(brief, plan.as_ref()).await?;
        let report = aggregate(&outcome.state, &outcome.conclusion);
        info!(
            iterations = report.iterations,
            termination = ?report.termination,
            "Research finished"
        );
        Ok(report)
    }
}
