//! End-to-end tests for the research pipeline
//!
//! Every stage runs for real; only the models, the search tool and the user
//! are scripted (see `common::mocks`).

mod common;

use common::mocks::{
    offline_registry, offline_registry_failing, ResearchLlm, RoutedStructuredClient, ScriptedUser,
};
use deepsearch::research::aggregator::FINDINGS_HEADER;
use deepsearch::research::supervisor::{BUDGET_EXHAUSTED_SUMMARY, NOTHING_DELEGATED_SUMMARY};
use deepsearch::research::{
    DelegationPolicy, PipelineSettings, ResearchCoordinator, StageClients, Termination,
};
use deepsearch::types::{ClarificationError, CompletionError, PipelineError, Stage};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

fn clients(structured: &Arc<RoutedStructuredClient>, llm: &Arc<ResearchLlm>) -> StageClients {
    StageClients {
        structured: structured.clone(),
        planner: structured.clone(),
        research: llm.clone(),
    }
}

fn settings() -> PipelineSettings {
    let mut settings = PipelineSettings::default();
    settings.supervisor.researcher_timeout = Duration::from_secs(5);
    settings
}

/// No clarification, no planning.
fn direct_settings() -> PipelineSettings {
    let mut settings = settings();
    settings.allow_clarification = false;
    settings.plan_research = false;
    settings
}

fn coordinator(
    structured: &Arc<RoutedStructuredClient>,
    llm: &Arc<ResearchLlm>,
    user: Arc<ScriptedUser>,
    settings: PipelineSettings,
) -> ResearchCoordinator {
    let (tools, _) = offline_registry();
    ResearchCoordinator::from_parts(clients(structured, llm), tools, user, settings)
}

#[tokio::test]
async fn test_clarified_request_produces_cited_report() {
    let structured = Arc::new(
        RoutedStructuredClient::new()
            .clarify_ask("Which market should the comparison focus on?")
            .clarify_proceed()
            .brief("Compare solid-state and lithium-ion EV batteries for the EU market.")
            .plan(&["Energy density", "Cost", "Safety"])
            .delegate(&["Energy density", "Cost"])
            .complete("Solid-state cells lead on density; cost parity is years away."),
    );
    let llm = Arc::new(ResearchLlm::new());
    let user = Arc::new(ScriptedUser::new(&["The EU market"]));
    let (tools, search) = offline_registry();
    let coordinator =
        ResearchCoordinator::from_parts(clients(&structured, &llm), tools, user.clone(), settings());

    let report = coordinator.run("Compare battery technologies").await.unwrap();

    assert_eq!(report.termination, Termination::Completed);
    assert_eq!(report.iterations, 1);
    assert!(report.content.starts_with("Solid-state cells lead on density"));
    assert!(report.content.contains(FINDINGS_HEADER));
    assert!(report.content.contains("Subtopics: Energy density, Cost"));

    // Findings keep delegation order and citations are renumbered per report
    let density = report.content.find("Findings on Energy density [1]").unwrap();
    let cost = report.content.find("Findings on Cost [1]").unwrap();
    assert!(density < cost);
    assert!(report
        .content
        .contains("[1] Energy density overview: https://example.com/energy-density"));

    assert_eq!(
        user.asked(),
        vec!["Which market should the comparison focus on?".to_string()]
    );
    assert_eq!(search.calls.load(Ordering::SeqCst), 2);
    assert_eq!(llm.reflection_count(), 1);

    assert_eq!(
        structured.requested(),
        vec![
            "ClarificationDecision",
            "ClarificationDecision",
            "ResearchQuestion",
            "PlanResponse",
            "SupervisorDecision",
            "SupervisorDecision",
        ]
    );

    // The user's answer reaches the brief compiler
    let brief_requests = structured.requests_for("ResearchQuestion");
    assert!(brief_requests[0]
        .messages
        .iter()
        .any(|m| m.content.contains("The EU market")));

    // The plan is only suggested before the first delegation
    let decisions = structured.requests_for("SupervisorDecision");
    assert!(decisions[0].messages[1].content.contains("1. Energy density"));
    assert!(!decisions[1].messages[1]
        .content
        .contains("Suggested decomposition"));
    assert!(decisions[1].messages[1].content.contains("Iteration #1"));
}

#[tokio::test]
async fn test_iteration_budget_forces_completion() {
    let structured = Arc::new(
        RoutedStructuredClient::new()
            .brief("Survey open-source vector databases.")
            .delegate(&["Qdrant"])
            .delegate(&["LanceDB"]),
    );
    let llm = Arc::new(ResearchLlm::new());
    let mut settings = direct_settings();
    settings.supervisor.max_iterations = 2;

    let report = coordinator(&structured, &llm, Arc::new(ScriptedUser::default()), settings)
        .run("vector databases")
        .await
        .unwrap();

    assert_eq!(report.termination, Termination::BudgetExhausted);
    assert_eq!(report.iterations, 2);
    assert!(report.content.starts_with(BUDGET_EXHAUSTED_SUMMARY));
    assert!(report.content.contains("Iteration #1\nSubtopics: Qdrant"));
    assert!(report.content.contains("Iteration #2\nSubtopics: LanceDB"));
    // No third decision is requested once the budget is spent
    assert_eq!(structured.requests_for("SupervisorDecision").len(), 2);
}

#[tokio::test]
async fn test_blank_delegation_concludes_without_research() {
    let structured = Arc::new(
        RoutedStructuredClient::new()
            .brief("Summarise the history of the Rust compiler.")
            .delegate(&["  ", ""]),
    );
    let llm = Arc::new(ResearchLlm::new());

    let report = coordinator(
        &structured,
        &llm,
        Arc::new(ScriptedUser::default()),
        direct_settings(),
    )
    .run("rustc history")
    .await
    .unwrap();

    assert_eq!(report.termination, Termination::NothingDelegated);
    assert_eq!(report.iterations, 0);
    assert_eq!(
        report.content,
        format!("{}\n\n{}", NOTHING_DELEGATED_SUMMARY, FINDINGS_HEADER)
    );
    assert_eq!(llm.reflection_count(), 0);
}

#[tokio::test]
async fn test_clarification_gives_up_after_round_limit() {
    let structured = Arc::new(
        RoutedStructuredClient::new()
            .clarify_ask("What do you mean?")
            .clarify_ask("Still unclear, can you elaborate?"),
    );
    let llm = Arc::new(ResearchLlm::new());
    let user = Arc::new(ScriptedUser::new(&["Something"]));
    let mut settings = settings();
    settings.max_clarification_rounds = 1;

    let err = coordinator(&structured, &llm, user.clone(), settings)
        .run("stuff")
        .await
        .unwrap_err();

    assert_eq!(
        err,
        PipelineError::ClarificationFailed(ClarificationError::RoundLimit(1))
    );
    assert_eq!(err.stage(), Stage::Clarification);
    assert_eq!(user.asked().len(), 1);
    assert!(structured.requests_for("ResearchQuestion").is_empty());
}

#[tokio::test]
async fn test_fail_fast_aborts_the_run() {
    let structured = Arc::new(
        RoutedStructuredClient::new()
            .brief("Compare two cloud providers.")
            .delegate(&["Pricing", "Regions"])
            .complete("unused"),
    );
    let llm = Arc::new(ResearchLlm::new().failing_on("Regions"));

    let err = coordinator(
        &structured,
        &llm,
        Arc::new(ScriptedUser::default()),
        direct_settings(),
    )
    .run("cloud providers")
    .await
    .unwrap_err();

    assert_eq!(err.stage(), Stage::Research);
    assert_eq!(err.kind(), "DelegationFailed");
    match err {
        PipelineError::DelegationFailed { failures } => {
            assert_eq!(failures.len(), 1);
            assert_eq!(failures[0].topic, "Regions");
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(structured.requests_for("SupervisorDecision").len(), 1);
}

#[tokio::test]
async fn test_partial_success_notes_missing_topics() {
    let structured = Arc::new(
        RoutedStructuredClient::new()
            .brief("Compare two cloud providers.")
            .delegate(&["Pricing", "Regions"])
            .complete("Pricing differs mostly in egress."),
    );
    let llm = Arc::new(ResearchLlm::new().failing_on("Regions"));
    let mut settings = direct_settings();
    settings.supervisor.delegation_policy = DelegationPolicy::PartialSuccess;

    let report = coordinator(&structured, &llm, Arc::new(ScriptedUser::default()), settings)
        .run("cloud providers")
        .await
        .unwrap();

    assert_eq!(report.termination, Termination::Completed);
    assert!(report.content.contains("Findings on Pricing [1]"));
    assert!(report.content.contains("Missing research:\n- 'Regions':"));
    assert!(report.content.contains("Regions unreachable"));
}

#[tokio::test]
async fn test_brief_failure_is_reported_with_its_stage() {
    let structured = Arc::new(RoutedStructuredClient::new());
    let llm = Arc::new(ResearchLlm::new());

    let err = coordinator(
        &structured,
        &llm,
        Arc::new(ScriptedUser::default()),
        direct_settings(),
    )
    .run("anything")
    .await
    .unwrap_err();

    assert!(matches!(
        err,
        PipelineError::BriefCompilationFailed(CompletionError::Transport(_))
    ));
    assert_eq!(err.stage(), Stage::Brief);
    assert_eq!(err.kind(), "BriefCompilationFailed");
}

#[tokio::test]
async fn test_empty_plan_is_rejected() {
    let structured = Arc::new(
        RoutedStructuredClient::new()
            .brief("Evaluate static site generators.")
            .plan(&[]),
    );
    let llm = Arc::new(ResearchLlm::new());
    let mut settings = direct_settings();
    settings.plan_research = true;

    let err = coordinator(&structured, &llm, Arc::new(ScriptedUser::default()), settings)
        .run("static site generators")
        .await
        .unwrap_err();

    assert!(matches!(err, PipelineError::InvalidPlan(_)));
    assert_eq!(err.stage(), Stage::Planning);
    assert!(structured.requests_for("SupervisorDecision").is_empty());
}

#[tokio::test]
async fn test_disabled_stages_are_skipped() {
    let structured = Arc::new(
        RoutedStructuredClient::new()
            .brief("Explain how HTTP/3 differs from HTTP/2.")
            .complete("HTTP/3 runs over QUIC."),
    );
    let llm = Arc::new(ResearchLlm::new());

    let report = coordinator(
        &structured,
        &llm,
        Arc::new(ScriptedUser::default()),
        direct_settings(),
    )
    .run("http3")
    .await
    .unwrap();

    assert_eq!(report.termination, Termination::Completed);
    assert_eq!(report.iterations, 0);
    assert_eq!(
        structured.requested(),
        vec!["ResearchQuestion", "SupervisorDecision"]
    );
}

#[tokio::test]
async fn test_tool_errors_stay_inside_the_researcher() {
    let structured = Arc::new(
        RoutedStructuredClient::new()
            .brief("Compare X vs Y.")
            .delegate(&["X", "Y"])
            .complete("Both compared."),
    );
    let llm = Arc::new(ResearchLlm::new());
    let (tools, search) = offline_registry_failing(&["Y"]);
    let coordinator = ResearchCoordinator::from_parts(
        clients(&structured, &llm),
        tools,
        Arc::new(ScriptedUser::default()),
        direct_settings(),
    );

    let report = coordinator.run("Compare X vs Y").await.unwrap();

    assert_eq!(report.termination, Termination::Completed);
    assert!(report.content.contains("Findings on X [1]"));
    assert!(report.content.contains("Findings on Y [1]"));
    assert!(!report.content.contains("Missing research"));
    assert_eq!(search.calls.load(Ordering::SeqCst), 2);

    // The failed search reached Y's conversation as an error payload
    let compressions = llm.compressions.lock();
    let y = compressions
        .iter()
        .find(|messages| messages[1].content == "Y")
        .unwrap();
    assert!(y
        .iter()
        .any(|m| m.tool_call_id.is_some() && m.content.contains("search backend rejected")));
}

#[tokio::test]
async fn test_researcher_stopped_by_tool_error_budget_still_reports() {
    let structured = Arc::new(
        RoutedStructuredClient::new()
            .brief("Compare X vs Y.")
            .delegate(&["X", "Y"])
            .complete("Y could not be searched; X is covered."),
    );
    let llm = Arc::new(ResearchLlm::new().retrying_on("Y"));
    let (tools, search) = offline_registry_failing(&["Y"]);
    let mut settings = direct_settings();
    settings.tool_calling.max_tool_errors = 3;
    settings.tool_calling.max_tool_rounds = 10;
    let coordinator = ResearchCoordinator::from_parts(
        clients(&structured, &llm),
        tools,
        Arc::new(ScriptedUser::default()),
        settings,
    );

    let report = coordinator.run("Compare X vs Y").await.unwrap();

    assert_eq!(report.termination, Termination::Completed);
    assert!(report.content.contains("Findings on X [1]"));
    assert!(report.content.contains("Findings on Y [1]"));
    assert!(!report.content.contains("Missing research"));
    // One search for X, then Y retries until its error budget is spent
    assert_eq!(search.calls.load(Ordering::SeqCst), 4);

    let compressions = llm.compressions.lock();
    let y = compressions
        .iter()
        .find(|messages| messages[1].content == "Y")
        .unwrap();
    let failed_results = y
        .iter()
        .filter(|m| m.tool_call_id.is_some() && m.content.contains("search backend rejected"))
        .count();
    assert_eq!(failed_results, 3);
}
