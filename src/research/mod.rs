//! Hierarchical Research Pipeline
//!
//! This module turns an open-ended request into a cited research report by
//! coordinating a hierarchy of model-driven agents.
//!
//! # Architecture
//!
//! - [`clarify`] - Asks the user clarifying questions until the request is clear
//! - [`brief`] - Compiles the conversation into a single research brief
//! - [`planner`] - Splits the brief into 3-5 independent components
//! - [`supervisor`] - Delegates topics to researchers under iteration and concurrency budgets
//! - [`researcher`] - Per-topic tool loop followed by compression into a findings report
//! - [`citations`] - Renumbers citations and rebuilds the sources section
//! - [`aggregator`] - Pure composition of the final report
//! - [`coordinator::ResearchCoordinator`] - Runs the stages end to end
//!
//! # Usage
//!
//! ```ignore
//! use deepsearch::research::coordinator::ResearchCoordinator;
//!
//! let coordinator = ResearchCoordinator::from_parts(clients, tools, user, settings);
//! let report = coordinator
//!     .run("What are the latest developments in quantum computing?")
//!     .await?;
//!
//! println!("{}", report.content);
//! ```

/// Final report assembly.
pub mod aggregator;
/// Research brief compilation.
pub mod brief;
/// Citation renumbering.
pub mod citations;
/// Clarification state machine.
pub mod clarify;
/// End-to-end research orchestration.
pub mod coordinator;
/// Research component planning.
pub mod planner;
/// Prompt templates.
pub mod prompts;
/// Per-topic researcher sub-agent.
pub mod researcher;
/// Supervisor plan/delegate/reflect loop.
pub mod supervisor;

pub use aggregator::FinalReport;
pub use coordinator::{PipelineSettings, ResearchCoordinator, StageClients};
pub use supervisor::{DelegationPolicy, SupervisorConfig, Termination, TopicResearcher};
