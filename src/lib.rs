//! # deepsearch - hierarchical deep research
//!
//! deepsearch turns an open-ended request into a cited research report. A
//! supervisor agent splits the work into topics and delegates each one to a
//! tool-calling researcher, all under explicit iteration, concurrency and
//! tool budgets.
//!
//! ## Overview
//!
//! deepsearch can be used in two ways:
//!
//! 1. **As a command-line tool** - Run the `deepsearch` binary
//! 2. **As a library** - Embed the pipeline in your own Rust project
//!
//! ## Pipeline
//!
//! 1. Clarify the request with the user (bounded number of questions)
//! 2. Compile the conversation into a single research brief
//! 3. Optionally plan 3-5 research components
//! 4. Supervise: delegate topics to parallel researchers, reflect, repeat
//! 5. Aggregate the findings into the final report
//!
//! ### Configuration-Driven Setup
//!
//! ```rust,ignore
//! use deepsearch::DeepSearchConfig;
//! use std::sync::Arc;
//!
//! let config = DeepSearchConfig::load("deepsearch.toml")?;
//! let coordinator = config.build_coordinator(Arc::new(my_user_channel))?;
//! let report = coordinator.run("How do solid-state batteries compare to Li-ion?").await?;
//! println!("{}", report.content);
//! ```
//!
//! ## Modules
//!
//! - [`research`] - Clarification, brief, planning, supervision and aggregation
//! - [`llm`] - LLM clients, structured output and the tool-calling loop
//! - [`tools`] - Tool trait, registry and the built-in research tools
//! - [`types`] - Conversation types and the error taxonomy
//! - [`utils`] - TOML configuration and logging setup
//! - [`cli`] - Command-line parsing and terminal output

#![warn(rustdoc::missing_crate_level_docs)]

/// Command-line interface.
pub mod cli;
/// LLM provider clients and abstractions.
pub mod llm;
/// Hierarchical research pipeline.
pub mod research;
/// Research tools and the tool registry.
pub mod tools;
/// Core types (conversation messages, errors).
pub mod types;
/// Configuration and logging utilities.
pub mod utils;

// Re-export commonly used types
pub use llm::{LLMClient, LLMResponse, Provider, StructuredCompletionClient, ToolCoordinator};
pub use research::{FinalReport, PipelineSettings, ResearchCoordinator};
pub use tools::registry::ToolRegistry;
pub use types::{PipelineError, Result};
pub use utils::toml_config::{ConfigError, DeepSearchConfig};
