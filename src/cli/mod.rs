//! CLI module for deepsearch
//!
//! Provides command-line interface parsing and handling for the deepsearch binary.
//! Uses clap for argument parsing and owo-colors for colored terminal output.

pub mod init;
pub mod interaction;
pub mod output;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// deepsearch - hierarchical deep research
///
/// Clarifies a request, compiles a research brief, delegates bounded parallel
/// research to tool-calling sub-agents and prints a cited report.
#[derive(Parser, Debug)]
#[command(
    name = "deepsearch",
    author = "Dirmacs <build@dirmacs.com>",
    version,
    about = "deepsearch - hierarchical deep research",
    long_about = "Clarifies a request, compiles a research brief, delegates bounded parallel\n\
                  research to tool-calling sub-agents and prints a cited report.\n\n\
                  Run without a subcommand to research a query read from stdin.",
    after_help = "EXAMPLES:\n    \
                  deepsearch init                             # Write deepsearch.toml\n    \
                  deepsearch run \"state of solid-state batteries\"\n    \
                  deepsearch run --no-clarify -o report.md \"...\"\n    \
                  deepsearch config --validate                # Check the configuration"
)]
pub struct Cli {
    /// Path to the configuration file (defaults to ./deepsearch.toml when present)
    #[arg(short, long, global = true, env = "DEEPSEARCH_CONFIG")]
    pub config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Emit logs as JSON lines on stderr
    #[arg(long, global = true)]
    pub json_logs: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available CLI subcommands
#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Commands {
    /// Research a query and print the report
    Run(RunArgs),

    /// Write a starter deepsearch.toml and .env.example
    Init {
        /// Directory to initialize (defaults to current directory)
        #[arg(default_value = ".")]
        path: PathBuf,

        /// Overwrite existing files without prompting
        #[arg(short, long)]
        force: bool,

        /// LLM provider to configure (openai or ollama)
        #[arg(long, default_value = "openai")]
        provider: String,
    },

    /// Show configuration information
    Config {
        /// Show the full configuration as TOML
        #[arg(short = 'f', long)]
        full: bool,

        /// Validate the configuration file
        #[arg(long)]
        validate: bool,
    },
}

/// Arguments for a research run
#[derive(clap::Args, Debug, Clone, Default, PartialEq)]
pub struct RunArgs {
    /// The research request; read from stdin when omitted
    pub query: Vec<String>,

    /// Skip the clarification stage
    #[arg(long)]
    pub no_clarify: bool,

    /// Skip the research planning stage
    #[arg(long)]
    pub no_plan: bool,

    /// Override the supervisor iteration budget
    #[arg(long)]
    pub max_iterations: Option<usize>,

    /// Override the number of researchers that may run at once
    #[arg(long)]
    pub max_concurrent: Option<usize>,

    /// Keep going when some researchers fail
    #[arg(long)]
    pub partial: bool,

    /// Also write the report to this file
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

impl RunArgs {
    /// The query words joined, or `None` when none were given.
    pub fn query_text(&self) -> Option<String> {
        let joined = self.query.join(" ");
        let trimmed = joined.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    }
}

impl Cli {
    /// Parse CLI arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// The command to run; a bare invocation is a run that reads stdin.
    pub fn command(&self) -> Commands {
        self.command
            .clone()
            .unwrap_or_else(|| Commands::Run(RunArgs::default()))
    }
}
