//! Init command implementation
//!
//! Writes a commented `deepsearch.toml` and a `.env.example` next to it.

use super::output::Output;
use crate::utils::toml_config::DEFAULT_CONFIG_FILE;
use std::fs;
use std::path::{Path, PathBuf};

/// Result of the init operation
#[derive(Debug, PartialEq, Eq)]
pub enum InitResult {
    /// Initialization completed successfully
    Success,
    /// deepsearch.toml already exists and --force was not given
    AlreadyExists,
    /// An error occurred during initialization
    Error(String),
}

/// Configuration for the init command
pub struct InitConfig {
    /// Directory to initialize
    pub path: PathBuf,
    /// Overwrite existing files
    pub force: bool,
    /// LLM provider to configure (openai or ollama)
    pub provider: String,
}

/// Run the init command
pub fn run(config: InitConfig, output: &Output) -> InitResult {
    output.banner();
    output.header("Initializing deepsearch");

    let base_path = &config.path;
    if let Err(e) = fs::create_dir_all(base_path) {
        output.error(&format!("Failed to create {}: {}", base_path.display(), e));
        return InitResult::Error(e.to_string());
    }

    let config_path = base_path.join(DEFAULT_CONFIG_FILE);
    if config_path.exists() && !config.force {
        output.warning(&format!("{} already exists!", DEFAULT_CONFIG_FILE));
        output.hint("Use --force to overwrite existing files");
        return InitResult::AlreadyExists;
    }

    if let Err(e) = write_file(&config_path, &generate_config(&config.provider), config.force) {
        output.error(&format!("Failed to create {}: {}", DEFAULT_CONFIG_FILE, e));
        return InitResult::Error(e.to_string());
    }
    output.created("config", DEFAULT_CONFIG_FILE);

    let env_path = base_path.join(".env.example");
    match write_file(&env_path, ENV_EXAMPLE, config.force) {
        Ok(true) => output.created("env", ".env.example"),
        Ok(false) => output.skipped(".env.example", "already exists"),
        Err(e) => output.warning(&format!("Failed to create .env.example: {}", e)),
    }

    output.success("Project initialized");
    output.hint("Start a research run with:");
    output.command("deepsearch run \"What changed in the Rust 2024 edition?\"");
    InitResult::Success
}

/// Write `content` unless the file exists and `force` is false.
/// Returns whether the file was written.
fn write_file(path: &Path, content: &str, force: bool) -> std::io::Result<bool> {
    if path.exists() && !force {
        return Ok(false);
    }
    fs::write(path, content)?;
    Ok(true)
}

const ENV_EXAMPLE: &str = "\
# Copy to .env and fill in
OPENAI_API_KEY=sk-...
# RUST_LOG=deepsearch=debug
";

fn generate_config(provider: &str) -> String {
    let (provider_block, model) = if provider.eq_ignore_ascii_case("ollama") {
        (
            "[providers.local]\ntype = \"ollama\"\nbase_url = \"http://localhost:11434\"\n",
            "provider = \"local\"\nmodel = \"qwen2.5:14b\"",
        )
    } else {
        (
            "[providers.openai]\ntype = \"openai\"\napi_key_env = \"OPENAI_API_KEY\"\napi_base = \"https://api.openai.com/v1\"\n",
            "provider = \"openai\"\nmodel = \"gpt-4o-mini\"",
        )
    };

    format!(
        r#"# deepsearch configuration

[logging]
# Overridden by RUST_LOG when set
level = "info"
# "pretty" or "json"
format = "pretty"

{provider_block}
[models.default]
{model}
temperature = 0.2

[research]
model = "default"
# planner_model = "default"
# fixer_model = "default"
fix_retries = 3
allow_clarification = true
max_clarification_rounds = 3
plan_research = true
max_iterations = 3
max_concurrent_research_units = 3
researcher_timeout_secs = 600
# "fail_fast" or "partial_success"
delegation_policy = "fail_fast"
reflection = true
findings_prefix_chars = 1000
max_tool_rounds = 5
max_tool_errors = 6
tool_timeout_secs = 30

[tools]
search_results = 5
fetch_page = true
fetch_max_chars = 12000
"#
    )
}
