//! TOML-based configuration for deepsearch
//!
//! Providers, models, research budgets and tools are declared in a TOML file
//! (`deepsearch.toml`). Every field has a default, so an empty file (or no
//! file at all) yields a working OpenAI setup reading `OPENAI_API_KEY`.

use crate::llm::{
    FixingStructuredClient, LLMClient, LlmStructuredClient, ModelParams, Provider,
    StructuredCompletionClient, ToolCallingConfig,
};
use crate::research::clarify::UserInteraction;
use crate::research::{
    DelegationPolicy, PipelineSettings, ResearchCoordinator, StageClients, SupervisorConfig,
};
use crate::tools::search::{FetchPageTool, SearchTool};
use crate::tools::think::ThinkTool;
use crate::tools::ToolRegistry;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// File looked up in the working directory when no path is given.
pub const DEFAULT_CONFIG_FILE: &str = "deepsearch.toml";

/// Root configuration structure loaded from deepsearch.toml
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeepSearchConfig {
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Named LLM provider configurations
    #[serde(default = "default_providers")]
    pub providers: BTreeMap<String, ProviderConfig>,

    /// Named model configurations that reference providers
    #[serde(default = "default_models")]
    pub models: BTreeMap<String, ModelConfig>,

    #[serde(default)]
    pub research: ResearchConfig,

    #[serde(default)]
    pub tools: ToolsConfig,
}

impl Default for DeepSearchConfig {
    fn default() -> Self {
        Self {
            logging: LoggingConfig::default(),
            providers: default_providers(),
            models: default_models(),
            research: ResearchConfig::default(),
            tools: ToolsConfig::default(),
        }
    }
}

fn default_providers() -> BTreeMap<String, ProviderConfig> {
    BTreeMap::from([(
        "openai".to_string(),
        ProviderConfig::OpenAI {
            api_key_env: default_openai_key_env(),
            api_base: default_openai_base(),
        },
    )])
}

fn default_models() -> BTreeMap<String, ModelConfig> {
    BTreeMap::from([(
        default_model_name(),
        ModelConfig {
            provider: "openai".to_string(),
            model: "gpt-4o-mini".to_string(),
            temperature: None,
            max_tokens: None,
        },
    )])
}

// ============= Logging Configuration =============

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default filter directive; `RUST_LOG` takes precedence.
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default)]
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

// ============= Provider Configuration =============

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ProviderConfig {
    Ollama {
        #[serde(default = "default_ollama_url")]
        base_url: String,
    },
    OpenAI {
        /// Environment variable containing API key
        #[serde(default = "default_openai_key_env")]
        api_key_env: String,
        #[serde(default = "default_openai_base")]
        api_base: String,
    },
}

fn default_ollama_url() -> String {
    "http://localhost:11434".to_string()
}

fn default_openai_base() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_openai_key_env() -> String {
    "OPENAI_API_KEY".to_string()
}

// ============= Model Configuration =============

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Reference to a provider name defined in [providers]
    pub provider: String,

    /// Model name/identifier to use with the provider
    pub model: String,

    pub temperature: Option<f32>,

    pub max_tokens: Option<u32>,
}

impl ModelConfig {
    fn params(&self) -> ModelParams {
        ModelParams {
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        }
    }
}

// ============= Research Configuration =============

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResearchConfig {
    /// Model used by every stage unless overridden below
    #[serde(default = "default_model_name")]
    pub model: String,

    /// Model for the planner (defaults to `model`)
    pub planner_model: Option<String>,

    /// Model repairing invalid structured output (defaults to `model`)
    pub fixer_model: Option<String>,

    #[serde(default = "default_fix_retries")]
    pub fix_retries: usize,

    #[serde(default = "default_true")]
    pub allow_clarification: bool,

    #[serde(default = "default_clarification_rounds")]
    pub max_clarification_rounds: usize,

    #[serde(default = "default_true")]
    pub plan_research: bool,

    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,

    #[serde(default = "default_max_concurrent")]
    pub max_concurrent_research_units: usize,

    #[serde(default = "default_researcher_timeout")]
    pub researcher_timeout_secs: u64,

    #[serde(default)]
    pub delegation_policy: DelegationPolicy,

    /// Log a short supervisor reflection after each iteration
    #[serde(default = "default_true")]
    pub reflection: bool,

    #[serde(default = "default_findings_prefix")]
    pub findings_prefix_chars: usize,

    #[serde(default = "default_max_tool_rounds")]
    pub max_tool_rounds: usize,

    #[serde(default = "default_max_tool_errors")]
    pub max_tool_errors: usize,

    #[serde(default = "default_tool_timeout")]
    pub tool_timeout_secs: u64,
}

fn default_model_name() -> String {
    "default".to_string()
}

fn default_fix_retries() -> usize {
    3
}

fn default_true() -> bool {
    true
}

fn default_clarification_rounds() -> usize {
    3
}

fn default_max_iterations() -> usize {
    3
}

fn default_max_concurrent() -> usize {
    3
}

fn default_researcher_timeout() -> u64 {
    600
}

fn default_findings_prefix() -> usize {
    1000
}

fn default_max_tool_rounds() -> usize {
    5
}

fn default_max_tool_errors() -> usize {
    6
}

fn default_tool_timeout() -> u64 {
    30
}

impl Default for ResearchConfig {
    fn default() -> Self {
        Self {
            model: default_model_name(),
            planner_model: None,
            fixer_model: None,
            fix_retries: default_fix_retries(),
            allow_clarification: true,
            max_clarification_rounds: default_clarification_rounds(),
            plan_research: true,
            max_iterations: default_max_iterations(),
            max_concurrent_research_units: default_max_concurrent(),
            researcher_timeout_secs: default_researcher_timeout(),
            delegation_policy: DelegationPolicy::default(),
            reflection: true,
            findings_prefix_chars: default_findings_prefix(),
            max_tool_rounds: default_max_tool_rounds(),
            max_tool_errors: default_max_tool_errors(),
            tool_timeout_secs: default_tool_timeout(),
        }
    }
}

// ============= Tool Configuration =============

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolsConfig {
    #[serde(default = "default_search_results")]
    pub search_results: usize,

    #[serde(default = "default_true")]
    pub fetch_page: bool,

    #[serde(default = "default_fetch_max_chars")]
    pub fetch_max_chars: usize,
}

fn default_search_results() -> usize {
    5
}

fn default_fetch_max_chars() -> usize {
    12_000
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            search_results: default_search_results(),
            fetch_page: true,
            fetch_max_chars: default_fetch_max_chars(),
        }
    }
}

// ============= Configuration Loading & Validation =============

/// Errors that can occur during configuration loading
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Configuration file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Failed to read configuration file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Failed to serialize configuration: {0}")]
    SerializeError(#[from] toml::ser::Error),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Environment variable '{0}' referenced in config is not set")]
    MissingEnvVar(String),

    #[error("Provider '{0}' referenced by model '{1}' does not exist")]
    MissingProvider(String, String),

    #[error("Model '{0}' referenced by '{1}' does not exist")]
    MissingModel(String, String),
}

impl DeepSearchConfig {
    /// Load and validate configuration from a TOML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let config = Self::load_unvalidated(path)?;
        config.validate()?;
        Ok(config)
    }

    /// Parse a file without checking references or the environment.
    pub fn load_unvalidated<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.to_path_buf()));
        }

        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Render the effective configuration as TOML.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Validate the configuration for internal consistency and env var availability
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (model_name, model_config) in &self.models {
            if !self.providers.contains_key(&model_config.provider) {
                return Err(ConfigError::MissingProvider(
                    model_config.provider.clone(),
                    model_name.clone(),
                ));
            }
        }

        for (stage, model) in self.stage_models() {
            let model_config = self
                .models
                .get(model)
                .ok_or_else(|| ConfigError::MissingModel(model.to_string(), stage.to_string()))?;
            if let Some(ProviderConfig::OpenAI { api_key_env, .. }) =
                self.providers.get(&model_config.provider)
            {
                self.validate_env_var(api_key_env)?;
            }
        }

        let research = &self.research;
        let budgets = [
            ("research.max_iterations", research.max_iterations),
            (
                "research.max_concurrent_research_units",
                research.max_concurrent_research_units,
            ),
            ("research.max_tool_rounds", research.max_tool_rounds),
            ("research.max_tool_errors", research.max_tool_errors),
            ("research.max_clarification_rounds", research.max_clarification_rounds),
            ("tools.search_results", self.tools.search_results),
        ];
        for (name, value) in budgets {
            if value == 0 {
                return Err(ConfigError::ValidationError(format!("{} must be at least 1", name)));
            }
        }
        if research.researcher_timeout_secs == 0 || research.tool_timeout_secs == 0 {
            return Err(ConfigError::ValidationError(
                "timeouts must be at least 1 second".to_string(),
            ));
        }

        Ok(())
    }

    /// (stage, model name) pairs actually used by the pipeline.
    fn stage_models(&self) -> Vec<(&'static str, &str)> {
        let research = &self.research;
        let mut models = vec![("research.model", research.model.as_str())];
        if let Some(planner) = &research.planner_model {
            models.push(("research.planner_model", planner.as_str()));
        }
        if let Some(fixer) = &research.fixer_model {
            models.push(("research.fixer_model", fixer.as_str()));
        }
        models
    }

    fn validate_env_var(&self, name: &str) -> Result<(), ConfigError> {
        std::env::var(name).map_err(|_| ConfigError::MissingEnvVar(name.to_string()))?;
        Ok(())
    }

    /// Get provider by name
    pub fn get_provider(&self, name: &str) -> Option<&ProviderConfig> {
        self.providers.get(name)
    }

    /// Get model by name
    pub fn get_model(&self, name: &str) -> Option<&ModelConfig> {
        self.models.get(name)
    }

    /// Resolve a model name into a concrete provider, reading API keys from the environment.
    pub fn provider_for_model(&self, name: &str) -> Result<Provider, ConfigError> {
        let model = self
            .get_model(name)
            .ok_or_else(|| ConfigError::MissingModel(name.to_string(), "pipeline".to_string()))?;
        let provider = self
            .get_provider(&model.provider)
            .ok_or_else(|| ConfigError::MissingProvider(model.provider.clone(), name.to_string()))?;

        Ok(match provider {
            ProviderConfig::Ollama { base_url } => Provider::Ollama {
                base_url: base_url.clone(),
                model: model.model.clone(),
                params: model.params(),
            },
            ProviderConfig::OpenAI {
                api_key_env,
                api_base,
            } => Provider::OpenAI {
                api_key: std::env::var(api_key_env)
                    .map_err(|_| ConfigError::MissingEnvVar(api_key_env.clone()))?,
                api_base: api_base.clone(),
                model: model.model.clone(),
                params: model.params(),
            },
        })
    }

    /// Stage budgets and toggles.
    pub fn pipeline_settings(&self) -> PipelineSettings {
        let research = &self.research;
        PipelineSettings {
            allow_clarification: research.allow_clarification,
            max_clarification_rounds: research.max_clarification_rounds,
            plan_research: research.plan_research,
            supervisor: SupervisorConfig {
                max_iterations: research.max_iterations,
                max_concurrent_research_units: research.max_concurrent_research_units,
                researcher_timeout: Duration::from_secs(research.researcher_timeout_secs),
                delegation_policy: research.delegation_policy,
                reflection: research.reflection,
                findings_prefix_chars: research.findings_prefix_chars,
            },
            tool_calling: ToolCallingConfig {
                max_tool_rounds: research.max_tool_rounds,
                tool_timeout: Duration::from_secs(research.tool_timeout_secs),
                max_tool_errors: research.max_tool_errors,
            },
        }
    }

    /// Registry with the configured research tools.
    pub fn tool_registry(&self) -> ToolRegistry {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(SearchTool::with_default_results(
            self.tools.search_results,
        )));
        if self.tools.fetch_page {
            registry.register(Arc::new(FetchPageTool::with_max_chars(
                self.tools.fetch_max_chars,
            )));
        }
        registry.register(Arc::new(ThinkTool));
        registry
    }

    /// Build the whole pipeline from this configuration.
    pub fn build_coordinator(
        &self,
        user: Arc<dyn UserInteraction>,
    ) -> Result<ResearchCoordinator, ConfigError> {
        let research = &self.research;
        let main = self.client_for(&research.model)?;
        let fixer = match &research.fixer_model {
            Some(name) => self.client_for(name)?,
            None => main.clone(),
        };
        let structured = self.structured_client(main.clone(), fixer.clone());
        let planner = match &research.planner_model {
            Some(name) => self.structured_client(self.client_for(name)?, fixer),
            None => structured.clone(),
        };

        let clients = StageClients {
            structured,
            planner,
            research: main,
        };
        Ok(ResearchCoordinator::from_parts(
            clients,
            Arc::new(self.tool_registry()),
            user,
            self.pipeline_settings(),
        ))
    }

    fn client_for(&self, model: &str) -> Result<Arc<dyn LLMClient>, ConfigError> {
        Ok(Arc::from(self.provider_for_model(model)?.create_client()))
    }

    fn structured_client(
        &self,
        client: Arc<dyn LLMClient>,
        fixer: Arc<dyn LLMClient>,
    ) -> Arc<dyn StructuredCompletionClient> {
        Arc::new(FixingStructuredClient::new(
            Arc::new(LlmStructuredClient::new(client)),
            fixer,
            self.research.fix_retries,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_config() -> String {
        r#"
[logging]
level = "debug"
format = "json"

[providers.local]
type = "ollama"
base_url = "http://localhost:11434"

[models.default]
provider = "local"
model = "qwen2.5:7b"
temperature = 0.2
max_tokens = 4096

[models.big]
provider = "local"
model = "qwen2.5:32b"

[research]
model = "default"
planner_model = "big"
max_iterations = 2
max_concurrent_research_units = 4
delegation_policy = "partial_success"
reflection = false

[tools]
search_results = 8
fetch_page = false
"#
        .to_string()
    }

    #[test]
    fn test_parse_config() {
        let config: DeepSearchConfig =
            toml::from_str(&create_test_config()).expect("Failed to parse config");

        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.logging.format, LogFormat::Json);
        assert!(config.providers.contains_key("local"));
        assert_eq!(config.research.planner_model.as_deref(), Some("big"));
        assert_eq!(config.research.delegation_policy, DelegationPolicy::PartialSuccess);
        assert_eq!(config.research.max_tool_errors, 6);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_empty_file_uses_defaults() {
        let config: DeepSearchConfig = toml::from_str("").unwrap();
        assert_eq!(config, DeepSearchConfig::default());
        assert_eq!(config.research.max_iterations, 3);
        assert_eq!(config.research.max_clarification_rounds, 3);
        assert_eq!(config.research.findings_prefix_chars, 1000);
        assert!(config.get_model("default").is_some());
    }

    #[test]
    fn test_pipeline_settings() {
        let config: DeepSearchConfig = toml::from_str(&create_test_config()).unwrap();
        let settings = config.pipeline_settings();

        assert_eq!(settings.supervisor.max_iterations, 2);
        assert_eq!(settings.supervisor.max_concurrent_research_units, 4);
        assert!(!settings.supervisor.reflection);
        assert_eq!(settings.tool_calling.max_tool_rounds, 5);
        assert_eq!(settings.tool_calling.tool_timeout, Duration::from_secs(30));
    }

    #[test]
    fn test_tool_registry_respects_toggles() {
        let config: DeepSearchConfig = toml::from_str(&create_test_config()).unwrap();
        let registry = config.tool_registry();
        assert!(registry.has_tool("web_search"));
        assert!(registry.has_tool("think"));
        assert!(!registry.has_tool("fetch_page"));
    }

    #[test]
    fn test_validation_missing_provider() {
        let content = r#"
[models.default]
provider = "nowhere"
model = "x"
"#;
        let config: DeepSearchConfig = toml::from_str(content).unwrap();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::MissingProvider(provider, model)) if provider == "nowhere" && model == "default"
        ));
    }

    #[test]
    fn test_validation_missing_model() {
        let content = r#"
[providers.local]
type = "ollama"

[models.default]
provider = "local"
model = "x"

[research]
planner_model = "ghost"
"#;
        let config: DeepSearchConfig = toml::from_str(content).unwrap();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::MissingModel(model, _)) if model == "ghost"
        ));
    }

    #[test]
    fn test_validation_missing_env_var() {
        let content = r#"
[providers.remote]
type = "openai"
api_key_env = "DEEPSEARCH_TEST_UNSET_KEY"

[models.default]
provider = "remote"
model = "gpt-4o"
"#;
        let config: DeepSearchConfig = toml::from_str(content).unwrap();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::MissingEnvVar(name)) if name == "DEEPSEARCH_TEST_UNSET_KEY"
        ));
    }

    #[test]
    fn test_validation_zero_budget() {
        let mut config: DeepSearchConfig = toml::from_str(&create_test_config()).unwrap();
        config.research.max_concurrent_research_units = 0;
        assert!(matches!(config.validate(), Err(ConfigError::ValidationError(_))));
    }

    #[test]
    fn test_provider_for_model() {
        let config: DeepSearchConfig = toml::from_str(&create_test_config()).unwrap();
        let provider = config.provider_for_model("default").unwrap();
        assert_eq!(provider.name(), "Ollama");
        assert_eq!(provider.model(), "qwen2.5:7b");
        assert!(config.provider_for_model("missing").is_err());
    }

    #[test]
    fn test_to_toml_round_trips() {
        let config: DeepSearchConfig = toml::from_str(&create_test_config()).unwrap();
        let rendered = config.to_toml().unwrap();
        let reparsed: DeepSearchConfig = toml::from_str(&rendered).unwrap();
        assert_eq!(reparsed, config);
    }
}
