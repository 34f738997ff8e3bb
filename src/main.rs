use anyhow::{bail, Context};
use deepsearch::{
    cli::{
        init::{self, InitConfig, InitResult},
        interaction::TerminalInteraction,
        output::Output,
        Cli, Commands, RunArgs,
    },
    research::DelegationPolicy,
    types::PipelineError,
    utils::{
        logging::init_logging,
        toml_config::{DeepSearchConfig, ProviderConfig, DEFAULT_CONFIG_FILE},
    },
};
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    let cli = Cli::parse_args();
    let output = if cli.no_color {
        Output::no_color()
    } else {
        Output::new()
    };

    if let Err(e) = run(cli, output).await {
        match e.downcast_ref::<PipelineError>() {
            Some(err) => output.error(&format!(
                "Research failed during {} ({}): {}",
                err.stage(),
                err.kind(),
                err
            )),
            None => output.error(&format!("{:#}", e)),
        }
        std::process::exit(1);
    }
}

async fn run(cli: Cli, output: Output) -> anyhow::Result<()> {
    let command = cli.command();

    if let Commands::Init {
        path,
        force,
        provider,
    } = command
    {
        return match init::run(
            InitConfig {
                path,
                force,
                provider,
            },
            &output,
        ) {
            InitResult::Success | InitResult::AlreadyExists => Ok(()),
            InitResult::Error(e) => bail!("init failed: {}", e),
        };
    }

    let (config, source) = load_config(cli.config.as_deref())?;
    init_logging(&config.logging, cli.verbose, cli.json_logs);
    match &source {
        Some(path) => tracing::debug!(path = %path.display(), "Loaded configuration"),
        None => tracing::debug!("No configuration file found, using defaults"),
    }

    match command {
        Commands::Run(args) => research(config, args, output).await,
        Commands::Config { full, validate } => show_config(&config, source, full, validate, output),
        Commands::Init { .. } => Ok(()),
    }
}

/// Load the explicit config path, else `./deepsearch.toml` when present, else defaults.
fn load_config(path: Option<&Path>) -> anyhow::Result<(DeepSearchConfig, Option<PathBuf>)> {
    let path = match path {
        Some(p) => p.to_path_buf(),
        None => {
            let default = PathBuf::from(DEFAULT_CONFIG_FILE);
            if !default.exists() {
                return Ok((DeepSearchConfig::default(), None));
            }
            default
        }
    };
    let config = DeepSearchConfig::load_unvalidated(&path)
        .with_context(|| format!("loading {}", path.display()))?;
    Ok((config, Some(path)))
}

async fn research(
    mut config: DeepSearchConfig,
    args: RunArgs,
    output: Output,
) -> anyhow::Result<()> {
    let research = &mut config.research;
    if args.no_clarify {
        research.allow_clarification = false;
    }
    if args.no_plan {
        research.plan_research = false;
    }
    if let Some(n) = args.max_iterations {
        research.max_iterations = n;
    }
    if let Some(n) = args.max_concurrent {
        research.max_concurrent_research_units = n;
    }
    if args.partial {
        research.delegation_policy = DelegationPolicy::PartialSuccess;
    }
    config.validate()?;

    let query = match args.query_text() {
        Some(q) => q,
        None => {
            let q = output
                .prompt("What would you like to research?")
                .context("reading the research request")?;
            if q.is_empty() {
                bail!("no research request given");
            }
            q
        }
    };

    let user = Arc::new(TerminalInteraction::new(output));
    let coordinator = config.build_coordinator(user)?;

    output.info("Researching, this can take several minutes...");
    let report = coordinator.run(&query).await?;
    output.report(&report);

    if let Some(path) = args.output {
        std::fs::write(&path, &report.content)
            .with_context(|| format!("writing report to {}", path.display()))?;
        output.created("report", &path.display().to_string());
    }
    Ok(())
}

fn show_config(
    config: &DeepSearchConfig,
    source: Option<PathBuf>,
    full: bool,
    validate: bool,
    output: Output,
) -> anyhow::Result<()> {
    if validate {
        config.validate()?;
        output.success("Configuration is valid");
    }

    if full {
        println!("{}", config.to_toml()?);
        return Ok(());
    }

    output.header("Configuration");
    let source = source
        .map(|p| p.display().to_string())
        .unwrap_or_else(|| "built-in defaults".to_string());
    output.kv("Source", &source);
    output.kv("Log level", &config.logging.level);

    output.header("Providers");
    for (name, provider) in &config.providers {
        let detail = match provider {
            ProviderConfig::Ollama { base_url } => format!("ollama @ {}", base_url),
            ProviderConfig::OpenAI {
                api_key_env,
                api_base,
            } => format!("openai @ {} (key from {})", api_base, api_key_env),
        };
        output.kv(name, &detail);
    }

    output.header("Models");
    for (name, model) in &config.models {
        output.kv(name, &format!("{}/{}", model.provider, model.model));
    }

    let research = &config.research;
    output.header("Research");
    output.kv("Model", &research.model);
    output.kv("Clarification", &research.allow_clarification.to_string());
    output.kv("Planning", &research.plan_research.to_string());
    output.kv("Max iterations", &research.max_iterations.to_string());
    output.kv(
        "Concurrent researchers",
        &research.max_concurrent_research_units.to_string(),
    );
    output.kv("Delegation policy", &format!("{:?}", research.delegation_policy));
    output.kv("Tool rounds", &research.max_tool_rounds.to_string());
    Ok(())
}
