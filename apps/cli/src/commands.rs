//! CLI command definitions, routing, and tracing setup.

use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use flowsmith_core::{FailureReport, FlowOrchestrator};
use flowsmith_knowledge::JsonFileSource;
use flowsmith_shared::{AppConfig, expand_home, init_config, load_config, save_config};
use flowsmith_storage::Storage;
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use tracing::info;

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// Flowsmith: describe a flow in plain language, get a component graph.
#[derive(Parser)]
#[command(
    name = "flowsmith",
    version,
    about = "Turn natural-language instructions into validated component flows.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// User whose credentials are used (defaults to `defaults.user_id`).
    #[arg(long, global = true)]
    pub user: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Interpret an instruction without building a flow.
    Interpret {
        /// The instruction, e.g. "chat input into an OpenAI model".
        instruction: String,

        /// Oracle provider (defaults to the configured provider).
        #[arg(short, long)]
        provider: Option<String>,

        /// Model name passed to the provider.
        #[arg(short, long)]
        model: Option<String>,
    },

    /// Interpret an instruction and build its flow graph.
    Build {
        /// The instruction to build.
        instruction: String,

        #[arg(short, long)]
        provider: Option<String>,

        #[arg(short, long)]
        model: Option<String>,
    },

    /// Answer a clarification question.
    Clarify {
        /// Question id, e.g. `component_0_name`.
        question_id: String,

        /// The answer.
        response: String,

        /// The instruction the question was asked about.
        #[arg(long)]
        instruction: String,
    },

    /// Show a component's descriptor.
    Component { category: String, name: String },

    /// List components a component can feed into.
    Compatible { category: String, name: String },

    /// Oracle provider management.
    Providers {
        #[command(subcommand)]
        action: ProvidersAction,
    },

    /// Knowledge base management.
    Kb {
        #[command(subcommand)]
        action: KbAction,
    },

    /// Saved credential management.
    Credentials {
        #[command(subcommand)]
        action: CredentialsAction,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Provider subcommands.
#[derive(Subcommand)]
pub(crate) enum ProvidersAction {
    /// List registered providers.
    List,
    /// Make a provider the default and save it to the config file.
    Set {
        provider: String,

        #[arg(short, long)]
        model: Option<String>,
    },
}

/// Knowledge base subcommands.
#[derive(Subcommand)]
pub(crate) enum KbAction {
    /// Rebuild the knowledge base from the registry file.
    Refresh,
    /// Show knowledge base size.
    Stats,
}

/// Credential subcommands.
#[derive(Subcommand)]
pub(crate) enum CredentialsAction {
    /// Save a credential, e.g. `OPENAI_API_KEY`.
    Set { name: String, value: String },
    /// List saved credential names.
    List,
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "flowsmith=info",
        1 => "flowsmith=debug",
        _ => "flowsmith=trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .with_writer(std::io::stderr)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    if let Command::Config { action } = &cli.command {
        return match action {
            ConfigAction::Init => cmd_config_init(),
            ConfigAction::Show => cmd_config_show(),
        };
    }

    let config = load_config()?;
    let user = cli.user.unwrap_or_else(|| config.defaults.user_id.clone());
    let ctx = Context::open(config, user).await?;

    match cli.command {
        Command::Interpret {
            instruction,
            provider,
            model,
        } => cmd_interpret(&ctx, &instruction, provider.as_deref(), model.as_deref()).await,
        Command::Build {
            instruction,
            provider,
            model,
        } => cmd_build(&ctx, &instruction, provider.as_deref(), model.as_deref()).await,
        Command::Clarify {
            question_id,
            response,
            instruction,
        } => print_json(&ctx.orchestrator.process_clarification_response(
            &question_id,
            &response,
            &instruction,
        )),
        Command::Component { category, name } => {
            let info = ctx.orchestrator.get_component_info(&category, &name).await;
            if info.is_empty() {
                return Err(eyre!("no component '{name}' in category '{category}'"));
            }
            print_json(&info)
        }
        Command::Compatible { category, name } => {
            print_json(&ctx.orchestrator.get_compatible_components(&category, &name).await)
        }
        Command::Providers { action } => match action {
            ProvidersAction::List => print_json(&ctx.orchestrator.list_providers()),
            ProvidersAction::Set { provider, model } => {
                cmd_providers_set(ctx, &provider, model.as_deref())
            }
        },
        Command::Kb { action } => match action {
            KbAction::Refresh => {
                let spinner = Spinner::start("Rebuilding knowledge base");
                let stats = ctx.orchestrator.refresh_knowledge_base().await;
                spinner.finish();
                print_json(&stats?)
            }
            KbAction::Stats => print_json(&ctx.orchestrator.initialize().await?),
        },
        Command::Credentials { action } => match action {
            CredentialsAction::Set { name, value } => {
                ctx.orchestrator.save_credential(&ctx.user, &name, &value).await?;
                println!("Saved {name} for {}", ctx.user);
                Ok(())
            }
            CredentialsAction::List => {
                for name in ctx.orchestrator.list_credential_names(&ctx.user).await? {
                    println!("{name}");
                }
                Ok(())
            }
        },
        Command::Config { .. } => Ok(()),
    }
}

// ---------------------------------------------------------------------------
// Wiring
// ---------------------------------------------------------------------------

/// Everything a command needs, built from the loaded config.
struct Context {
    config: AppConfig,
    user: String,
    orchestrator: FlowOrchestrator,
}

impl Context {
    async fn open(config: AppConfig, user: String) -> Result<Self> {
        let registry_path = expand_home(&config.registry.path);
        let db_path = expand_home(&config.storage.db_path);
        info!(registry = %registry_path.display(), db = %db_path.display(), "opening flowsmith");

        let storage = Storage::open(&db_path).await?;
        let orchestrator = FlowOrchestrator::from_config(
            &config,
            Arc::new(JsonFileSource::new(registry_path)),
            Arc::new(storage),
        )?;

        Ok(Self {
            config,
            user,
            orchestrator,
        })
    }
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

async fn cmd_interpret(
    ctx: &Context,
    instruction: &str,
    provider: Option<&str>,
    model: Option<&str>,
) -> Result<()> {
    let spinner = Spinner::start("Asking the oracle");
    let result = ctx
        .orchestrator
        .interpret_instruction(&ctx.user, instruction, provider, model)
        .await;
    spinner.finish();

    print_json(&result)?;
    check_failure(result.failure.as_ref())
}

async fn cmd_build(
    ctx: &Context,
    instruction: &str,
    provider: Option<&str>,
    model: Option<&str>,
) -> Result<()> {
    let spinner = Spinner::start("Asking the oracle");
    let result = ctx
        .orchestrator
        .build_flow_from_instruction(&ctx.user, instruction, provider, model)
        .await;
    spinner.finish();

    print_json(&result)?;
    if result.interpretation.clarification_needed && result.failure.is_none() {
        eprintln!(
            "{} clarification question(s); answer them with `flowsmith clarify`.",
            result.interpretation.clarification_questions.len()
        );
    }
    check_failure(result.failure.as_ref())
}

fn cmd_providers_set(mut ctx: Context, provider: &str, model: Option<&str>) -> Result<()> {
    let selection = ctx.orchestrator.set_provider(provider, model)?;

    ctx.config
        .select_provider(&selection.provider, selection.model.as_deref());
    let path = save_config(&ctx.config)?;

    println!("Default provider set to {} ({})", selection.provider, path.display());
    Ok(())
}

fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

fn cmd_config_show() -> Result<()> {
    let config: AppConfig = load_config()?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}

// ---------------------------------------------------------------------------
// Output helpers
// ---------------------------------------------------------------------------

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn check_failure(failure: Option<&FailureReport>) -> Result<()> {
    match failure {
        Some(failure) => Err(eyre!("{}", failure.message)),
        None => Ok(()),
    }
}

/// Spinner shown on stderr while a slow call runs.
struct Spinner {
    bar: ProgressBar,
}

impl Spinner {
    fn start(message: &str) -> Self {
        let bar = ProgressBar::new_spinner();
        let style = ProgressStyle::with_template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]);
        bar.set_style(style);
        bar.set_message(message.to_string());
        bar.enable_steady_tick(Duration::from_millis(80));
        Self { bar }
    }

    fn finish(self) {
        self.bar.finish_and_clear();
    }
}
