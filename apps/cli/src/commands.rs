//! CLI command definitions, routing, and tracing setup.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use futures::StreamExt;
use indicatif::{ProgressBar, ProgressStyle};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::{info, warn};

use recipefinder_acquisition::HttpRecipeSource;
use recipefinder_core::{
    NO_RESULTS_MESSAGE, Pipeline, PipelineEvent, PipelineOptions, recommendation_pipeline,
    save_markdown,
};
use recipefinder_generation::ChatCompletionsClient;
use recipefinder_shared::{
    AppConfig, Phase, PipelineState, ProgressEvent, init_config, load_config, validate_api_key,
};

/// Words that end an interactive chat session.
const EXIT_WORDS: [&str; 4] = ["exit", "quit", "bye", "退出"];

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// RecipeFinder — recipe recommendations from the ingredients you have.
#[derive(Parser)]
#[command(
    name = "recipefinder",
    version,
    about = "Find recipes that match the ingredients you have and what you feel like eating.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Output overrides shared by `find` and `chat`.
#[derive(clap::Args, Debug, Clone, Default)]
pub(crate) struct RunArgs {
    /// Directory for saved markdown files (overrides config).
    #[arg(short, long)]
    pub out: Option<PathBuf>,

    /// Skip the polish stage.
    #[arg(long)]
    pub no_polish: bool,

    /// Do not save a markdown file.
    #[arg(long)]
    pub no_save: bool,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Answer one request and exit.
    Find {
        /// What you have and what you want, in your own words.
        query: String,

        #[command(flatten)]
        args: RunArgs,
    },

    /// Interactive session: one request per line.
    Chat {
        #[command(flatten)]
        args: RunArgs,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
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
        0 => "recipefinder=info",
        1 => "recipefinder=debug",
        _ => "recipefinder=trace",
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
    match cli.command {
        Command::Find { query, args } => cmd_find(&query, &args).await,
        Command::Chat { args } => cmd_chat(&args).await,
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init().await,
            ConfigAction::Show => cmd_config_show().await,
        },
    }
}

/// Resolved settings for one session.
struct Session {
    pipeline: Pipeline,
    output_dir: PathBuf,
    save: bool,
}

impl Session {
    /// Load config, apply flag overrides, and build the pipeline.
    fn from_args(args: &RunArgs) -> Result<Self> {
        let mut config = load_config()?;
        apply_overrides(&mut config, args);

        validate_api_key(&config)?;

        let generation = ChatCompletionsClient::from_config(&config.generation)?;
        let source = HttpRecipeSource::new(config.acquisition.clone())?;

        let pipeline = recommendation_pipeline(
            Arc::new(generation),
            Arc::new(source),
            PipelineOptions::from_config(&config),
        );

        Ok(Self {
            pipeline,
            output_dir: PathBuf::from(&config.output.dir),
            save: config.output.save_markdown,
        })
    }

    /// Run one request with a spinner, print the answer, save the artifact.
    async fn answer(&self, query: &str) -> Result<()> {
        info!(query, "finding recipes");

        let state = run_with_progress(&self.pipeline, query).await?;

        if let Some(failure) = &state.failure {
            eprintln!("\n  Sorry, {}.\n", failure.user_message());
            return Ok(());
        }

        match state.display_text() {
            Some(text) => println!("\n{text}\n"),
            None => println!("\n{NO_RESULTS_MESSAGE}\n"),
        }

        if self.save {
            save_artifact(&state, &self.output_dir);
        }

        Ok(())
    }
}

fn apply_overrides(config: &mut AppConfig, args: &RunArgs) {
    if let Some(out) = &args.out {
        config.output.dir = out.to_string_lossy().into_owned();
    }
    if args.no_polish {
        config.output.polish = false;
    }
    if args.no_save {
        config.output.save_markdown = false;
    }
}

/// Drive the progress stream to its terminal snapshot.
async fn run_with_progress(pipeline: &Pipeline, query: &str) -> Result<Arc<PipelineState>> {
    let mut progress = CliProgress::new()?;
    let mut events = pipeline.run(PipelineState::new(query));

    while let Some(event) = events.next().await {
        progress.update(&event);
        if event.terminal {
            progress.finish();
            return Ok(event.state);
        }
    }

    progress.finish();
    Err(eyre!("pipeline ended without a result"))
}

/// Saving is best-effort: a failure is reported, the answer still stands.
fn save_artifact(state: &PipelineState, output_dir: &Path) {
    match save_markdown(state, output_dir) {
        Ok(Some(path)) => println!("  Saved to {}", path.display()),
        Ok(None) => {}
        Err(e) => {
            warn!(error = %e, "failed to save recommendations");
            eprintln!("  Could not save recommendations: {e}");
        }
    }
}

async fn cmd_find(query: &str, args: &RunArgs) -> Result<()> {
    let session = Session::from_args(args)?;
    session.answer(query).await
}

async fn cmd_chat(args: &RunArgs) -> Result<()> {
    let session = Session::from_args(args)?;

    println!("Tell me what ingredients you have and what you'd like to eat.");
    println!("Type 'exit' to leave.\n");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();

    loop {
        stdout.write_all(b"> ").await?;
        stdout.flush().await?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let input = line.trim();

        if input.is_empty() {
            continue;
        }
        if is_exit_word(input) {
            println!("Bye, enjoy your meal!");
            break;
        }

        session.answer(input).await?;
    }

    Ok(())
}

fn is_exit_word(input: &str) -> bool {
    EXIT_WORDS.iter().any(|w| input.eq_ignore_ascii_case(w))
}

async fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

async fn cmd_config_show() -> Result<()> {
    let config: AppConfig = load_config()?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// Spinner driven by pipeline events.
struct CliProgress {
    spinner: ProgressBar,
    /// Progress log entries already shown.
    seen: usize,
}

impl CliProgress {
    fn new() -> Result<Self> {
        let spinner = ProgressBar::new_spinner();
        spinner.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {msg}")?
                .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
        );
        spinner.enable_steady_tick(std::time::Duration::from_millis(80));
        Ok(Self { spinner, seen: 0 })
    }

    fn update(&mut self, event: &PipelineEvent) {
        let log = event.state.progress_log();
        for line in progress_lines(&log[self.seen.min(log.len())..], event.status) {
            self.spinner.println(line);
        }
        self.seen = log.len();
        self.spinner.set_message(format!("{}...", event.status));
    }

    fn finish(&self) {
        self.spinner.finish_and_clear();
    }
}

/// Lines to print for log entries recorded since the previous event.
fn progress_lines(entries: &[ProgressEvent], status: &str) -> Vec<String> {
    entries
        .iter()
        .filter_map(|entry| {
            let detail = entry.detail.as_deref().unwrap_or_default();
            match entry.phase {
                Phase::Skipped => Some(format!("  - skipped: {detail}")),
                Phase::End => Some(format!("  ✓ {status} ({detail})")),
                _ => None,
            }
        })
        .collect()
}
