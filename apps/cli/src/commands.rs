//! CLI command definitions, routing, and tracing setup.

use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use citesync_core::{
    BatchOptions, ConfirmPrompt, ProcessOptions, ProgressReporter, RecordPipeline, StreamHandler,
    WsTransport, generate_report, run_batch,
};
use citesync_crawler::HttpFetcher;
use citesync_shared::{AppConfig, RunStats, init_config, load_config, resolve_library};
use citesync_storage::ZoteroStore;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{info, warn};

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// citesync: clean and enrich Zotero records from Substack and LinkedIn.
#[derive(Parser)]
#[command(
    name = "citesync",
    version,
    about = "Clean URLs and enrich Zotero records saved from Substack and LinkedIn.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv).
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

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Process every web record in the library once.
    Run {
        /// Analyze only; nothing is written to the library.
        #[arg(long)]
        dry_run: bool,

        /// Write a Markdown change report (defaults to Changes_YYYYMMDD.md).
        #[arg(long, value_name = "FILE")]
        report: Option<Option<PathBuf>>,

        /// Skip the confirmation prompt.
        #[arg(short = 'y', long = "confirm")]
        confirm: bool,

        /// Reprocess records already tagged as processed.
        #[arg(short, long)]
        force: bool,

        /// Only clean URLs of non-LinkedIn records.
        #[arg(long, conflicts_with = "no_linkedin")]
        no_substack: bool,

        /// Only clean URLs of LinkedIn records.
        #[arg(long)]
        no_linkedin: bool,

        /// Load environment variables from this file.
        #[arg(long, value_name = "FILE")]
        env: Option<PathBuf>,
    },

    /// Subscribe to library changes and process them as they arrive.
    Stream {
        /// Load environment variables from this file.
        #[arg(long, value_name = "FILE")]
        env: Option<PathBuf>,
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
        0 => "citesync=info",
        1 => "citesync=debug",
        _ => "citesync=trace",
    };

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
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
        Command::Run {
            dry_run,
            report,
            confirm,
            force,
            no_substack,
            no_linkedin,
            env,
        } => {
            let process = ProcessOptions {
                force,
                skip_substack: no_substack,
                skip_linkedin: no_linkedin,
            };
            cmd_run(dry_run, report, confirm, process, env.as_deref()).await
        }
        Command::Stream { env } => cmd_stream(env.as_deref()).await,
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init().await,
            ConfigAction::Show => cmd_config_show().await,
        },
    }
}

/// Load a dotenv file: the given one must exist, `./.env` is optional.
fn load_env(path: Option<&Path>) -> Result<()> {
    match path {
        Some(p) => {
            dotenvy::from_path(p).map_err(|e| eyre!("cannot load env file '{}': {e}", p.display()))?;
            info!(path = %p.display(), "loaded environment file");
        }
        None => {
            if let Ok(p) = dotenvy::dotenv() {
                info!(path = %p.display(), "loaded environment file");
            }
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

async fn cmd_run(
    dry_run: bool,
    report: Option<Option<PathBuf>>,
    auto_confirm: bool,
    process: ProcessOptions,
    env: Option<&Path>,
) -> Result<()> {
    load_env(env)?;
    let config = load_config()?;
    let library = resolve_library(&config)?;

    let store = ZoteroStore::new(&config.store, &library)?;
    let fetcher = HttpFetcher::new(&config.fetch)?;
    let pipeline = RecordPipeline::new(&fetcher);

    let options = BatchOptions {
        dry_run,
        auto_confirm,
        process,
        ..BatchOptions::from_config(&config.batch)
    };

    info!(
        library = %library.topic(),
        dry_run,
        force = process.force,
        "starting batch run"
    );

    let progress = CliProgress::new();
    let prompt = StdinConfirm {
        bar: progress.bar.clone(),
    };
    let result = run_batch(&store, &pipeline, &options, &prompt, &progress).await?;

    if result.cancelled {
        progress.bar.finish_and_clear();
        println!("Operation cancelled.");
        return Ok(());
    }

    print_summary(&result.stats, result.total, dry_run);

    if let Some(path) = report {
        if result.changes.is_empty() {
            println!("  No changes to report.");
        } else {
            let written = generate_report(&result.changes, path.as_deref())?;
            println!("  Report: {}", written.display());
        }
        println!();
    }

    Ok(())
}

fn print_summary(stats: &RunStats, total: usize, dry_run: bool) {
    println!();
    if dry_run {
        println!("  DRY RUN: no changes were written to the library.");
    }
    println!("  Records:          {total}");
    println!("  Processed:        {}", stats.processed);
    println!("  URLs cleaned:     {}", stats.urls_cleaned);
    println!("  Substack found:   {}", stats.substack_found);
    println!("  LinkedIn found:   {}", stats.linkedin_found);
    println!("  Updated:          {}", stats.updated);
    println!("  Errors:           {}", stats.errors);
    println!();
}

async fn cmd_stream(env: Option<&Path>) -> Result<()> {
    load_env(env)?;
    let config = load_config()?;
    let library = resolve_library(&config)?;

    let store = ZoteroStore::new(&config.store, &library)?;
    let fetcher = HttpFetcher::new(&config.fetch)?;
    let transport = WsTransport;

    info!(library = %library.topic(), endpoint = %config.stream.endpoint, "starting stream mode");

    let mut handler = StreamHandler::new(
        &store,
        RecordPipeline::new(&fetcher),
        &transport,
        library,
        &config.stream,
    );

    tokio::select! {
        _ = handler.run() => {}
        signal = tokio::signal::ctrl_c() => {
            if let Err(e) = signal {
                warn!(error = %e, "cannot listen for shutdown signal");
            }
            info!("shutting down stream handler");
        }
    }

    let stats = handler.stats();
    print_summary(stats, stats.processed, false);
    Ok(())
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

    match resolve_library(&config) {
        Ok(library) => println!("# resolved: {library:?}"),
        Err(e) => println!("# unresolved: {e}"),
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Terminal collaborators
// ---------------------------------------------------------------------------

/// Yes/no question on stdin. Anything but `y`/`yes` declines.
struct StdinConfirm {
    bar: ProgressBar,
}

impl ConfirmPrompt for StdinConfirm {
    fn confirm(&self, question: &str) -> bool {
        self.bar.suspend(|| {
            print!("{question}");
            if std::io::stdout().flush().is_err() {
                return false;
            }
            let mut answer = String::new();
            if std::io::stdin().lock().read_line(&mut answer).is_err() {
                return false;
            }
            matches!(answer.trim().to_lowercase().as_str(), "y" | "yes")
        })
    }
}

/// CLI progress reporter using an indicatif bar.
struct CliProgress {
    bar: ProgressBar,
}

impl CliProgress {
    fn new() -> Self {
        let bar = ProgressBar::new_spinner();
        bar.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {msg}")
                .unwrap()
                .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
        );
        bar.enable_steady_tick(std::time::Duration::from_millis(80));
        Self { bar }
    }
}

impl ProgressReporter for CliProgress {
    fn phase(&self, name: &str) {
        self.bar.set_message(name.to_string());
    }

    fn record_processed(&self, current: usize, total: usize, title: &str) {
        if self.bar.length() != Some(total as u64) {
            self.bar.set_style(
                ProgressStyle::with_template("{spinner:.cyan} [{bar:30.cyan/blue}] {pos}/{len} {msg}")
                    .unwrap()
                    .progress_chars("=> "),
            );
            self.bar.set_length(total as u64);
        }
        self.bar.set_position(current as u64);
        self.bar.set_message(title.chars().take(50).collect::<String>());
    }

    fn done(&self, _stats: &RunStats) {
        self.bar.finish_and_clear();
    }
}
