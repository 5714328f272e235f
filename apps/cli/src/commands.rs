//! CLI command definitions, routing, and tracing setup.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use indicatif::{ProgressBar, ProgressStyle};
use serde_json::Value;
use tracing::{info, warn};

use parentheses_core::{ExchangeOrchestrator, InMemoryLedger};
use parentheses_shared::{
    AppConfig, DomainStats, ExchangeConfig, ParenthesesError, ValidatorConfig, init_config,
    load_config,
};
use parentheses_validation::ContentValidator;

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// Parentheses: validate, link and reward shared knowledge.
#[derive(Parser)]
#[command(
    name = "parentheses",
    version,
    about = "Validate knowledge submissions and run the pathway exchange against an in-memory ledger.",
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
    /// Run the validator on a JSON submission.
    Validate {
        /// Path to a JSON file holding one submission.
        file: PathBuf,
    },

    /// Submit knowledge files, run exchange cycles and print domain stats.
    Ingest {
        /// JSON files, each holding one submission or an array of them.
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Number of optimize-and-reward cycles to run after ingesting.
        #[arg(long, default_value = "1")]
        cycles: u32,

        /// Only print stats for this domain.
        #[arg(long)]
        domain: Option<String>,
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
        0 => "parentheses=info",
        1 => "parentheses=debug",
        _ => "parentheses=trace",
    };

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

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
        Command::Validate { file } => cmd_validate(&file).await,
        Command::Ingest {
            files,
            cycles,
            domain,
        } => cmd_ingest(&files, cycles, domain.as_deref()).await,
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init().await,
            ConfigAction::Show => cmd_config_show().await,
        },
    }
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

async fn cmd_validate(file: &Path) -> Result<()> {
    let config = load_config()?;
    let validator = ContentValidator::new(ValidatorConfig::from(&config));
    let submission = read_json(file)?;

    match validator.evaluate(&submission) {
        Ok(report) => {
            println!("accepted: {}", file.display());
            if let Some(score) = report.content_score {
                println!("  content score: {score:.4}");
            }
            if let Some(score) = report.size_score {
                println!("  size score:    {score:.4}");
            }
            println!("  threshold:     {:.4}", validator.threshold());
            Ok(())
        }
        Err(rejection) => Err(eyre!("rejected {}: {rejection}", file.display())),
    }
}

async fn cmd_ingest(files: &[PathBuf], cycles: u32, domain: Option<&str>) -> Result<()> {
    let config = load_config()?;
    let ledger = Arc::new(InMemoryLedger::new());
    let exchange = ExchangeOrchestrator::new(ExchangeConfig::from(&config), ledger.clone());

    let spinner = spinner()?;
    let mut accepted = 0usize;
    let mut rejected = 0usize;

    for file in files {
        spinner.set_message(format!("Submitting {}", file.display()));
        for submission in submissions(read_json(file)?) {
            match exchange.submit(&submission).await {
                Ok(tx) => {
                    accepted += 1;
                    info!(file = %file.display(), tx = %tx, "accepted");
                }
                Err(e) => {
                    rejected += 1;
                    spinner.suspend(|| warn!(file = %file.display(), error = %e, "rejected"));
                }
            }
        }
    }

    for n in 1..=cycles {
        spinner.set_message(format!("Running exchange cycle {n}/{cycles}"));
        let report = exchange.run_cycle_once().await;
        info!(
            cycle = n,
            domains = report.domains.len(),
            optimize_failures = report.optimize_failures.len(),
            rewards_paid = report.rewards_paid,
            amount_paid = report.amount_paid,
            "cycle finished"
        );
    }
    spinner.finish_and_clear();

    info!(
        accepted,
        rejected,
        payouts = ledger.payouts().len(),
        "ingest complete"
    );

    let output = match domain {
        Some(name) => {
            let stats = exchange
                .stats(name)
                .await
                .ok_or_else(|| ParenthesesError::not_found(name))?;
            serde_json::to_string_pretty(&stats)?
        }
        None => {
            let mut all: BTreeMap<String, DomainStats> = BTreeMap::new();
            for name in exchange.domains().await {
                if let Some(stats) = exchange.stats(&name).await {
                    all.insert(name, stats);
                }
            }
            serde_json::to_string_pretty(&all)?
        }
    };
    println!("{output}");
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
    Ok(())
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn read_json(path: &Path) -> Result<Value> {
    let raw = std::fs::read_to_string(path).map_err(|e| ParenthesesError::io(path, e))?;
    let value = serde_json::from_str(&raw).map_err(|e| {
        ParenthesesError::Serialization(format!("{}: {e}", path.display()))
    })?;
    Ok(value)
}

/// A file holds either one submission or an array of them.
fn submissions(value: Value) -> Vec<Value> {
    match value {
        Value::Array(items) => items,
        other => vec![other],
    }
}

fn spinner() -> Result<ProgressBar> {
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::with_template("{spinner:.cyan} {msg}")?
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
    );
    spinner.enable_steady_tick(std::time::Duration::from_millis(80));
    Ok(spinner)
}
