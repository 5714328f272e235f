//! Parentheses CLI: operator tooling for the knowledge pathway engine.
//!
//! Validates submissions, ingests them into per-domain pathways against an
//! in-memory ledger, and runs the optimize-and-reward cycle.

mod commands;

use clap::Parser;
use color_eyre::eyre::Result;

use commands::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    commands::init_tracing(&cli);
    commands::run(cli).await
}
