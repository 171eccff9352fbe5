//! chatgate: mediate chat messages into a bounded set of host commands.
//!
//! Thin binary entry point. `chatgate broker` runs the Telegram-facing
//! pipeline; `chatgate agent` serves `/command` for brokers in forward mode.

use anyhow::Result;
use clap::Parser;

mod cli;
mod main_helpers;
mod startup;

use cli::{Cli, Commands};

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env (non-fatal if missing)
    dotenvy::dotenv().ok();

    let args = Cli::parse();
    main_helpers::initialize_tracing(&args.log_level)?;

    match args.command {
        Commands::Broker { config } => startup::run_broker(&config).await,
        Commands::Agent { config } => startup::run_agent(&config).await,
    }
}
