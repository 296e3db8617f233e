mod artifacts;
mod categorize;
mod cli;
mod commands;
mod enrichment;
mod ingest;
mod model;
mod nps;
mod quarters;
mod suggest;
mod taxonomy;
mod triangulation;
mod util;
mod waterfall;

use anyhow::Result;
use clap::Parser;
use tracing::error;
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Commands};

fn main() {
    init_tracing();

    match run() {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            error!(error = %err, "command failed");
            for cause in err.chain().skip(1) {
                error!(cause = %cause, "caused by");
            }
            std::process::exit(1);
        }
    }
}

fn run() -> Result<i32> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Analyze(args) => {
            let outcome = commands::analyze::run(args)?;
            Ok(outcome.exit_code())
        }
        Commands::Status(args) => {
            commands::status::run(args)?;
            Ok(0)
        }
    }
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}
