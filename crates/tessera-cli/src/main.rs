mod cli;
mod commands;
mod output;

use anyhow::{Result, anyhow};
use clap::Parser;

use cli::{Cli, Commands};
use output::print_error;
use tessera_cli::config::load_config;
use tessera_cli::observability::init_tracing_with_level;
use tessera_cli::runtime::build_evaluator;

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        print_error(&format!("{e:#}"));
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref()).map_err(|e| anyhow!(e))?;

    let level = cli.log_level.as_deref().unwrap_or(&config.logging.level);
    init_tracing_with_level(level);

    match &cli.command {
        Commands::Config => {
            commands::config::show(&config)?;
        }
        Commands::Check(args) => {
            let evaluator = build_evaluator(&config, cli.rules.as_deref()).await?;
            commands::check::check(&evaluator, args).await?;
        }
        Commands::Filter(args) => {
            let evaluator = build_evaluator(&config, cli.rules.as_deref()).await?;
            commands::filter::filter(&evaluator, args).await?;
        }
        Commands::Search(args) => {
            let evaluator = build_evaluator(&config, cli.rules.as_deref()).await?;
            commands::search::search(&config, evaluator, args).await?;
        }
    }

    Ok(())
}
