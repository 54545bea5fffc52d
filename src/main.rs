mod cli;
mod commands;
mod config;
mod model;
mod persistence;
mod review;
mod util;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::error;
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Commands};
use crate::config::Settings;

fn main() {
    init_tracing();

    if let Err(err) = run() {
        error!(error = %err, "command failed");
        for cause in err.chain().skip(1) {
            error!(cause = %cause, "caused by");
        }
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    let settings = Settings::from_args(&cli.global)?;

    // One thread: the core is synchronous and only remote sync runs as a task.
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to start async runtime")?;

    match cli.command {
        Commands::Load(args) => commands::load::run(&settings, args),
        Commands::Query(args) => commands::query::run(&settings, &runtime, args),
        Commands::Show(args) => commands::show::run(&settings, &runtime, args),
        Commands::Category(command) => commands::category::run(&settings, &runtime, command),
        Commands::Annotate(args) => commands::annotate::run(&settings, &runtime, args),
        Commands::ToggleSubmitted(args) => {
            commands::annotate::toggle_submitted(&settings, &runtime, args)
        }
        Commands::Export(args) => commands::export::run(&settings, &runtime, args),
        Commands::Import(args) => commands::export::import(&settings, &runtime, args),
        Commands::Summary(args) => commands::summary::run(&settings, &runtime, args),
        Commands::Status => commands::status::run(&settings),
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
