use anyhow::Context;
use clap::Parser;

use treesync::Settings;
use treesync::cli::commands::{init, scan, status, watch};
use treesync::cli::{Cli, Commands};

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if let Commands::Init { force } = cli.command {
        treesync::logging::init();
        return init::run_init(force);
    }

    let settings = match &cli.config {
        Some(path) => Settings::load_from(path)
            .with_context(|| format!("cannot load configuration from {}", path.display()))?,
        None => Settings::load().context("cannot load configuration")?,
    };
    treesync::logging::init_with_config(&settings.logging);

    match cli.command {
        Commands::Init { .. } => unreachable!("handled above"),
        Commands::Watch { for_secs } => watch::run_watch(&settings, for_secs),
        Commands::Scan { path } => scan::run_scan(&settings, &path),
        Commands::Purge { path } => scan::run_purge(&settings, &path),
        Commands::Status { json } => status::run_status(&settings, json),
        Commands::Config => init::run_config(&settings),
    }
}
