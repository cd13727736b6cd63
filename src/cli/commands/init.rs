//! Init and Config commands.

use anyhow::Context;

use crate::config::Settings;

/// Run init command - create configuration file in the current directory.
pub fn run_init(force: bool) -> anyhow::Result<()> {
    let cwd = std::env::current_dir().context("cannot determine current directory")?;
    let path = Settings::init_config_file(&cwd, force)?;

    if force {
        println!("Wrote configuration file at: {}", path.display());
    } else {
        println!("Created configuration file at: {}", path.display());
    }
    println!("Add [[monitor.paths]] entries to choose what to watch.");
    Ok(())
}

/// Run config command - display current configuration.
pub fn run_config(settings: &Settings) -> anyhow::Result<()> {
    println!("Current Configuration:");
    println!("{}", "=".repeat(50));
    println!("{}", toml::to_string_pretty(settings)?);
    Ok(())
}
