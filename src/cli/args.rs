//! CLI argument parsing using clap.

use clap::{
    Parser, Subcommand,
    builder::styling::{AnsiColor, Effects, Styles},
};
use std::path::PathBuf;

fn clap_cargo_style() -> Styles {
    Styles::styled()
        .header(AnsiColor::Cyan.on_default() | Effects::BOLD)
        .usage(AnsiColor::Cyan.on_default() | Effects::BOLD)
        .literal(AnsiColor::Green.on_default())
        .placeholder(AnsiColor::Green.on_default())
}

/// Directory change detection and remote reconciliation
#[derive(Parser)]
#[command(
    name = "treesync",
    version = env!("CARGO_PKG_VERSION"),
    about = "Watch directories and keep a remote copy in sync",
    long_about = "Detect file changes under monitored directories, recover events missed while \
                  offline, and reconcile every change against remote storage.",
    next_line_help = true,
    styles = clap_cargo_style()
)]
pub struct Cli {
    /// Path to custom settings.toml file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand)]
pub enum Commands {
    /// Initialize project
    #[command(about = "Set up .treesync directory with default configuration")]
    Init {
        /// Force overwrite existing configuration
        #[arg(short, long)]
        force: bool,
    },

    /// Run monitor and reconciler
    #[command(about = "Monitor configured directories and sync changes")]
    Watch {
        /// Stop after this many seconds (runs until the monitor fails otherwise)
        #[arg(long, value_name = "SECS")]
        for_secs: Option<u64>,
    },

    /// Diff a directory against its baseline
    #[command(about = "Print what changed in a directory since its recorded baseline")]
    Scan {
        /// Directory to scan
        path: PathBuf,
    },

    /// Drop a directory's baseline
    #[command(about = "Forget the persisted baseline for a directory")]
    Purge {
        /// Directory whose baseline is dropped
        path: PathBuf,
    },

    /// Show synced files
    #[command(about = "List synced-file records")]
    Status {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Display active settings
    #[command(about = "Print the effective configuration")]
    Config,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_watch_duration() {
        let cli = Cli::try_parse_from(["treesync", "watch", "--for-secs", "5"]).unwrap();
        assert!(matches!(cli.command, Commands::Watch { for_secs: Some(5) }));
    }

    #[test]
    fn test_global_config_flag() {
        let cli =
            Cli::try_parse_from(["treesync", "status", "--json", "-c", "/tmp/s.toml"]).unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/s.toml")));
        assert!(matches!(cli.command, Commands::Status { json: true }));
    }

    #[test]
    fn test_scan_requires_path() {
        assert!(Cli::try_parse_from(["treesync", "scan"]).is_err());
    }
}
