//! CLI module for lazyinit
//!
//! Argument parsing and subcommand handling for the `lazyinit` binary.

pub mod commands;
pub mod output;

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// lazyinit - replay and inspect deferred built-in initializers
#[derive(Parser, Debug, Clone)]
#[command(name = "lazyinit")]
#[command(version)]
#[command(about = "Deferred built-in initializer registry", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short = 'v', long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Output format
    #[arg(long, global = true, default_value = "human")]
    pub output: OutputFormat,

    /// Path to configuration file
    #[arg(short = 'c', long, global = true, env = "LAZYINIT_CONFIG")]
    pub config: Option<PathBuf>,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,
}

/// Output format for CLI
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable output with colors
    #[default]
    Human,
    /// One JSON object per line
    Json,
}

/// Available subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Replay a boot scenario against the dispatcher
    Replay(commands::replay::ReplayArgs),

    /// Show how component names are classified
    Classify(commands::classify::ClassifyArgs),

    /// Validate the configured policy tables
    Check(commands::check::CheckArgs),
}

impl Cli {
    /// Parse command-line arguments
    pub fn parse_args() -> Self {
        Cli::parse()
    }

    /// Get the effective verbosity level (0-3)
    pub fn verbosity(&self) -> u8 {
        self.verbose.min(3)
    }

    /// Check if JSON output is requested
    pub fn is_json(&self) -> bool {
        matches!(self.output, OutputFormat::Json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parsing() {
        let cli = Cli::try_parse_from(["lazyinit", "replay", "boot.toml"]).unwrap();
        assert!(matches!(cli.command, Commands::Replay(_)));
    }

    #[test]
    fn test_verbosity() {
        let cli = Cli::try_parse_from(["lazyinit", "-vvvv", "check"]).unwrap();
        assert_eq!(cli.verbosity(), 3);
    }

    #[test]
    fn test_classify_takes_names() {
        let cli =
            Cli::try_parse_from(["lazyinit", "--output", "json", "classify", "a", "b"]).unwrap();
        assert!(cli.is_json());
        match cli.command {
            Commands::Classify(args) => assert_eq!(args.names, vec!["a", "b"]),
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_replay_parallel() {
        let cli =
            Cli::try_parse_from(["lazyinit", "replay", "boot.toml", "--parallel", "4"]).unwrap();
        match cli.command {
            Commands::Replay(args) => assert_eq!(args.parallel, 4),
            other => panic!("unexpected command: {:?}", other),
        }
    }
}
