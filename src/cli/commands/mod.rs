//! Subcommands module for lazyinit CLI
//!
//! This module contains all the subcommand implementations.

pub mod check;
pub mod classify;
pub mod replay;

use crate::cli::output::OutputFormatter;
use lazyinit::config::Config;

/// Common context shared between commands
pub struct CommandContext {
    /// Configuration
    pub config: Config,
    /// Error raised while loading the configuration, if any
    pub config_error: Option<String>,
    /// Output formatter
    pub output: OutputFormatter,
}

impl CommandContext {
    /// Create a new command context from CLI arguments
    pub fn new(cli: &crate::cli::Cli, config: Config, config_error: Option<String>) -> Self {
        let output = OutputFormatter::new(!cli.no_color, cli.is_json(), cli.verbosity());

        Self {
            config,
            config_error,
            output,
        }
    }
}
