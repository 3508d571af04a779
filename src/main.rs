//! lazyinit - deferred built-in initializer registry
//!
//! This is the main entry point for the lazyinit CLI.

mod cli;

use anyhow::Result;
use cli::commands::CommandContext;
use cli::{Cli, Commands};
use lazyinit::config::Config;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Application version information
const VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command line arguments
    let cli = Cli::parse_args();

    // Load configuration
    let (config, config_error) = match Config::load(cli.config.as_ref()) {
        Ok(config) => (config, None),
        Err(e) => (Config::default(), Some(format!("{:#}", e))),
    };

    // Initialize logging based on verbosity
    init_logging(cli.verbosity(), &config.logging.log_level);

    if cli.verbosity() >= 2 {
        eprintln!("lazyinit v{}", VERSION);
    }

    if let Some(err) = &config_error {
        if cli.verbosity() >= 1 {
            eprintln!("Warning: Failed to load config: {}", err);
        }
    }

    // Create command context
    let mut ctx = CommandContext::new(&cli, config, config_error);

    // Execute the appropriate command
    let exit_code = match &cli.command {
        Commands::Replay(args) => args.execute(&mut ctx).await?,
        Commands::Classify(args) => args.execute(&mut ctx).await?,
        Commands::Check(args) => args.execute(&mut ctx).await?,
    };

    std::process::exit(exit_code);
}

/// Initialize logging based on verbosity level
///
/// Without `-v` the configured level applies.
fn init_logging(verbosity: u8, configured: &str) {
    let filter = match verbosity {
        0 => configured,
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(filter))
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(verbosity >= 3),
        )
        .with(env_filter)
        .init();
}
