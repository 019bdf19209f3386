//! gcprov - idempotent, dependency-ordered GCP provisioning
//!
//! This is the main entry point for the gcprov CLI.

mod cli;

use cli::commands::CommandContext;
use cli::output::OutputFormatter;
use cli::{Cli, Commands};
use gcprov::config::{Config, LogFormat};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() {
    // Parse command line arguments
    let cli = Cli::parse_args();

    // Load configuration
    let config = match Config::load(cli.config.as_ref()) {
        Ok(config) => config,
        Err(e) => {
            OutputFormatter::new(!cli.no_color, cli.is_json(), cli.verbosity())
                .error(&format!("Failed to load config: {}", e));
            std::process::exit(e.exit_code());
        }
    };

    // Initialize logging based on verbosity
    init_logging(cli.verbosity(), &config);

    // Create command context
    let mut ctx = CommandContext::new(&cli, config);

    // Execute the appropriate command
    let result = match &cli.command {
        Commands::Provision(args) => args.execute(&mut ctx).await,
        Commands::Plan(args) => args.execute(&mut ctx).await,
        Commands::Init(args) => args.execute(&mut ctx).await,
    };

    let exit_code = match result {
        Ok(code) => code,
        Err(err) => {
            ctx.output.error(&format!("{:#}", err));
            err.downcast_ref::<gcprov::error::Error>()
                .map_or(1, gcprov::error::Error::exit_code)
        }
    };

    std::process::exit(exit_code);
}

/// Initialize logging based on verbosity level
fn init_logging(verbosity: u8, config: &Config) {
    let filter = match verbosity {
        0 => config.logging.level.as_deref().unwrap_or("warn"),
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    let registry = tracing_subscriber::registry().with(env_filter);
    match config.logging.format {
        LogFormat::Json => registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init(),
        LogFormat::Pretty => registry
            .with(
                fmt::layer()
                    .with_target(verbosity >= 3)
                    .with_writer(std::io::stderr),
            )
            .init(),
    }
}
