//! CLI module for gcprov
//!
//! This module provides the command-line interface for gcprov,
//! including argument parsing, configuration loading, and subcommand handling.

pub mod commands;
pub mod output;

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// gcprov - idempotent, dependency-ordered GCP provisioning
///
/// Creates the project, APIs and buckets listed in a manifest, in dependency
/// order, skipping anything that already exists.
#[derive(Parser, Debug, Clone)]
#[command(name = "gcprov")]
#[command(version)]
#[command(about = "Idempotent, dependency-ordered GCP provisioning", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short = 'v', long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Output format
    #[arg(long, global = true, value_enum, default_value_t = OutputFormat::Human)]
    pub output: OutputFormat,

    /// Path to configuration file
    #[arg(short = 'c', long, global = true, env = "GCPROV_CONFIG")]
    pub config: Option<PathBuf>,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,
}

/// Output format for CLI
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable output with colors
    #[default]
    Human,
    /// JSON output for scripting
    Json,
}

/// Available subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Provision every resource in a manifest
    Provision(commands::provision::ProvisionArgs),

    /// Show the execution order without contacting the cloud
    Plan(commands::plan::PlanArgs),

    /// Write a manifest for the PDF question-answering pipeline
    Init(commands::init::InitArgs),
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
        let cli = Cli::try_parse_from(["gcprov", "provision", "gcprov.yaml"]).unwrap();
        assert!(matches!(cli.command, Commands::Provision(_)));
        assert!(!cli.is_json());
    }

    #[test]
    fn test_verbosity() {
        let cli = Cli::try_parse_from(["gcprov", "-vvvv", "plan", "m.yaml"]).unwrap();
        assert_eq!(cli.verbosity(), 3);
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "gcprov",
            "provision",
            "m.yaml",
            "--output",
            "json",
            "--project-id",
            "p1",
            "--max-attempts",
            "2",
        ])
        .unwrap();
        assert!(cli.is_json());
        match cli.command {
            Commands::Provision(args) => {
                assert_eq!(args.project_id.as_deref(), Some("p1"));
                assert_eq!(args.max_attempts, Some(2));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }
}
