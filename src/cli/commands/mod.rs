//! Subcommands module for gcprov CLI
//!
//! This module contains all the subcommand implementations.

pub mod init;
pub mod plan;
pub mod provision;

use crate::cli::output::OutputFormatter;
use crate::cli::Cli;
use anyhow::{Context, Result};
use gcprov::config::{Config, ProvisionTarget};
use gcprov::planner::{plan, ExecutionPlan};
use gcprov::resource::Manifest;
use std::path::Path;

/// Common context shared between commands
pub struct CommandContext {
    /// Configuration
    pub config: Config,
    /// Output formatter
    pub output: OutputFormatter,
}

impl CommandContext {
    /// Create a new command context from CLI arguments
    pub fn new(cli: &Cli, config: Config) -> Self {
        let use_color = !cli.no_color && config.output.color;
        let output = OutputFormatter::new(use_color, cli.is_json(), cli.verbosity());

        Self { config, output }
    }

    /// Load a manifest, resolve the target and build the execution plan.
    pub fn load_plan(
        &self,
        manifest_path: &Path,
        project_id: Option<&str>,
        region: Option<&str>,
    ) -> Result<(ProvisionTarget, ExecutionPlan)> {
        let manifest = Manifest::from_file(manifest_path)
            .with_context(|| format!("Failed to load manifest {}", manifest_path.display()))?;

        let target = self.config.resolve_target(project_id, region, &manifest)?;
        self.output.info(&format!(
            "Target project {} in {}",
            target.project_id, target.region
        ));

        let descriptors = manifest.descriptors(&target)?;
        let plan = plan(descriptors).map_err(gcprov::error::Error::from)?;
        Ok((target, plan))
    }
}
