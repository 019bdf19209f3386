//! Provision command - create every resource in a manifest
//!
//! Exit status: 0 when every step created or found its resource, 2 when any
//! step failed.

use super::CommandContext;
use crate::cli::output::ProgressPrinter;
use anyhow::{Context, Result};
use clap::Parser;
use gcprov::adapter::{GcloudAdapter, GcloudSettings};
use gcprov::engine::ProvisioningEngine;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::warn;

/// Arguments for the provision command
#[derive(Parser, Debug, Clone)]
pub struct ProvisionArgs {
    /// Path to the manifest file (YAML or JSON)
    #[arg(required = true)]
    pub manifest: PathBuf,

    /// Target project ID (overrides config and manifest)
    #[arg(long)]
    pub project_id: Option<String>,

    /// Default region (overrides config and manifest)
    #[arg(long)]
    pub region: Option<String>,

    /// Total attempts per adapter call, first one included
    #[arg(long)]
    pub max_attempts: Option<u32>,

    /// Path to the gcloud executable
    #[arg(long)]
    pub gcloud: Option<PathBuf>,

    /// Also write the JSON report to this file
    #[arg(long)]
    pub report: Option<PathBuf>,
}

impl ProvisionArgs {
    /// Execute the provision command
    pub async fn execute(&self, ctx: &mut CommandContext) -> Result<i32> {
        let (target, plan) = ctx.load_plan(
            &self.manifest,
            self.project_id.as_deref(),
            self.region.as_deref(),
        )?;

        ctx.output.banner(&format!(
            "PROVISION [{}] ({} resources)",
            target.project_id,
            plan.len()
        ));

        let mut policy = ctx.config.retry_policy();
        if let Some(n) = self.max_attempts {
            policy.max_attempts = n.max(1);
        }

        let binary = self
            .gcloud
            .clone()
            .unwrap_or_else(|| ctx.config.gcloud.binary.clone());
        let adapter = GcloudAdapter::new(
            GcloudSettings::new(&target)
                .with_binary(binary)
                .with_command_timeout(ctx.config.gcloud.command_timeout),
        );

        let engine = ProvisioningEngine::new(policy)
            .with_observer(Arc::new(ProgressPrinter::new(ctx.output.clone())));

        let token = engine.cancellation_token();
        let output = ctx.output.clone();
        let ctrl_c = tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Interrupt received");
                output.warning("Interrupted: finishing the current step, skipping the rest");
                token.cancel();
            }
        });

        let report = engine.execute(&plan, &adapter).await;
        ctrl_c.abort();

        if let Some(path) = &self.report {
            let json = report.to_json().context("Failed to serialize report")?;
            std::fs::write(path, json)
                .with_context(|| format!("Failed to write report to {}", path.display()))?;
            ctx.output
                .info(&format!("Report written to {}", path.display()));
        }

        ctx.output.recap(&report);

        Ok(if report.success { 0 } else { 2 })
    }
}
