//! Plan command - show the execution order without contacting the cloud

use super::CommandContext;
use anyhow::Result;
use clap::{Parser, ValueEnum};
use std::path::PathBuf;

/// How to render the plan
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum PlanFormat {
    /// Numbered list
    #[default]
    List,
    /// Graphviz DOT
    Dot,
    /// Mermaid flowchart
    Mermaid,
}

/// Arguments for the plan command
#[derive(Parser, Debug, Clone)]
pub struct PlanArgs {
    /// Path to the manifest file (YAML or JSON)
    #[arg(required = true)]
    pub manifest: PathBuf,

    /// Target project ID (overrides config and manifest)
    #[arg(long)]
    pub project_id: Option<String>,

    /// Default region (overrides config and manifest)
    #[arg(long)]
    pub region: Option<String>,

    /// Rendering of the plan
    #[arg(long, value_enum, default_value_t = PlanFormat::List)]
    pub format: PlanFormat,
}

impl PlanArgs {
    /// Execute the plan command
    pub async fn execute(&self, ctx: &mut CommandContext) -> Result<i32> {
        let (target, plan) = ctx.load_plan(
            &self.manifest,
            self.project_id.as_deref(),
            self.region.as_deref(),
        )?;

        if ctx.output.is_json() {
            let json = serde_json::json!({
                "project_id": target.project_id,
                "region": target.region,
                "steps": plan,
            });
            ctx.output.plan(&serde_json::to_string_pretty(&json)?);
            return Ok(0);
        }

        let rendered = match self.format {
            PlanFormat::List => {
                ctx.output.banner(&format!("PLAN [{}]", target.project_id));
                plan.to_list()
            }
            PlanFormat::Dot => plan.to_dot(),
            PlanFormat::Mermaid => plan.to_mermaid(),
        };
        ctx.output.plan(rendered.trim_end());

        Ok(0)
    }
}
