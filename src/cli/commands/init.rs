//! Init command - write a manifest for the PDF question-answering pipeline

use super::CommandContext;
use anyhow::{bail, Context, Result};
use clap::Parser;
use gcprov::config::DEFAULT_REGION;
use gcprov::resource::Manifest;
use std::path::PathBuf;

/// Arguments for the init command
#[derive(Parser, Debug, Clone)]
pub struct InitArgs {
    /// Where to write the manifest
    #[arg(default_value = "gcprov.yaml")]
    pub path: PathBuf,

    /// Project ID (defaults to pdf-qa-generator-<unix timestamp>)
    #[arg(long)]
    pub project_id: Option<String>,

    /// Default region
    #[arg(long)]
    pub region: Option<String>,

    /// Overwrite an existing file
    #[arg(long)]
    pub force: bool,
}

impl InitArgs {
    /// Execute the init command
    pub async fn execute(&self, ctx: &mut CommandContext) -> Result<i32> {
        if self.path.exists() && !self.force {
            bail!(
                "{} already exists (use --force to overwrite)",
                self.path.display()
            );
        }

        let project_id = self
            .project_id
            .clone()
            .or_else(|| ctx.config.defaults.project_id.clone())
            .unwrap_or_else(|| format!("pdf-qa-generator-{}", chrono::Utc::now().timestamp()));
        let region = self
            .region
            .clone()
            .or_else(|| ctx.config.defaults.region.clone())
            .unwrap_or_else(|| DEFAULT_REGION.to_string());

        let manifest = Manifest::pdf_qa_pipeline(Some(project_id.clone()), Some(region));
        let content = format!(
            "# Resources for the PDF question-answering pipeline.\n\
             # Apply with: gcprov provision {}\n{}",
            self.path.display(),
            manifest.to_yaml()?
        );

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        std::fs::write(&self.path, content)
            .with_context(|| format!("Failed to write {}", self.path.display()))?;

        if ctx.output.is_json() {
            let json = serde_json::json!({
                "path": self.path,
                "project_id": project_id,
                "resources": manifest.resources.len(),
            });
            ctx.output.plan(&json.to_string());
        } else {
            ctx.output.plan(&format!(
                "Wrote {} ({} resources for project {})",
                self.path.display(),
                manifest.resources.len(),
                project_id
            ));
        }

        Ok(0)
    }
}
