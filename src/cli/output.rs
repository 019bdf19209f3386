//! Output formatting module for gcprov
//!
//! Provides colored human output and a JSON mode for scripting.

use colored::Colorize;
use gcprov::engine::ProvisionObserver;
use gcprov::report::{ProvisioningReport, StepOutcome, StepResult};
use gcprov::resource::{ResourceDescriptor, ResourceKind};
use std::time::Duration;

/// Colored label for a step result.
fn colored_label(result: &StepResult) -> String {
    let label = result.label();
    match result {
        StepResult::Created => label.yellow().to_string(),
        StepResult::AlreadyExists => label.green().to_string(),
        StepResult::Failed(_) => label.red().bold().to_string(),
        StepResult::Skipped(_) => label.cyan().to_string(),
    }
}

/// `gs://` URLs of the buckets that exist after the run.
fn bucket_urls(report: &ProvisioningReport) -> Vec<String> {
    report
        .steps
        .iter()
        .filter(|step| step.id.kind() == ResourceKind::Bucket && step.result.is_satisfied())
        .map(|step| format!("gs://{}", step.id.name()))
        .collect()
}

/// Output formatter for different output modes
#[derive(Debug, Clone)]
pub struct OutputFormatter {
    /// Use colored output
    use_color: bool,
    /// JSON output mode
    json_mode: bool,
    /// Verbosity level
    verbosity: u8,
}

impl OutputFormatter {
    /// Create a new output formatter
    pub fn new(use_color: bool, json_mode: bool, verbosity: u8) -> Self {
        // Respect NO_COLOR environment variable
        let use_color = use_color && std::env::var("NO_COLOR").is_err();
        colored::control::set_override(use_color);

        Self {
            use_color,
            json_mode,
            verbosity,
        }
    }

    /// Whether JSON output was requested
    pub fn is_json(&self) -> bool {
        self.json_mode
    }

    /// Print a banner/header
    pub fn banner(&self, title: &str) {
        if self.json_mode {
            return;
        }

        let header = format!("{} ", title);
        let stars = "*".repeat(80_usize.saturating_sub(header.len()));
        if self.use_color {
            println!("\n{}{}", header.bright_white().bold(), stars.bright_black());
        } else {
            println!("\n{}{}", header, stars);
        }
    }

    /// Print a step as it starts (verbose only)
    pub fn step_started(&self, descriptor: &ResourceDescriptor) {
        if self.json_mode || self.verbosity < 1 {
            return;
        }
        if self.use_color {
            println!("{} [{}]", "provisioning".bright_black(), descriptor.id());
        } else {
            println!("provisioning [{}]", descriptor.id());
        }
    }

    /// Print step result, e.g. `created: [bucket/p1-pdf-input]`
    pub fn step_result(&self, outcome: &StepOutcome) {
        if self.json_mode {
            return;
        }

        let (status_str, id_str) = if self.use_color {
            (
                colored_label(&outcome.result),
                outcome.id.to_string().bright_white().bold().to_string(),
            )
        } else {
            (outcome.result.label().to_string(), outcome.id.to_string())
        };

        print!("{}: [{}]", status_str, id_str);

        match &outcome.result {
            StepResult::Failed(err) => print!(" => {}", err),
            StepResult::Skipped(cause) => print!(" => {}", cause),
            StepResult::Created if outcome.attempts > 1 => {
                print!(" => after {} attempts", outcome.attempts);
            }
            _ => {}
        }

        println!();
    }

    /// Print the run summary, or the whole report in JSON mode
    pub fn recap(&self, report: &ProvisioningReport) {
        if self.json_mode {
            match report.to_json() {
                Ok(json) => println!("{}", json),
                Err(e) => self.error(&format!("Failed to serialize report: {}", e)),
            }
            return;
        }

        self.banner("PROVISION RECAP");

        let summary = &report.summary;
        if self.use_color {
            let fmt_stat = |label: &str, value: usize, color: colored::Color| -> String {
                if value > 0 {
                    format!("{}={:<4}", label.color(color), value)
                } else {
                    format!("{}={:<4}", label, value).dimmed().to_string()
                }
            };
            println!(
                "{} {} {} {}",
                fmt_stat("created", summary.created, colored::Color::Yellow),
                fmt_stat("exists", summary.already_exists, colored::Color::Green),
                fmt_stat("failed", summary.failed, colored::Color::Red),
                fmt_stat("skipped", summary.skipped, colored::Color::Cyan),
            );
        } else {
            println!(
                "created={:<4} exists={:<4} failed={:<4} skipped={:<4}",
                summary.created, summary.already_exists, summary.failed, summary.skipped
            );
        }

        let buckets = bucket_urls(report);
        if !buckets.is_empty() {
            println!("\nBuckets:");
            for url in &buckets {
                println!("  {}", url);
            }
        }

        let duration_str = format_duration(report.duration);
        if self.use_color {
            println!(
                "\n{} {}",
                "Provisioning took".bright_black(),
                duration_str.bright_white()
            );
        } else {
            println!("\nProvisioning took {}", duration_str);
        }

        if report.success {
            if self.use_color {
                println!("{}", "Provisioning completed successfully.".green().bold());
            } else {
                println!("Provisioning completed successfully.");
            }
        } else if self.use_color {
            println!("{}", "Provisioning finished with failures.".red().bold());
        } else {
            println!("Provisioning finished with failures.");
        }
    }

    /// Print an error message
    pub fn error(&self, message: &str) {
        if self.json_mode {
            let err = serde_json::json!({
                "type": "error",
                "message": message
            });
            eprintln!("{}", err);
            return;
        }

        if self.use_color {
            eprintln!("{} {}", "ERROR:".red().bold(), message);
        } else {
            eprintln!("ERROR: {}", message);
        }
    }

    /// Print a warning message
    pub fn warning(&self, message: &str) {
        if self.json_mode {
            let warn = serde_json::json!({
                "type": "warning",
                "message": message
            });
            eprintln!("{}", warn);
            return;
        }

        if self.use_color {
            eprintln!("{} {}", "WARNING:".yellow().bold(), message);
        } else {
            eprintln!("WARNING: {}", message);
        }
    }

    /// Print an info message (respects verbosity)
    pub fn info(&self, message: &str) {
        if self.verbosity < 1 {
            return;
        }

        if self.json_mode {
            let info = serde_json::json!({
                "type": "info",
                "message": message
            });
            eprintln!("{}", info);
            return;
        }

        if self.use_color {
            println!("{} {}", "INFO:".blue(), message);
        } else {
            println!("INFO: {}", message);
        }
    }

    /// Print plan output (always shows, bypasses verbosity)
    pub fn plan(&self, message: &str) {
        println!("{}", message);
    }
}

/// Prints step progress as the engine reports it.
#[derive(Debug)]
pub struct ProgressPrinter {
    output: OutputFormatter,
}

impl ProgressPrinter {
    pub fn new(output: OutputFormatter) -> Self {
        Self { output }
    }
}

impl ProvisionObserver for ProgressPrinter {
    fn on_step_started(&self, descriptor: &ResourceDescriptor) {
        self.output.step_started(descriptor);
    }

    fn on_step_finished(&self, outcome: &StepOutcome) {
        self.output.step_result(outcome);
    }
}

/// Format a duration as a human-readable string
fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    let millis = duration.subsec_millis();

    if secs >= 3600 {
        let hours = secs / 3600;
        let mins = (secs % 3600) / 60;
        let secs = secs % 60;
        format!("{}h {}m {}s", hours, mins, secs)
    } else if secs >= 60 {
        let mins = secs / 60;
        let secs = secs % 60;
        format!("{}m {}s", mins, secs)
    } else if secs > 0 {
        format!("{}.{:03}s", secs, millis)
    } else {
        format!("{}ms", millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gcprov::adapter::AdapterError;
    use gcprov::planner::plan;
    use gcprov::report::{ReportBuilder, SkipCause};
    use gcprov::resource::ResourceId;

    #[test]
    fn test_colored_label_contains_text() {
        assert!(colored_label(&StepResult::Created).contains("created"));
        assert!(colored_label(&StepResult::AlreadyExists).contains("exists"));
        assert!(
            colored_label(&StepResult::Failed(AdapterError::timeout("t"))).contains("failed")
        );
    }

    #[test]
    fn test_colored_label_matches_plain_label() {
        colored::control::set_override(false);
        let results = [
            StepResult::Created,
            StepResult::AlreadyExists,
            StepResult::Failed(AdapterError::timeout("t")),
            StepResult::Skipped(SkipCause::Cancelled),
        ];
        for result in &results {
            assert_eq!(colored_label(result), result.label());
        }
    }

    #[test]
    fn test_bucket_urls_list_satisfied_buckets_only() {
        let plan = plan(vec![
            ResourceDescriptor::project("p"),
            ResourceDescriptor::bucket("p-in"),
            ResourceDescriptor::bucket("p-out"),
            ResourceDescriptor::bucket("p-src"),
        ])
        .unwrap();
        let mut builder = ReportBuilder::new(&plan);
        for (id, result) in [
            (ResourceId::project("p"), StepResult::Created),
            (ResourceId::bucket("p-in"), StepResult::Created),
            (ResourceId::bucket("p-out"), StepResult::AlreadyExists),
            (
                ResourceId::bucket("p-src"),
                StepResult::Failed(AdapterError::permission_denied("no")),
            ),
        ] {
            builder.record(StepOutcome {
                id,
                result,
                attempts: 1,
                duration: Duration::ZERO,
            });
        }

        let report = builder.finish(Duration::ZERO);
        assert_eq!(bucket_urls(&report), vec!["gs://p-in", "gs://p-out"]);
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(Duration::from_millis(500)), "500ms");
        assert_eq!(format_duration(Duration::from_secs(5)), "5.000s");
        assert_eq!(format_duration(Duration::from_secs(65)), "1m 5s");
        assert_eq!(format_duration(Duration::from_secs(3665)), "1h 1m 5s");
    }
}
