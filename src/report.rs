//! Step results and the provisioning report.
//!
//! The report holds exactly one [`StepOutcome`] per planned descriptor, in
//! plan order. Slots are allocated from the plan up front and each can be
//! written once; [`ReportBuilder::finish`] fills any slot that was never
//! written with a cancellation skip.

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use tracing::warn;

use crate::adapter::AdapterError;
use crate::planner::ExecutionPlan;
use crate::resource::ResourceId;

/// Why a step was not attempted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "cause", content = "resource", rename_all = "snake_case")]
pub enum SkipCause {
    /// A prerequisite failed or was itself skipped
    Dependency(ResourceId),
    /// The run was cancelled before this step started
    Cancelled,
}

impl fmt::Display for SkipCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipCause::Dependency(id) => write!(f, "dependency {} did not succeed", id),
            SkipCause::Cancelled => f.write_str("run cancelled"),
        }
    }
}

/// Terminal outcome of one descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "detail", rename_all = "snake_case")]
pub enum StepResult {
    /// The resource was created by this run
    Created,
    /// The resource was already present
    AlreadyExists,
    /// The adapter reported an error
    Failed(AdapterError),
    /// The step was not attempted
    Skipped(SkipCause),
}

impl StepResult {
    /// Whether dependents of this step may proceed.
    pub fn is_satisfied(&self) -> bool {
        matches!(self, StepResult::Created | StepResult::AlreadyExists)
    }

    /// Whether this step failed.
    pub fn is_failed(&self) -> bool {
        matches!(self, StepResult::Failed(_))
    }

    /// Short status label.
    pub fn label(&self) -> &'static str {
        match self {
            StepResult::Created => "created",
            StepResult::AlreadyExists => "exists",
            StepResult::Failed(_) => "failed",
            StepResult::Skipped(_) => "skipped",
        }
    }
}

impl fmt::Display for StepResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StepResult::Failed(err) => write!(f, "failed ({})", err),
            StepResult::Skipped(cause) => write!(f, "skipped ({})", cause),
            other => f.write_str(other.label()),
        }
    }
}

/// Result of one descriptor plus bookkeeping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepOutcome {
    /// Identity of the descriptor
    pub id: ResourceId,
    /// Terminal result
    pub result: StepResult,
    /// Create attempts made (0 if not created by this run)
    pub attempts: u32,
    /// Time spent on the step
    #[serde(with = "humantime_serde")]
    pub duration: Duration,
}

impl StepOutcome {
    /// Outcome for a step that made no adapter calls.
    pub fn skipped(id: ResourceId, cause: SkipCause) -> Self {
        Self {
            id,
            result: StepResult::Skipped(cause),
            attempts: 0,
            duration: Duration::ZERO,
        }
    }
}

/// Count of steps per result.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportSummary {
    /// Steps that created a resource
    pub created: usize,
    /// Steps whose resource already existed
    pub already_exists: usize,
    /// Steps that failed
    pub failed: usize,
    /// Steps that were skipped
    pub skipped: usize,
}

/// Outcome of a provisioning run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProvisioningReport {
    /// True iff no step failed
    pub success: bool,
    /// When execution started
    pub started_at: DateTime<Utc>,
    /// Wall-clock time of the run
    #[serde(with = "humantime_serde")]
    pub duration: Duration,
    /// Per-step counts
    pub summary: ReportSummary,
    /// One outcome per planned descriptor, in plan order
    pub steps: Vec<StepOutcome>,
}

impl ProvisioningReport {
    /// Outcome of a given resource.
    pub fn get(&self, id: &ResourceId) -> Option<&StepOutcome> {
        self.steps.iter().find(|s| &s.id == id)
    }

    /// Results in plan order.
    pub fn results(&self) -> Vec<&StepResult> {
        self.steps.iter().map(|s| &s.result).collect()
    }

    /// Identities of failed steps.
    pub fn failures(&self) -> impl Iterator<Item = &StepOutcome> {
        self.steps.iter().filter(|s| s.result.is_failed())
    }

    /// Serialize the report as pretty JSON.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

/// Incrementally filled report with one write-once slot per planned step.
#[derive(Debug)]
pub struct ReportBuilder {
    started_at: DateTime<Utc>,
    slots: IndexMap<ResourceId, Option<StepOutcome>>,
}

impl ReportBuilder {
    /// Allocate one slot per descriptor in the plan.
    pub fn new(plan: &ExecutionPlan) -> Self {
        Self {
            started_at: Utc::now(),
            slots: plan.iter().map(|d| (d.id().clone(), None)).collect(),
        }
    }

    /// Result recorded for `id` so far.
    pub fn result(&self, id: &ResourceId) -> Option<&StepResult> {
        self.slots
            .get(id)
            .and_then(Option::as_ref)
            .map(|outcome| &outcome.result)
    }

    /// Record a step's outcome. Returns false, leaving the report unchanged,
    /// if the identity is not planned or was already recorded.
    pub fn record(&mut self, outcome: StepOutcome) -> bool {
        match self.slots.get_mut(&outcome.id) {
            Some(slot @ None) => {
                *slot = Some(outcome);
                true
            }
            Some(Some(_)) => {
                warn!(resource = %outcome.id, "Ignoring second result for step");
                false
            }
            None => {
                warn!(resource = %outcome.id, "Ignoring result for unplanned resource");
                false
            }
        }
    }

    /// Close the report. Unwritten slots become cancellation skips.
    pub fn finish(self, duration: Duration) -> ProvisioningReport {
        let steps: Vec<StepOutcome> = self
            .slots
            .into_iter()
            .map(|(id, slot)| slot.unwrap_or_else(|| StepOutcome::skipped(id, SkipCause::Cancelled)))
            .collect();

        let mut summary = ReportSummary::default();
        for step in &steps {
            match step.result {
                StepResult::Created => summary.created += 1,
                StepResult::AlreadyExists => summary.already_exists += 1,
                StepResult::Failed(_) => summary.failed += 1,
                StepResult::Skipped(_) => summary.skipped += 1,
            }
        }

        ProvisioningReport {
            success: summary.failed == 0,
            started_at: self.started_at,
            duration,
            summary,
            steps,
        }
    }
}
