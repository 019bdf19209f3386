//! Provisioning engine.
//!
//! [`ProvisioningEngine::execute`] walks an [`ExecutionPlan`] strictly in
//! order and drives a [`ProviderAdapter`] for each descriptor:
//!
//! 1. Stop launching steps once cancellation is requested; the rest are
//!    recorded as `Skipped(Cancelled)`.
//! 2. Skip a descriptor whose prerequisite failed or was skipped.
//! 3. Check whether the resource exists; if so it is `AlreadyExists`.
//! 4. Otherwise create it. A create error classified as already-exists
//!    means another creator got there first and also counts as
//!    `AlreadyExists`.
//!
//! Adapter calls run under the engine's [`RetryPolicy`]. Failures are
//! recorded in the report and never abort the run, so independent branches
//! of the plan are still attempted.

use std::sync::Arc;
use std::time::Instant;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, info_span, warn, Instrument};

use crate::adapter::{AdapterErrorKind, AdapterResult, ProviderAdapter};
use crate::planner::ExecutionPlan;
use crate::report::{ProvisioningReport, ReportBuilder, SkipCause, StepOutcome, StepResult};
use crate::resource::{ResourceDescriptor, ResourceKind};
use crate::retry::RetryPolicy;

/// Receives step progress from the engine.
///
/// Both hooks default to doing nothing.
pub trait ProvisionObserver: Send + Sync {
    /// Called before the adapter is contacted for a step.
    fn on_step_started(&self, _descriptor: &ResourceDescriptor) {}

    /// Called once per planned descriptor with its final outcome.
    fn on_step_finished(&self, _outcome: &StepOutcome) {}
}

/// Executes plans against a provider adapter.
#[derive(Clone, Default)]
pub struct ProvisioningEngine {
    retry: RetryPolicy,
    cancel: CancellationToken,
    observer: Option<Arc<dyn ProvisionObserver>>,
}

impl std::fmt::Debug for ProvisioningEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProvisioningEngine")
            .field("retry", &self.retry)
            .field("cancelled", &self.cancel.is_cancelled())
            .field("observer", &self.observer.is_some())
            .finish()
    }
}

impl ProvisioningEngine {
    /// Create an engine with the given retry policy.
    pub fn new(retry: RetryPolicy) -> Self {
        Self {
            retry,
            ..Default::default()
        }
    }

    /// Use an externally owned cancellation token.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Attach a progress observer.
    pub fn with_observer(mut self, observer: Arc<dyn ProvisionObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    /// The retry policy in use.
    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    /// Token that stops the engine between steps when cancelled.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Execute every step of `plan` against `adapter`.
    pub async fn execute(
        &self,
        plan: &ExecutionPlan,
        adapter: &dyn ProviderAdapter,
    ) -> ProvisioningReport {
        let run_start = Instant::now();
        let mut report = ReportBuilder::new(plan);

        info!(
            steps = plan.len(),
            adapter = adapter.name(),
            "Starting provisioning run"
        );

        for descriptor in plan {
            if self.cancel.is_cancelled() {
                info!(resource = %descriptor.id(), "Run cancelled, skipping remaining steps");
                self.finish_step(
                    &mut report,
                    StepOutcome::skipped(descriptor.id().clone(), SkipCause::Cancelled),
                );
                continue;
            }

            let blocked_by = descriptor
                .depends_on()
                .iter()
                .find(|dep| !report.result(dep).is_some_and(StepResult::is_satisfied));
            if let Some(dep) = blocked_by {
                info!(resource = %descriptor.id(), dependency = %dep, "Skipping step");
                self.finish_step(
                    &mut report,
                    StepOutcome::skipped(descriptor.id().clone(), SkipCause::Dependency(dep.clone())),
                );
                continue;
            }

            if let Some(observer) = &self.observer {
                observer.on_step_started(descriptor);
            }

            let span = info_span!("step", resource = %descriptor.id());
            let outcome = self.run_step(descriptor, adapter).instrument(span).await;
            self.finish_step(&mut report, outcome);
        }

        let report = report.finish(run_start.elapsed());
        info!(
            success = report.success,
            created = report.summary.created,
            already_exists = report.summary.already_exists,
            failed = report.summary.failed,
            skipped = report.summary.skipped,
            "Provisioning run finished"
        );
        report
    }

    async fn run_step(
        &self,
        descriptor: &ResourceDescriptor,
        adapter: &dyn ProviderAdapter,
    ) -> StepOutcome {
        let started = Instant::now();
        let outcome = |result: StepResult, attempts: u32| StepOutcome {
            id: descriptor.id().clone(),
            result,
            attempts,
            duration: started.elapsed(),
        };

        match self
            .retry
            .execute(|| adapter.resource_exists(descriptor))
            .await
        {
            Ok(true) => {
                debug!("Resource already exists");
                return outcome(StepResult::AlreadyExists, 0);
            }
            Ok(false) => {}
            Err(err) => {
                let err = err.into_inner();
                warn!(error = %err, "Existence check failed");
                return outcome(StepResult::Failed(err), 0);
            }
        }

        let mut attempts = 0u32;
        let created = self
            .retry
            .execute(|| {
                attempts += 1;
                create_resource(adapter, descriptor)
            })
            .await;

        match created {
            Ok(()) => outcome(StepResult::Created, attempts),
            Err(err) => {
                let err = err.into_inner();
                if err.kind == AdapterErrorKind::AlreadyExists {
                    debug!("Resource was created concurrently");
                    outcome(StepResult::AlreadyExists, attempts)
                } else {
                    warn!(error = %err, attempts, "Create failed");
                    outcome(StepResult::Failed(err), attempts)
                }
            }
        }
    }

    fn finish_step(&self, report: &mut ReportBuilder, outcome: StepOutcome) {
        match &outcome.result {
            StepResult::Failed(err) => warn!(resource = %outcome.id, error = %err, "Step failed"),
            result => info!(resource = %outcome.id, result = result.label(), "Step finished"),
        }
        if let Some(observer) = &self.observer {
            observer.on_step_finished(&outcome);
        }
        report.record(outcome);
    }
}

async fn create_resource(
    adapter: &dyn ProviderAdapter,
    descriptor: &ResourceDescriptor,
) -> AdapterResult<()> {
    match descriptor.kind() {
        ResourceKind::Project => {
            adapter
                .create_project(descriptor.name(), descriptor.parameters())
                .await
        }
        ResourceKind::Service => adapter.enable_service(descriptor.name()).await,
        ResourceKind::Bucket => {
            adapter
                .create_bucket(descriptor.name(), descriptor.parameters())
                .await
        }
    }
}
