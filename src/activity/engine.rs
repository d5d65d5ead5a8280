//! Activity execution engine - runs an activity's steps against the gateway

use super::runs::{ActiveRun, RunRegistry};
use crate::gateway::DeviceCommandGateway;
use crate::notify::ProgressNotifier;
use crate::store::ActivityStore;
use anyhow::{anyhow, Result};
use chrono::Utc;
use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use theater_shared::{Activity, ActivityId, ActivityPatch, ActivityStep, ProgressEvent};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// How a run ended
#[derive(Debug, Clone, PartialEq, Eq)]
enum RunOutcome {
    /// Every step was attempted and no required step failed
    Completed,
    /// A required step failed; later steps were skipped
    RequiredStepFailed { step_order: i32, label: String },
    /// Cancellation was observed at a checkpoint
    Cancelled,
}

/// Executes activities one step at a time
pub struct ActivityEngine {
    store: Arc<dyn ActivityStore>,
    gateway: Arc<dyn DeviceCommandGateway>,
    notifier: Arc<dyn ProgressNotifier>,
    runs: RunRegistry,
}

impl ActivityEngine {
    /// Create a new engine
    pub fn new(
        store: Arc<dyn ActivityStore>,
        gateway: Arc<dyn DeviceCommandGateway>,
        notifier: Arc<dyn ProgressNotifier>,
    ) -> Self {
        Self {
            store,
            gateway,
            notifier,
            runs: RunRegistry::new(),
        }
    }

    /// Execute an activity, returning whether it fully succeeded
    ///
    /// Never fails with an error: a missing or disabled activity, a failed
    /// required step, cancellation and store errors all yield `false`.
    pub async fn execute(&self, activity_id: ActivityId, cancel: CancellationToken) -> bool {
        let activity = match self.store.get_by_id(activity_id).await {
            Ok(Some(activity)) if activity.enabled => activity,
            Ok(Some(_)) => {
                warn!("[ENGINE] Activity {} is disabled", activity_id);
                return false;
            }
            Ok(None) => {
                warn!("[ENGINE] Activity {} not found", activity_id);
                return false;
            }
            Err(e) => {
                error!("[ENGINE] Failed to load activity {}: {}", activity_id, e);
                return false;
            }
        };

        let guard = self.runs.register(activity_id, cancel.child_token());
        info!(
            "[ENGINE] Executing activity {} ({}) run={} steps={}",
            activity.id,
            activity.name,
            guard.run().run_id,
            activity.steps.len()
        );

        self.notify(ProgressEvent::ActivityStarted {
            activity_id: activity.id,
            activity_name: activity.name.clone(),
        })
        .await;

        let outcome = AssertUnwindSafe(self.run_steps(&activity, guard.run().cancel_token()))
            .catch_unwind()
            .await;

        let success = match outcome {
            Ok(Ok(RunOutcome::Completed)) => {
                info!("[ENGINE] Activity {} completed", activity.name);
                true
            }
            Ok(Ok(RunOutcome::RequiredStepFailed { step_order, label })) => {
                warn!(
                    "[ENGINE] Activity {} aborted: required step {} ({}) failed",
                    activity.name, step_order, label
                );
                false
            }
            Ok(Ok(RunOutcome::Cancelled)) => {
                info!("[ENGINE] Activity {} cancelled", activity.name);
                false
            }
            Ok(Err(e)) => {
                error!("[ENGINE] Activity {} failed: {}", activity.name, e);
                false
            }
            Err(_) => {
                error!("[ENGINE] Activity {} panicked during execution", activity.name);
                false
            }
        };

        drop(guard);

        self.notify(ProgressEvent::ActivityCompleted {
            activity_id: activity.id,
            activity_name: activity.name.clone(),
            success,
        })
        .await;

        success
    }

    /// Ask every run of `activity_id` to stop at its next checkpoint
    ///
    /// Always acknowledged, whether or not a run was in flight.
    pub async fn request_stop(&self, activity_id: ActivityId) -> bool {
        let signalled = self.runs.cancel_activity(activity_id);
        if signalled == 0 {
            debug!("[ENGINE] Stop requested for idle activity {}", activity_id);
        } else {
            info!(
                "[ENGINE] Stop requested for activity {} ({} run(s))",
                activity_id, signalled
            );
        }
        true
    }

    /// Whether the activity currently has a run in flight
    pub fn is_running(&self, activity_id: ActivityId) -> bool {
        self.runs.is_running(activity_id)
    }

    /// Runs in flight, oldest first
    pub fn active_runs(&self) -> Vec<ActiveRun> {
        self.runs.active()
    }

    /// Run the steps of a loaded snapshot, then record the use
    async fn run_steps(&self, activity: &Activity, cancel: &CancellationToken) -> Result<RunOutcome> {
        for step in activity.ordered_steps() {
            if cancel.is_cancelled() {
                return Ok(RunOutcome::Cancelled);
            }

            if step.delay_before_ms > 0 && !wait(step.delay_before_ms, cancel).await {
                return Ok(RunOutcome::Cancelled);
            }

            let success = self.send_step(step, cancel).await;
            let label = step.target.label();

            self.notify(ProgressEvent::ActivityStepExecuted {
                activity_id: activity.id,
                activity_name: activity.name.clone(),
                step_order: step.step_order,
                step_label: label.clone(),
                success,
            })
            .await;

            if !success {
                if step.is_required {
                    return Ok(RunOutcome::RequiredStepFailed {
                        step_order: step.step_order,
                        label,
                    });
                }
                warn!(
                    "[ENGINE] Optional step {} ({}) failed, continuing",
                    step.step_order, label
                );
            }

            if step.delay_after_ms > 0 && !wait(step.delay_after_ms, cancel).await {
                return Ok(RunOutcome::Cancelled);
            }
        }

        // Patch only LastUsed so structural edits made during the run survive
        self.store
            .update(activity.id, ActivityPatch::last_used(Utc::now()))
            .await?
            .ok_or_else(|| anyhow!("Activity {} was deleted during execution", activity.id))?;

        Ok(RunOutcome::Completed)
    }

    /// Send one step's command; errors and panics count as failure
    async fn send_step(&self, step: &ActivityStep, cancel: &CancellationToken) -> bool {
        debug!(
            "[ENGINE] Step {}: {} via {}",
            step.step_order,
            step.target.label(),
            self.gateway.name()
        );

        let send = self
            .gateway
            .send(step.target.device_id, &step.target.command_name, cancel);

        match AssertUnwindSafe(send).catch_unwind().await {
            Ok(Ok(delivered)) => delivered,
            Ok(Err(e)) => {
                error!("[ENGINE] Step {} ({}) errored: {}", step.step_order, step.target.label(), e);
                false
            }
            Err(_) => {
                error!("[ENGINE] Step {} ({}) panicked", step.step_order, step.target.label());
                false
            }
        }
    }

    /// Report progress; notifier failures are logged and dropped
    async fn notify(&self, event: ProgressEvent) {
        match AssertUnwindSafe(self.notifier.publish(&event)).catch_unwind().await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!("[ENGINE] Progress notification failed: {}", e),
            Err(_) => warn!("[ENGINE] Progress notifier panicked"),
        }
    }
}

/// Sleep for `ms`, returning false if cancelled first
async fn wait(ms: u64, cancel: &CancellationToken) -> bool {
    tokio::select! {
        _ = tokio::time::sleep(Duration::from_millis(ms)) => true,
        _ = cancel.cancelled() => false,
    }
}
