//! Progress notifier trait

use anyhow::Result;
use async_trait::async_trait;
use theater_shared::{ActivityId, ProgressEvent};

/// Sink for activity progress
///
/// The engine isolates failures: an `Err` (or panic) from any method is
/// logged and never affects the run.
#[async_trait]
pub trait ProgressNotifier: Send + Sync {
    async fn activity_started(&self, activity_id: ActivityId, activity_name: &str) -> Result<()>;

    async fn activity_step_executed(
        &self,
        activity_id: ActivityId,
        activity_name: &str,
        step_order: i32,
        step_label: &str,
        success: bool,
    ) -> Result<()>;

    async fn activity_completed(
        &self,
        activity_id: ActivityId,
        activity_name: &str,
        success: bool,
    ) -> Result<()>;

    /// Dispatch a progress event to the matching method
    async fn publish(&self, event: &ProgressEvent) -> Result<()> {
        match event {
            ProgressEvent::ActivityStarted {
                activity_id,
                activity_name,
            } => self.activity_started(*activity_id, activity_name).await,
            ProgressEvent::ActivityStepExecuted {
                activity_id,
                activity_name,
                step_order,
                step_label,
                success,
            } => {
                self.activity_step_executed(
                    *activity_id,
                    activity_name,
                    *step_order,
                    step_label,
                    *success,
                )
                .await
            }
            ProgressEvent::ActivityCompleted {
                activity_id,
                activity_name,
                success,
            } => {
                self.activity_completed(*activity_id, activity_name, *success)
                    .await
            }
        }
    }
}
