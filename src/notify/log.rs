//! Notifier that writes progress to the log

use crate::notify::traits::ProgressNotifier;
use anyhow::Result;
use async_trait::async_trait;
use theater_shared::ActivityId;
use tracing::{info, warn};

#[derive(Debug, Default)]
pub struct LogNotifier;

#[async_trait]
impl ProgressNotifier for LogNotifier {
    async fn activity_started(&self, activity_id: ActivityId, activity_name: &str) -> Result<()> {
        info!("[PROGRESS] {} ({}) started", activity_name, activity_id);
        Ok(())
    }

    async fn activity_step_executed(
        &self,
        activity_id: ActivityId,
        activity_name: &str,
        step_order: i32,
        step_label: &str,
        success: bool,
    ) -> Result<()> {
        if success {
            info!(
                "[PROGRESS] {} ({}) step {}: {} ok",
                activity_name, activity_id, step_order, step_label
            );
        } else {
            warn!(
                "[PROGRESS] {} ({}) step {}: {} FAILED",
                activity_name, activity_id, step_order, step_label
            );
        }
        Ok(())
    }

    async fn activity_completed(
        &self,
        activity_id: ActivityId,
        activity_name: &str,
        success: bool,
    ) -> Result<()> {
        if success {
            info!("[PROGRESS] {} ({}) completed", activity_name, activity_id);
        } else {
            warn!("[PROGRESS] {} ({}) failed", activity_name, activity_id);
        }
        Ok(())
    }
}
