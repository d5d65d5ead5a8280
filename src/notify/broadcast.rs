//! Notifiers that forward progress to other sinks

use crate::notify::traits::ProgressNotifier;
use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;
use theater_shared::{ActivityId, ProgressEvent};
use tokio::sync::broadcast;
use tracing::warn;

/// Publishes progress events on a broadcast channel
///
/// Having no subscribers is not an error.
#[derive(Clone)]
pub struct BroadcastNotifier {
    tx: broadcast::Sender<ProgressEvent>,
}

impl BroadcastNotifier {
    /// Create a notifier buffering up to `capacity` events per subscriber
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Receive every event published from now on
    pub fn subscribe(&self) -> broadcast::Receiver<ProgressEvent> {
        self.tx.subscribe()
    }

    /// Number of live subscribers
    pub fn receiver_count(&self) -> usize {
        self.tx.receiver_count()
    }

    fn emit(&self, event: ProgressEvent) -> Result<()> {
        // Err only means nobody is listening
        let _ = self.tx.send(event);
        Ok(())
    }
}

#[async_trait]
impl ProgressNotifier for BroadcastNotifier {
    async fn activity_started(&self, activity_id: ActivityId, activity_name: &str) -> Result<()> {
        self.emit(ProgressEvent::ActivityStarted {
            activity_id,
            activity_name: activity_name.to_string(),
        })
    }

    async fn activity_step_executed(
        &self,
        activity_id: ActivityId,
        activity_name: &str,
        step_order: i32,
        step_label: &str,
        success: bool,
    ) -> Result<()> {
        self.emit(ProgressEvent::ActivityStepExecuted {
            activity_id,
            activity_name: activity_name.to_string(),
            step_order,
            step_label: step_label.to_string(),
            success,
        })
    }

    async fn activity_completed(
        &self,
        activity_id: ActivityId,
        activity_name: &str,
        success: bool,
    ) -> Result<()> {
        self.emit(ProgressEvent::ActivityCompleted {
            activity_id,
            activity_name: activity_name.to_string(),
            success,
        })
    }
}

/// Calls several notifiers in turn; one failing does not stop the others
pub struct FanoutNotifier {
    sinks: Vec<Arc<dyn ProgressNotifier>>,
}

impl FanoutNotifier {
    pub fn new(sinks: Vec<Arc<dyn ProgressNotifier>>) -> Self {
        Self { sinks }
    }

    async fn fan_out(&self, event: ProgressEvent) -> Result<()> {
        for sink in &self.sinks {
            if let Err(e) = sink.publish(&event).await {
                warn!("[PROGRESS] Notifier failed for activity {}: {}", event.activity_id(), e);
            }
        }
        Ok(())
    }
}

#[async_trait]
impl ProgressNotifier for FanoutNotifier {
    async fn activity_started(&self, activity_id: ActivityId, activity_name: &str) -> Result<()> {
        self.fan_out(ProgressEvent::ActivityStarted {
            activity_id,
            activity_name: activity_name.to_string(),
        })
        .await
    }

    async fn activity_step_executed(
        &self,
        activity_id: ActivityId,
        activity_name: &str,
        step_order: i32,
        step_label: &str,
        success: bool,
    ) -> Result<()> {
        self.fan_out(ProgressEvent::ActivityStepExecuted {
            activity_id,
            activity_name: activity_name.to_string(),
            step_order,
            step_label: step_label.to_string(),
            success,
        })
        .await
    }

    async fn activity_completed(
        &self,
        activity_id: ActivityId,
        activity_name: &str,
        success: bool,
    ) -> Result<()> {
        self.fan_out(ProgressEvent::ActivityCompleted {
            activity_id,
            activity_name: activity_name.to_string(),
            success,
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;

    struct FailingNotifier;

    #[async_trait]
    impl ProgressNotifier for FailingNotifier {
        async fn activity_started(&self, _: ActivityId, _: &str) -> Result<()> {
            Err(anyhow!("sink down"))
        }

        async fn activity_step_executed(
            &self,
            _: ActivityId,
            _: &str,
            _: i32,
            _: &str,
            _: bool,
        ) -> Result<()> {
            Err(anyhow!("sink down"))
        }

        async fn activity_completed(&self, _: ActivityId, _: &str, _: bool) -> Result<()> {
            Err(anyhow!("sink down"))
        }
    }

    #[tokio::test]
    async fn test_broadcast_without_subscribers_is_ok() {
        let notifier = BroadcastNotifier::new(8);
        assert!(notifier.activity_started(ActivityId(1), "Movie").await.is_ok());
    }

    #[tokio::test]
    async fn test_broadcast_delivers_events() {
        let notifier = BroadcastNotifier::new(8);
        let mut rx = notifier.subscribe();

        notifier
            .activity_step_executed(ActivityId(1), "Movie", 2, "TV - PowerOn", true)
            .await
            .unwrap();

        assert_eq!(
            rx.recv().await.unwrap(),
            ProgressEvent::ActivityStepExecuted {
                activity_id: ActivityId(1),
                activity_name: "Movie".into(),
                step_order: 2,
                step_label: "TV - PowerOn".into(),
                success: true,
            }
        );
    }

    #[tokio::test]
    async fn test_fanout_skips_failing_sink() {
        let broadcast = BroadcastNotifier::new(8);
        let mut rx = broadcast.subscribe();
        let sinks: Vec<Arc<dyn ProgressNotifier>> =
            vec![Arc::new(FailingNotifier), Arc::new(broadcast.clone())];
        let fanout = FanoutNotifier::new(sinks);

        assert!(fanout
            .activity_completed(ActivityId(5), "Gaming", false)
            .await
            .is_ok());
        assert!(matches!(
            rx.recv().await.unwrap(),
            ProgressEvent::ActivityCompleted { success: false, .. }
        ));
    }
}
