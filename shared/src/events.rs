//! Progress events and wire frames
//!
//! Frames travel between the hub and the device bridge (command delivery)
//! and from the hub to progress monitors.

use crate::{ActivityId, DeviceId};
use serde::{Deserialize, Serialize};

/// Progress of an activity run, as reported to monitors
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ProgressEvent {
    /// The run has started
    ActivityStarted {
        activity_id: ActivityId,
        activity_name: String,
    },
    /// A step's command was attempted
    ActivityStepExecuted {
        activity_id: ActivityId,
        activity_name: String,
        step_order: i32,
        step_label: String,
        success: bool,
    },
    /// The run has finished
    ActivityCompleted {
        activity_id: ActivityId,
        activity_name: String,
        success: bool,
    },
}

impl ProgressEvent {
    /// Activity this event belongs to
    pub fn activity_id(&self) -> ActivityId {
        match self {
            ProgressEvent::ActivityStarted { activity_id, .. }
            | ProgressEvent::ActivityStepExecuted { activity_id, .. }
            | ProgressEvent::ActivityCompleted { activity_id, .. } => *activity_id,
        }
    }
}

/// A message on the hub's TCP links
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Frame {
    /// Ask the bridge to deliver a named command to a device
    SendCommand {
        request_id: u64,
        device_id: DeviceId,
        command: String,
    },
    /// Delivery outcome for a previous SendCommand
    CommandResult {
        request_id: u64,
        success: bool,
        #[serde(default)]
        message: String,
    },
    /// Activity progress pushed to monitors
    Progress { event: ProgressEvent },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_progress_event_json_shape() {
        let event = ProgressEvent::ActivityStepExecuted {
            activity_id: ActivityId(3),
            activity_name: "Movie Night".into(),
            step_order: 2,
            step_label: "Receiver - InputHDMI1".into(),
            success: false,
        };
        let json: serde_json::Value = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "activity_step_executed");
        assert_eq!(json["activity_id"], 3);
        assert_eq!(json["step_label"], "Receiver - InputHDMI1");
        assert_eq!(event.activity_id(), ActivityId(3));
    }

    #[test]
    fn test_command_result_message_defaults() {
        let frame: Frame =
            serde_json::from_str(r#"{"type":"command_result","request_id":9,"success":true}"#)
                .unwrap();
        assert_eq!(
            frame,
            Frame::CommandResult {
                request_id: 9,
                success: true,
                message: String::new(),
            }
        );
    }
}
