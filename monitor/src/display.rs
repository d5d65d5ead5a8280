//! One-line rendering of progress events

use theater_shared::ProgressEvent;

fn outcome(success: bool) -> &'static str {
    if success {
        "ok"
    } else {
        "FAILED"
    }
}

pub fn describe(event: &ProgressEvent) -> String {
    match event {
        ProgressEvent::ActivityStarted {
            activity_id,
            activity_name,
        } => format!("[{}] {} started", activity_id, activity_name),
        ProgressEvent::ActivityStepExecuted {
            activity_id,
            activity_name,
            step_order,
            step_label,
            success,
        } => format!(
            "[{}] {} step {}: {} {}",
            activity_id,
            activity_name,
            step_order,
            step_label,
            outcome(*success)
        ),
        ProgressEvent::ActivityCompleted {
            activity_id,
            activity_name,
            success,
        } => format!(
            "[{}] {} finished {}",
            activity_id,
            activity_name,
            outcome(*success)
        ),
    }
}
