//! Activity Data Model
//!
//! Activities own their steps and device associations. Steps and associations
//! refer to their owner and to devices by id rather than by reference.

use crate::{limits, ActivityId, AssociationId, DeviceCommandId, DeviceId, StepId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised when activity attributes break the model limits
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Activity name must not be empty")]
    EmptyName,

    #[error("Activity name too long: {0} chars (max: {max})", max = limits::NAME_MAX_LEN)]
    NameTooLong(usize),

    #[error("Activity description too long: {0} chars (max: {max})", max = limits::DESCRIPTION_MAX_LEN)]
    DescriptionTooLong(usize),
}

/// Category of a registered device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceKind {
    Tv,
    Receiver,
    GameConsole,
    Speaker,
    StreamingBox,
    #[default]
    Other,
}

/// A physical device known to the hub
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Device {
    pub id: DeviceId,
    pub name: String,
    #[serde(default)]
    pub kind: DeviceKind,
    /// Delivery protocol used by the gateway (e.g. "ir", "webos", "denon")
    #[serde(default)]
    pub protocol: String,
}

/// A named command a device understands
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceCommand {
    pub id: DeviceCommandId,
    pub device_id: DeviceId,
    pub name: String,
}

/// The device and command a step sends to, resolved from its DeviceCommand
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepTarget {
    pub device_id: DeviceId,
    pub device_name: String,
    pub command_name: String,
}

impl StepTarget {
    /// Human-readable label used in progress notifications
    pub fn label(&self) -> String {
        format!("{} - {}", self.device_name, self.command_name)
    }
}

/// One command-send operation within an activity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityStep {
    pub id: StepId,
    pub activity_id: ActivityId,
    pub device_command_id: DeviceCommandId,
    pub target: StepTarget,
    pub step_order: i32,
    pub delay_before_ms: u64,
    pub delay_after_ms: u64,
    /// A failed required step aborts the rest of the activity
    pub is_required: bool,
}

/// Association between an activity and a participating device
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityDevice {
    pub id: AssociationId,
    pub activity_id: ActivityId,
    pub device_id: DeviceId,
    pub is_primary_device: bool,
}

/// A named sequence of device commands executed as one unit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Activity {
    pub id: ActivityId,
    pub name: String,
    pub description: Option<String>,
    pub icon: Option<String>,
    pub enabled: bool,
    pub sort_order: i32,
    pub created_at: DateTime<Utc>,
    pub last_used: Option<DateTime<Utc>>,
    pub devices: Vec<ActivityDevice>,
    pub steps: Vec<ActivityStep>,
}

impl Activity {
    /// Steps in execution order
    ///
    /// Steps sharing a StepOrder keep their relative (insertion) order.
    pub fn ordered_steps(&self) -> Vec<&ActivityStep> {
        let mut steps: Vec<&ActivityStep> = self.steps.iter().collect();
        steps.sort_by_key(|s| s.step_order);
        steps
    }

    /// The association flagged as primary, if any
    pub fn primary_device(&self) -> Option<&ActivityDevice> {
        self.devices.iter().find(|d| d.is_primary_device)
    }
}

/// Input for creating an activity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewActivity {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub icon: Option<String>,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Assigned as max + 1 when absent
    #[serde(default)]
    pub sort_order: Option<i32>,
}

fn default_enabled() -> bool {
    true
}

impl NewActivity {
    /// Create input with just a name, enabled, auto sort order
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            icon: None,
            enabled: true,
            sort_order: None,
        }
    }

    /// Check the name and description limits
    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_name(&self.name)?;
        validate_description(self.description.as_deref())
    }
}

/// Partial update of an activity's own attributes
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityPatch {
    pub name: Option<String>,
    pub description: Option<Option<String>>,
    pub icon: Option<Option<String>>,
    pub enabled: Option<bool>,
    pub sort_order: Option<i32>,
    pub last_used: Option<DateTime<Utc>>,
}

impl ActivityPatch {
    /// A patch that only records a use of the activity
    pub fn last_used(at: DateTime<Utc>) -> Self {
        Self {
            last_used: Some(at),
            ..Default::default()
        }
    }

    /// Check the limits of the fields being changed
    pub fn validate(&self) -> Result<(), ValidationError> {
        if let Some(name) = &self.name {
            validate_name(name)?;
        }
        if let Some(description) = &self.description {
            validate_description(description.as_deref())?;
        }
        Ok(())
    }

    /// Apply the patch to an activity
    pub fn apply(&self, activity: &mut Activity) {
        if let Some(name) = &self.name {
            activity.name = name.clone();
        }
        if let Some(description) = &self.description {
            activity.description = description.clone();
        }
        if let Some(icon) = &self.icon {
            activity.icon = icon.clone();
        }
        if let Some(enabled) = self.enabled {
            activity.enabled = enabled;
        }
        if let Some(sort_order) = self.sort_order {
            activity.sort_order = sort_order;
        }
        if let Some(last_used) = self.last_used {
            activity.last_used = Some(last_used);
        }
    }
}

/// Partial update of a step's timing and failure policy
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepPatch {
    pub delay_before_ms: Option<u64>,
    pub delay_after_ms: Option<u64>,
    pub is_required: Option<bool>,
}

impl StepPatch {
    /// Apply the patch to a step
    pub fn apply(&self, step: &mut ActivityStep) {
        if let Some(ms) = self.delay_before_ms {
            step.delay_before_ms = ms;
        }
        if let Some(ms) = self.delay_after_ms {
            step.delay_after_ms = ms;
        }
        if let Some(required) = self.is_required {
            step.is_required = required;
        }
    }
}

fn validate_name(name: &str) -> Result<(), ValidationError> {
    if name.trim().is_empty() {
        return Err(ValidationError::EmptyName);
    }
    let len = name.chars().count();
    if len > limits::NAME_MAX_LEN {
        return Err(ValidationError::NameTooLong(len));
    }
    Ok(())
}

fn validate_description(description: Option<&str>) -> Result<(), ValidationError> {
    if let Some(text) = description {
        let len = text.chars().count();
        if len > limits::DESCRIPTION_MAX_LEN {
            return Err(ValidationError::DescriptionTooLong(len));
        }
    }
    Ok(())
}
