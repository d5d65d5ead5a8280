//! Theater Hub Shared Types
//!
//! This crate provides the model types, progress events and frame codec shared
//! between the hub, the device bridge and the progress monitor.

pub mod codec;
pub mod events;
pub mod model;

use serde::{Deserialize, Serialize};
use std::fmt;

pub use events::{Frame, ProgressEvent};
pub use model::{
    Activity, ActivityDevice, ActivityPatch, ActivityStep, Device, DeviceCommand, DeviceKind,
    NewActivity, StepPatch, StepTarget, ValidationError,
};

/// Validation limits for activities
pub mod limits {
    /// Maximum activity name length in characters
    pub const NAME_MAX_LEN: usize = 100;

    /// Maximum activity description length in characters
    pub const DESCRIPTION_MAX_LEN: usize = 500;
}

macro_rules! id_type {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub u64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                fmt::Display::fmt(&self.0, f)
            }
        }

        impl From<u64> for $name {
            fn from(value: u64) -> Self {
                Self(value)
            }
        }
    };
}

id_type!(
    /// Identifies an activity
    ActivityId
);
id_type!(
    /// Identifies a step within an activity
    StepId
);
id_type!(
    /// Identifies a physical device
    DeviceId
);
id_type!(
    /// Identifies a named command belonging to a device
    DeviceCommandId
);
id_type!(
    /// Identifies an activity/device association row
    AssociationId
);
