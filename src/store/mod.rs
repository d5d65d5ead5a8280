//! Activity persistence
//!
//! This module handles:
//! - Loading fully populated activity aggregates (steps in StepOrder)
//! - Activity CRUD and saving structural changes
//! - Device and device-command lookup

mod memory;

pub use memory::MemoryStore;

use async_trait::async_trait;
use theater_shared::{
    Activity, ActivityId, ActivityPatch, Device, DeviceCommand, DeviceCommandId, DeviceId,
    NewActivity,
};
use thiserror::Error;

/// Errors raised by a store backend
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("Activity not found: {0}")]
    ActivityNotFound(ActivityId),

    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

/// Persistence for activities and their owned steps and device associations
#[async_trait]
pub trait ActivityStore: Send + Sync {
    /// Load an activity with its steps ascending by StepOrder and their targets populated
    async fn get_by_id(&self, id: ActivityId) -> Result<Option<Activity>, StoreError>;

    /// All activities ordered by (sort order, name)
    async fn get_all(&self) -> Result<Vec<Activity>, StoreError>;

    /// Insert a new activity; sort order defaults to max + 1
    async fn create(&self, input: NewActivity) -> Result<Activity, StoreError>;

    /// Update an activity's own attributes; `None` if it does not exist
    async fn update(
        &self,
        id: ActivityId,
        patch: ActivityPatch,
    ) -> Result<Option<Activity>, StoreError>;

    /// Delete an activity with its steps and associations
    async fn delete(&self, id: ActivityId) -> Result<bool, StoreError>;

    /// Persist an aggregate, replacing its stored steps and associations
    ///
    /// The stored LastUsed is kept; it only changes through `update`.
    async fn save(&self, activity: &Activity) -> Result<(), StoreError>;

    /// Allocate an id for a new step or association
    fn next_id(&self) -> u64;
}

/// Read access to registered devices and their commands
#[async_trait]
pub trait DeviceDirectory: Send + Sync {
    async fn get_device(&self, id: DeviceId) -> Result<Option<Device>, StoreError>;

    async fn get_command(&self, id: DeviceCommandId) -> Result<Option<DeviceCommand>, StoreError>;
}
