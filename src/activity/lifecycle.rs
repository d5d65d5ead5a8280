//! Activity lifecycle management
//!
//! Maintains the steps and device associations the engine consumes. Each
//! operation loads the aggregate, mutates it and saves it back. Missing
//! activities, devices and commands yield `None`/`false` rather than errors.

use crate::error::HubError;
use crate::store::{ActivityStore, DeviceDirectory};
use std::collections::HashSet;
use std::sync::Arc;
use theater_shared::{
    Activity, ActivityDevice, ActivityId, ActivityPatch, ActivityStep, AssociationId,
    DeviceCommandId, DeviceId, NewActivity, StepId, StepPatch, StepTarget,
};
use tracing::{debug, info};

/// Structural operations on activities
pub struct LifecycleManager {
    store: Arc<dyn ActivityStore>,
    devices: Arc<dyn DeviceDirectory>,
}

impl LifecycleManager {
    pub fn new(store: Arc<dyn ActivityStore>, devices: Arc<dyn DeviceDirectory>) -> Self {
        Self { store, devices }
    }

    /// Create an activity; sort order defaults to max + 1
    pub async fn create_activity(&self, input: NewActivity) -> Result<Activity, HubError> {
        input.validate()?;
        let activity = self.store.create(input).await?;
        info!(
            "[LIFECYCLE] Created activity {} ({}) sort_order={}",
            activity.id, activity.name, activity.sort_order
        );
        Ok(activity)
    }

    pub async fn update_activity(
        &self,
        activity_id: ActivityId,
        patch: ActivityPatch,
    ) -> Result<Option<Activity>, HubError> {
        patch.validate()?;
        Ok(self.store.update(activity_id, patch).await?)
    }

    /// Delete an activity together with its steps and associations
    pub async fn delete_activity(&self, activity_id: ActivityId) -> Result<bool, HubError> {
        let deleted = self.store.delete(activity_id).await?;
        if deleted {
            info!("[LIFECYCLE] Deleted activity {}", activity_id);
        }
        Ok(deleted)
    }

    pub async fn get_activity(&self, activity_id: ActivityId) -> Result<Option<Activity>, HubError> {
        Ok(self.store.get_by_id(activity_id).await?)
    }

    /// All activities by (sort order, name)
    pub async fn list_activities(&self) -> Result<Vec<Activity>, HubError> {
        Ok(self.store.get_all().await?)
    }

    /// Add a device to an activity, or update its primary flag if already present
    ///
    /// Returns the refreshed activity, or `None` if the activity or device is missing.
    pub async fn add_device_to_activity(
        &self,
        activity_id: ActivityId,
        device_id: DeviceId,
        is_primary: bool,
    ) -> Result<Option<Activity>, HubError> {
        let Some(mut activity) = self.store.get_by_id(activity_id).await? else {
            return Ok(None);
        };
        if self.devices.get_device(device_id).await?.is_none() {
            return Ok(None);
        }

        match activity.devices.iter_mut().find(|d| d.device_id == device_id) {
            Some(existing) => existing.is_primary_device = is_primary,
            None => activity.devices.push(ActivityDevice {
                id: AssociationId(self.store.next_id()),
                activity_id,
                device_id,
                is_primary_device: is_primary,
            }),
        }

        self.store.save(&activity).await?;
        debug!(
            "[LIFECYCLE] Device {} in activity {} (primary={})",
            device_id, activity_id, is_primary
        );

        Ok(self.store.get_by_id(activity_id).await?)
    }

    /// Remove a device association; false if there was none
    pub async fn remove_device_from_activity(
        &self,
        activity_id: ActivityId,
        device_id: DeviceId,
    ) -> Result<bool, HubError> {
        let Some(mut activity) = self.store.get_by_id(activity_id).await? else {
            return Ok(false);
        };

        let before = activity.devices.len();
        activity.devices.retain(|d| d.device_id != device_id);
        if activity.devices.len() == before {
            return Ok(false);
        }

        self.store.save(&activity).await?;
        Ok(true)
    }

    /// Append a required step sending `device_command_id`
    ///
    /// `step_order` is taken as given: existing steps are not renumbered and
    /// duplicates are allowed (they run in insertion order).
    pub async fn add_step_to_activity(
        &self,
        activity_id: ActivityId,
        device_command_id: DeviceCommandId,
        step_order: i32,
        delay_before_ms: u64,
        delay_after_ms: u64,
    ) -> Result<Option<ActivityStep>, HubError> {
        let Some(mut activity) = self.store.get_by_id(activity_id).await? else {
            return Ok(None);
        };
        let Some(command) = self.devices.get_command(device_command_id).await? else {
            return Ok(None);
        };

        let device_name = match self.devices.get_device(command.device_id).await? {
            Some(device) => device.name,
            None => format!("Device {}", command.device_id),
        };

        let step = ActivityStep {
            id: StepId(self.store.next_id()),
            activity_id,
            device_command_id,
            target: StepTarget {
                device_id: command.device_id,
                device_name,
                command_name: command.name,
            },
            step_order,
            delay_before_ms,
            delay_after_ms,
            is_required: true,
        };
        activity.steps.push(step.clone());

        self.store.save(&activity).await?;
        debug!(
            "[LIFECYCLE] Added step {} ({}) to activity {} at order {}",
            step.id,
            step.target.label(),
            activity_id,
            step_order
        );

        Ok(Some(step))
    }

    /// Change a step's delays or required flag
    pub async fn update_step(
        &self,
        activity_id: ActivityId,
        step_id: StepId,
        patch: StepPatch,
    ) -> Result<Option<ActivityStep>, HubError> {
        let Some(mut activity) = self.store.get_by_id(activity_id).await? else {
            return Ok(None);
        };
        let Some(step) = activity.steps.iter_mut().find(|s| s.id == step_id) else {
            return Ok(None);
        };

        patch.apply(step);
        let updated = step.clone();

        self.store.save(&activity).await?;
        Ok(Some(updated))
    }

    /// Remove a step; false if it does not belong to the activity
    pub async fn remove_step_from_activity(
        &self,
        activity_id: ActivityId,
        step_id: StepId,
    ) -> Result<bool, HubError> {
        let Some(mut activity) = self.store.get_by_id(activity_id).await? else {
            return Ok(false);
        };

        let before = activity.steps.len();
        activity.steps.retain(|s| s.id != step_id);
        if activity.steps.len() == before {
            return Ok(false);
        }

        self.store.save(&activity).await?;
        Ok(true)
    }

    /// Renumber steps 1..N in the given order
    ///
    /// `ordered_step_ids` must be exactly the activity's steps (same count, no
    /// duplicates, no foreign ids); otherwise nothing changes and false is returned.
    pub async fn reorder_activity_steps(
        &self,
        activity_id: ActivityId,
        ordered_step_ids: &[StepId],
    ) -> Result<bool, HubError> {
        let Some(mut activity) = self.store.get_by_id(activity_id).await? else {
            return Ok(false);
        };

        let existing: HashSet<StepId> = activity.steps.iter().map(|s| s.id).collect();
        let requested: HashSet<StepId> = ordered_step_ids.iter().copied().collect();
        if ordered_step_ids.len() != activity.steps.len()
            || requested.len() != ordered_step_ids.len()
            || requested != existing
        {
            debug!(
                "[LIFECYCLE] Rejected reorder of activity {}: ids do not match its steps",
                activity_id
            );
            return Ok(false);
        }

        for (index, step_id) in ordered_step_ids.iter().enumerate() {
            if let Some(step) = activity.steps.iter_mut().find(|s| s.id == *step_id) {
                step.step_order = index as i32 + 1;
            }
        }

        self.store.save(&activity).await?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use theater_shared::{Device, DeviceCommand, DeviceKind, ValidationError};

    async fn setup() -> (Arc<MemoryStore>, LifecycleManager) {
        let store = Arc::new(MemoryStore::new());
        for (id, name, kind) in [(1, "TV", DeviceKind::Tv), (2, "Receiver", DeviceKind::Receiver)] {
            store
                .register_device(Device {
                    id: DeviceId(id),
                    name: name.into(),
                    kind,
                    protocol: "ir".into(),
                })
                .await;
        }
        for (id, device, name) in [(11, 1, "PowerOn"), (12, 1, "PowerOff"), (21, 2, "InputHdmi1")] {
            store
                .register_command(DeviceCommand {
                    id: DeviceCommandId(id),
                    device_id: DeviceId(device),
                    name: name.into(),
                })
                .await;
        }
        let manager = LifecycleManager::new(store.clone(), store.clone());
        (store, manager)
    }

    async fn activity_with_steps(manager: &LifecycleManager, count: i32) -> (ActivityId, Vec<StepId>) {
        let activity = manager
            .create_activity(NewActivity::named("Movie Night"))
            .await
            .unwrap();
        let mut ids = Vec::new();
        for order in 1..=count {
            let step = manager
                .add_step_to_activity(activity.id, DeviceCommandId(11), order, 0, 0)
                .await
                .unwrap()
                .unwrap();
            ids.push(step.id);
        }
        (activity.id, ids)
    }

    #[tokio::test]
    async fn test_create_validates_and_assigns_sort_order() {
        let (_, manager) = setup().await;

        let err = manager.create_activity(NewActivity::named("")).await.unwrap_err();
        assert!(matches!(err, HubError::Validation(ValidationError::EmptyName)));

        let first = manager.create_activity(NewActivity::named("Watch TV")).await.unwrap();
        let second = manager.create_activity(NewActivity::named("Gaming")).await.unwrap();
        assert_eq!(second.sort_order, first.sort_order + 1);
        assert!(first.enabled);
    }

    #[tokio::test]
    async fn test_add_device_upserts_association() {
        let (_, manager) = setup().await;
        let activity = manager.create_activity(NewActivity::named("Movie")).await.unwrap();

        manager
            .add_device_to_activity(activity.id, DeviceId(1), true)
            .await
            .unwrap()
            .unwrap();
        let refreshed = manager
            .add_device_to_activity(activity.id, DeviceId(1), false)
            .await
            .unwrap()
            .unwrap();

        assert_eq!(refreshed.devices.len(), 1);
        assert!(!refreshed.devices[0].is_primary_device);
        assert!(refreshed.primary_device().is_none());
    }

    #[tokio::test]
    async fn test_add_device_missing_refs() {
        let (_, manager) = setup().await;
        let activity = manager.create_activity(NewActivity::named("Movie")).await.unwrap();

        assert!(manager
            .add_device_to_activity(activity.id, DeviceId(99), true)
            .await
            .unwrap()
            .is_none());
        assert!(manager
            .add_device_to_activity(ActivityId(999), DeviceId(1), true)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_remove_device() {
        let (_, manager) = setup().await;
        let activity = manager.create_activity(NewActivity::named("Movie")).await.unwrap();
        manager
            .add_device_to_activity(activity.id, DeviceId(2), true)
            .await
            .unwrap();

        assert!(manager
            .remove_device_from_activity(activity.id, DeviceId(2))
            .await
            .unwrap());
        assert!(!manager
            .remove_device_from_activity(activity.id, DeviceId(2))
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_add_step_defaults_and_target() {
        let (_, manager) = setup().await;
        let activity = manager.create_activity(NewActivity::named("Movie")).await.unwrap();

        let step = manager
            .add_step_to_activity(activity.id, DeviceCommandId(21), 4, 250, 0)
            .await
            .unwrap()
            .unwrap();

        assert!(step.is_required);
        assert_eq!(step.step_order, 4);
        assert_eq!(step.delay_before_ms, 250);
        assert_eq!(step.target.label(), "Receiver - InputHdmi1");
        assert_eq!(step.target.device_id, DeviceId(2));

        assert!(manager
            .add_step_to_activity(activity.id, DeviceCommandId(404), 1, 0, 0)
            .await
            .unwrap()
            .is_none());
        assert!(manager
            .add_step_to_activity(ActivityId(404), DeviceCommandId(11), 1, 0, 0)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_add_step_allows_duplicate_order() {
        let (_, manager) = setup().await;
        let activity = manager.create_activity(NewActivity::named("Movie")).await.unwrap();

        let first = manager
            .add_step_to_activity(activity.id, DeviceCommandId(11), 1, 0, 0)
            .await
            .unwrap()
            .unwrap();
        let second = manager
            .add_step_to_activity(activity.id, DeviceCommandId(21), 1, 0, 0)
            .await
            .unwrap()
            .unwrap();

        let loaded = manager.get_activity(activity.id).await.unwrap().unwrap();
        let ids: Vec<StepId> = loaded.ordered_steps().iter().map(|s| s.id).collect();
        assert_eq!(ids, vec![first.id, second.id]);
    }

    #[tokio::test]
    async fn test_remove_step_scoped_to_activity() {
        let (_, manager) = setup().await;
        let (movie, movie_steps) = activity_with_steps(&manager, 2).await;
        let (other, _) = activity_with_steps(&manager, 1).await;

        assert!(!manager
            .remove_step_from_activity(other, movie_steps[0])
            .await
            .unwrap());
        assert!(manager
            .remove_step_from_activity(movie, movie_steps[0])
            .await
            .unwrap());

        let loaded = manager.get_activity(movie).await.unwrap().unwrap();
        assert_eq!(loaded.steps.len(), 1);
    }

    #[tokio::test]
    async fn test_update_step_marks_optional() {
        let (_, manager) = setup().await;
        let (movie, steps) = activity_with_steps(&manager, 1).await;

        let patch = StepPatch {
            is_required: Some(false),
            delay_after_ms: Some(1500),
            ..Default::default()
        };
        let updated = manager
            .update_step(movie, steps[0], patch.clone())
            .await
            .unwrap()
            .unwrap();
        assert!(!updated.is_required);
        assert_eq!(updated.delay_after_ms, 1500);

        let loaded = manager.get_activity(movie).await.unwrap().unwrap();
        assert!(!loaded.steps[0].is_required);

        assert!(manager
            .update_step(movie, StepId(12345), patch)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_reorder_exact_permutation() {
        let (_, manager) = setup().await;
        let (movie, steps) = activity_with_steps(&manager, 3).await;

        let order = vec![steps[2], steps[0], steps[1]];
        assert!(manager.reorder_activity_steps(movie, &order).await.unwrap());

        let loaded = manager.get_activity(movie).await.unwrap().unwrap();
        let by_order: Vec<(StepId, i32)> = loaded
            .ordered_steps()
            .iter()
            .map(|s| (s.id, s.step_order))
            .collect();
        assert_eq!(by_order, vec![(steps[2], 1), (steps[0], 2), (steps[1], 3)]);
    }

    #[tokio::test]
    async fn test_reorder_rejects_mismatched_ids() {
        let (_, manager) = setup().await;
        let (movie, steps) = activity_with_steps(&manager, 3).await;
        let (_, foreign) = activity_with_steps(&manager, 1).await;

        let rejected = [
            vec![steps[0], steps[1]],
            vec![steps[0], steps[1], steps[2], steps[0]],
            vec![steps[0], steps[0], steps[1]],
            vec![steps[0], steps[1], foreign[0]],
        ];
        for order in rejected {
            assert!(!manager.reorder_activity_steps(movie, &order).await.unwrap());
        }
        assert!(!manager
            .reorder_activity_steps(ActivityId(404), &steps)
            .await
            .unwrap());

        let loaded = manager.get_activity(movie).await.unwrap().unwrap();
        let orders: Vec<i32> = loaded.steps.iter().map(|s| s.step_order).collect();
        assert_eq!(orders, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_delete_and_list() {
        let (_, manager) = setup().await;
        let (movie, _) = activity_with_steps(&manager, 2).await;
        manager.create_activity(NewActivity::named("Music")).await.unwrap();

        assert!(manager.delete_activity(movie).await.unwrap());
        assert!(!manager.delete_activity(movie).await.unwrap());

        let names: Vec<String> = manager
            .list_activities()
            .await
            .unwrap()
            .into_iter()
            .map(|a| a.name)
            .collect();
        assert_eq!(names, vec!["Music"]);
    }

    #[tokio::test]
    async fn test_update_activity_validates() {
        let (_, manager) = setup().await;
        let activity = manager.create_activity(NewActivity::named("Movie")).await.unwrap();

        let bad = ActivityPatch {
            name: Some(" ".into()),
            ..Default::default()
        };
        assert!(manager.update_activity(activity.id, bad).await.is_err());

        let rename = ActivityPatch {
            name: Some("Cinema".into()),
            ..Default::default()
        };
        let updated = manager
            .update_activity(activity.id, rename)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.name, "Cinema");
    }
}
