//! In-memory activity store
//!
//! Rows live in id-keyed tables behind a single lock, so every call observes
//! and mutates a consistent snapshot. Steps and associations reference their
//! activity by id and are hydrated into the aggregate on read.

use super::{ActivityStore, DeviceDirectory, StoreError};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use theater_shared::{
    Activity, ActivityDevice, ActivityId, ActivityPatch, ActivityStep, Device, DeviceCommand,
    DeviceCommandId, DeviceId, NewActivity, StepId, StepTarget,
};
use tokio::sync::RwLock;

/// Stored activity attributes, without owned children
#[derive(Debug, Clone)]
struct ActivityRow {
    id: ActivityId,
    name: String,
    description: Option<String>,
    icon: Option<String>,
    enabled: bool,
    sort_order: i32,
    created_at: DateTime<Utc>,
    last_used: Option<DateTime<Utc>>,
}

impl ActivityRow {
    fn from_aggregate(activity: &Activity) -> Self {
        Self {
            id: activity.id,
            name: activity.name.clone(),
            description: activity.description.clone(),
            icon: activity.icon.clone(),
            enabled: activity.enabled,
            sort_order: activity.sort_order,
            created_at: activity.created_at,
            last_used: activity.last_used,
        }
    }
}

#[derive(Default)]
struct Tables {
    devices: HashMap<DeviceId, Device>,
    commands: HashMap<DeviceCommandId, DeviceCommand>,
    activities: HashMap<ActivityId, ActivityRow>,
    steps: Vec<ActivityStep>,
    associations: Vec<ActivityDevice>,
}

impl Tables {
    /// Resolve a step's device and command names from the current tables
    fn resolve_target(&self, step: &ActivityStep) -> StepTarget {
        match self.commands.get(&step.device_command_id) {
            Some(command) => StepTarget {
                device_id: command.device_id,
                device_name: self
                    .devices
                    .get(&command.device_id)
                    .map(|d| d.name.clone())
                    .unwrap_or_else(|| step.target.device_name.clone()),
                command_name: command.name.clone(),
            },
            None => step.target.clone(),
        }
    }

    fn hydrate(&self, row: &ActivityRow) -> Activity {
        let mut steps: Vec<ActivityStep> = self
            .steps
            .iter()
            .filter(|s| s.activity_id == row.id)
            .map(|s| ActivityStep {
                target: self.resolve_target(s),
                ..s.clone()
            })
            .collect();
        // Ids grow monotonically, so this is StepOrder then insertion order
        steps.sort_by_key(|s| (s.step_order, s.id));

        let devices = self
            .associations
            .iter()
            .filter(|a| a.activity_id == row.id)
            .cloned()
            .collect();

        Activity {
            id: row.id,
            name: row.name.clone(),
            description: row.description.clone(),
            icon: row.icon.clone(),
            enabled: row.enabled,
            sort_order: row.sort_order,
            created_at: row.created_at,
            last_used: row.last_used,
            devices,
            steps,
        }
    }
}

/// Activity store backed by process memory
#[derive(Clone)]
pub struct MemoryStore {
    tables: Arc<RwLock<Tables>>,
    sequence_id: Arc<AtomicU64>,
}

impl MemoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self {
            tables: Arc::new(RwLock::new(Tables::default())),
            sequence_id: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Register (or replace) a device
    pub async fn register_device(&self, device: Device) {
        self.sequence_id.fetch_max(device.id.0, Ordering::SeqCst);
        self.tables.write().await.devices.insert(device.id, device);
    }

    /// Register (or replace) a device command
    pub async fn register_command(&self, command: DeviceCommand) {
        self.sequence_id.fetch_max(command.id.0, Ordering::SeqCst);
        self.tables.write().await.commands.insert(command.id, command);
    }

    /// All registered devices ordered by id
    pub async fn devices(&self) -> Vec<Device> {
        let tables = self.tables.read().await;
        let mut devices: Vec<Device> = tables.devices.values().cloned().collect();
        devices.sort_by_key(|d| d.id);
        devices
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ActivityStore for MemoryStore {
    async fn get_by_id(&self, id: ActivityId) -> Result<Option<Activity>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables.activities.get(&id).map(|row| tables.hydrate(row)))
    }

    async fn get_all(&self) -> Result<Vec<Activity>, StoreError> {
        let tables = self.tables.read().await;
        let mut rows: Vec<&ActivityRow> = tables.activities.values().collect();
        rows.sort_by(|a, b| (a.sort_order, &a.name).cmp(&(b.sort_order, &b.name)));
        Ok(rows.into_iter().map(|row| tables.hydrate(row)).collect())
    }

    async fn create(&self, input: NewActivity) -> Result<Activity, StoreError> {
        let id = ActivityId(self.next_id());
        let mut tables = self.tables.write().await;

        let sort_order = input.sort_order.unwrap_or_else(|| {
            tables
                .activities
                .values()
                .map(|a| a.sort_order)
                .max()
                .unwrap_or(0)
                + 1
        });

        let row = ActivityRow {
            id,
            name: input.name,
            description: input.description,
            icon: input.icon,
            enabled: input.enabled,
            sort_order,
            created_at: Utc::now(),
            last_used: None,
        };
        let activity = tables.hydrate(&row);
        tables.activities.insert(id, row);

        Ok(activity)
    }

    async fn update(
        &self,
        id: ActivityId,
        patch: ActivityPatch,
    ) -> Result<Option<Activity>, StoreError> {
        let mut tables = self.tables.write().await;

        let Some(row) = tables.activities.get(&id) else {
            return Ok(None);
        };

        let mut activity = tables.hydrate(row);
        patch.apply(&mut activity);
        tables.activities.insert(id, ActivityRow::from_aggregate(&activity));

        Ok(Some(activity))
    }

    async fn delete(&self, id: ActivityId) -> Result<bool, StoreError> {
        let mut tables = self.tables.write().await;

        if tables.activities.remove(&id).is_none() {
            return Ok(false);
        }
        tables.steps.retain(|s| s.activity_id != id);
        tables.associations.retain(|a| a.activity_id != id);

        Ok(true)
    }

    async fn save(&self, activity: &Activity) -> Result<(), StoreError> {
        let mut tables = self.tables.write().await;

        let Some(stored) = tables.activities.get(&activity.id) else {
            return Err(StoreError::ActivityNotFound(activity.id));
        };

        // LastUsed is only written through `update`; a stale aggregate must not roll it back
        let row = ActivityRow {
            last_used: stored.last_used,
            ..ActivityRow::from_aggregate(activity)
        };
        tables.activities.insert(activity.id, row);

        tables.steps.retain(|s| s.activity_id != activity.id);
        tables.steps.extend(activity.steps.iter().map(|s| ActivityStep {
            activity_id: activity.id,
            ..s.clone()
        }));

        tables.associations.retain(|a| a.activity_id != activity.id);
        tables
            .associations
            .extend(activity.devices.iter().map(|a| ActivityDevice {
                activity_id: activity.id,
                ..a.clone()
            }));

        Ok(())
    }

    fn next_id(&self) -> u64 {
        self.sequence_id.fetch_add(1, Ordering::SeqCst) + 1
    }
}

#[async_trait]
impl DeviceDirectory for MemoryStore {
    async fn get_device(&self, id: DeviceId) -> Result<Option<Device>, StoreError> {
        Ok(self.tables.read().await.devices.get(&id).cloned())
    }

    async fn get_command(&self, id: DeviceCommandId) -> Result<Option<DeviceCommand>, StoreError> {
        Ok(self.tables.read().await.commands.get(&id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use theater_shared::{AssociationId, DeviceKind};

    async fn store_with_tv() -> MemoryStore {
        let store = MemoryStore::new();
        store
            .register_device(Device {
                id: DeviceId(1),
                name: "Living Room TV".into(),
                kind: DeviceKind::Tv,
                protocol: "webos".into(),
            })
            .await;
        store
            .register_command(DeviceCommand {
                id: DeviceCommandId(2),
                device_id: DeviceId(1),
                name: "PowerOn".into(),
            })
            .await;
        store
    }

    fn new_step(store: &MemoryStore, activity_id: ActivityId, order: i32) -> ActivityStep {
        ActivityStep {
            id: StepId(store.next_id()),
            activity_id,
            device_command_id: DeviceCommandId(2),
            target: StepTarget {
                device_id: DeviceId(1),
                device_name: String::new(),
                command_name: String::new(),
            },
            step_order: order,
            delay_before_ms: 0,
            delay_after_ms: 0,
            is_required: true,
        }
    }

    #[tokio::test]
    async fn test_ids_skip_registered_ids() {
        let store = store_with_tv().await;
        assert!(store.next_id() > 2);
    }

    #[tokio::test]
    async fn test_create_assigns_increasing_sort_order() {
        let store = MemoryStore::new();
        let first = store.create(NewActivity::named("Watch TV")).await.unwrap();
        let mut explicit = NewActivity::named("Gaming");
        explicit.sort_order = Some(10);
        store.create(explicit).await.unwrap();
        let third = store.create(NewActivity::named("Music")).await.unwrap();

        assert_eq!(first.sort_order, 1);
        assert_eq!(third.sort_order, 11);
        assert!(third.last_used.is_none());
    }

    #[tokio::test]
    async fn test_get_all_orders_by_sort_order_then_name() {
        let store = MemoryStore::new();
        for (name, order) in [("Zebra", 1), ("Movie", 2), ("Apple", 1)] {
            let mut input = NewActivity::named(name);
            input.sort_order = Some(order);
            store.create(input).await.unwrap();
        }

        let names: Vec<String> = store
            .get_all()
            .await
            .unwrap()
            .into_iter()
            .map(|a| a.name)
            .collect();
        assert_eq!(names, vec!["Apple", "Zebra", "Movie"]);
    }

    #[tokio::test]
    async fn test_save_hydrates_step_targets_in_order() {
        let store = store_with_tv().await;
        let mut activity = store.create(NewActivity::named("Movie Night")).await.unwrap();

        let late = new_step(&store, activity.id, 2);
        let early = new_step(&store, activity.id, 1);
        activity.steps = vec![late.clone(), early.clone()];
        store.save(&activity).await.unwrap();

        let loaded = store.get_by_id(activity.id).await.unwrap().unwrap();
        let ids: Vec<StepId> = loaded.steps.iter().map(|s| s.id).collect();
        assert_eq!(ids, vec![early.id, late.id]);
        assert_eq!(loaded.steps[0].target.label(), "Living Room TV - PowerOn");
    }

    #[tokio::test]
    async fn test_delete_cascades_children() {
        let store = store_with_tv().await;
        let mut activity = store.create(NewActivity::named("Movie Night")).await.unwrap();
        activity.steps.push(new_step(&store, activity.id, 1));
        activity.devices.push(ActivityDevice {
            id: AssociationId(store.next_id()),
            activity_id: activity.id,
            device_id: DeviceId(1),
            is_primary_device: true,
        });
        store.save(&activity).await.unwrap();

        assert!(store.delete(activity.id).await.unwrap());
        assert!(!store.delete(activity.id).await.unwrap());
        assert!(store.get_by_id(activity.id).await.unwrap().is_none());

        let tables = store.tables.read().await;
        assert!(tables.steps.is_empty());
        assert!(tables.associations.is_empty());
    }

    #[tokio::test]
    async fn test_update_only_touches_patched_fields() {
        let store = store_with_tv().await;
        let mut activity = store.create(NewActivity::named("Movie Night")).await.unwrap();
        activity.steps.push(new_step(&store, activity.id, 1));
        store.save(&activity).await.unwrap();

        let now = Utc::now();
        let updated = store
            .update(activity.id, ActivityPatch::last_used(now))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.last_used, Some(now));
        assert_eq!(updated.name, "Movie Night");
        assert_eq!(updated.steps.len(), 1);

        assert!(store
            .update(ActivityId(999), ActivityPatch::default())
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_save_missing_activity_fails() {
        let store = MemoryStore::new();
        let mut activity = store.create(NewActivity::named("Gone")).await.unwrap();
        store.delete(activity.id).await.unwrap();
        activity.name = "Still gone".into();

        assert_eq!(
            store.save(&activity).await,
            Err(StoreError::ActivityNotFound(activity.id))
        );
    }

    #[tokio::test]
    async fn test_save_keeps_stored_last_used() {
        let store = store_with_tv().await;
        let mut stale = store.create(NewActivity::named("Movie Night")).await.unwrap();

        let used = Utc::now();
        store
            .update(stale.id, ActivityPatch::last_used(used))
            .await
            .unwrap();

        stale.steps.push(new_step(&store, stale.id, 1));
        store.save(&stale).await.unwrap();

        let loaded = store.get_by_id(stale.id).await.unwrap().unwrap();
        assert_eq!(loaded.last_used, Some(used));
        assert_eq!(loaded.steps.len(), 1);
    }
}
