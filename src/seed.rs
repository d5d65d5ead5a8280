//! Startup seed data
//!
//! A JSON document listing devices with their commands, and activities with
//! their device associations and steps. Activities are built through the
//! lifecycle manager.

use crate::activity::LifecycleManager;
use crate::store::MemoryStore;
use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;
use theater_shared::{
    Device, DeviceCommand, DeviceCommandId, DeviceId, NewActivity, StepPatch,
};
use tracing::{info, warn};

#[derive(Debug, Clone, Deserialize)]
pub struct Seed {
    #[serde(default)]
    pub devices: Vec<SeedDevice>,
    #[serde(default)]
    pub activities: Vec<SeedActivity>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SeedDevice {
    #[serde(flatten)]
    pub device: Device,
    #[serde(default)]
    pub commands: Vec<SeedCommand>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SeedCommand {
    pub id: DeviceCommandId,
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SeedActivity {
    #[serde(flatten)]
    pub activity: NewActivity,
    #[serde(default)]
    pub devices: Vec<SeedAssociation>,
    #[serde(default)]
    pub steps: Vec<SeedStep>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SeedAssociation {
    pub device_id: DeviceId,
    #[serde(default)]
    pub is_primary: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SeedStep {
    pub command_id: DeviceCommandId,
    pub step_order: i32,
    #[serde(default)]
    pub delay_before_ms: u64,
    #[serde(default)]
    pub delay_after_ms: u64,
    #[serde(default = "default_required")]
    pub required: bool,
}

fn default_required() -> bool {
    true
}

/// What a seed run created
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SeedSummary {
    pub devices: usize,
    pub commands: usize,
    pub activities: usize,
    pub steps: usize,
}

impl Seed {
    /// Read a seed file
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read seed {}", path.display()))?;
        serde_json::from_str(&text).with_context(|| format!("Invalid seed {}", path.display()))
    }

    /// Register devices and build activities
    ///
    /// Associations and steps referring to unknown devices or commands are
    /// skipped with a warning.
    pub async fn apply(self, store: &MemoryStore, lifecycle: &LifecycleManager) -> Result<SeedSummary> {
        let mut summary = SeedSummary::default();

        for entry in self.devices {
            let device_id = entry.device.id;
            store.register_device(entry.device).await;
            summary.devices += 1;

            for command in entry.commands {
                store
                    .register_command(DeviceCommand {
                        id: command.id,
                        device_id,
                        name: command.name,
                    })
                    .await;
                summary.commands += 1;
            }
        }

        for entry in self.activities {
            let activity = lifecycle.create_activity(entry.activity).await?;
            summary.activities += 1;

            for association in entry.devices {
                let added = lifecycle
                    .add_device_to_activity(activity.id, association.device_id, association.is_primary)
                    .await?;
                if added.is_none() {
                    warn!(
                        "[SEED] {}: unknown device {}, association skipped",
                        activity.name, association.device_id
                    );
                }
            }

            for step in entry.steps {
                let Some(created) = lifecycle
                    .add_step_to_activity(
                        activity.id,
                        step.command_id,
                        step.step_order,
                        step.delay_before_ms,
                        step.delay_after_ms,
                    )
                    .await?
                else {
                    warn!(
                        "[SEED] {}: unknown command {}, step skipped",
                        activity.name, step.command_id
                    );
                    continue;
                };
                summary.steps += 1;

                if !step.required {
                    let optional = StepPatch {
                        is_required: Some(false),
                        ..Default::default()
                    };
                    lifecycle.update_step(activity.id, created.id, optional).await?;
                }
            }
        }

        info!(
            "[SEED] Loaded {} devices, {} commands, {} activities, {} steps",
            summary.devices, summary.commands, summary.activities, summary.steps
        );
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    const SEED: &str = r#"{
        "devices": [
            {"id": 1, "name": "TV", "kind": "tv", "protocol": "webos",
             "commands": [{"id": 10, "name": "PowerOn"}]},
            {"id": 2, "name": "Receiver", "kind": "receiver",
             "commands": [{"id": 20, "name": "InputHdmi1"}]}
        ],
        "activities": [
            {"name": "Watch TV",
             "devices": [{"device_id": 1, "is_primary": true}, {"device_id": 2}, {"device_id": 3}],
             "steps": [
                {"command_id": 10, "step_order": 1, "delay_after_ms": 2000},
                {"command_id": 20, "step_order": 2, "required": false},
                {"command_id": 99, "step_order": 3}
             ]}
        ]
    }"#;

    #[tokio::test]
    async fn test_apply_seed() {
        let seed: Seed = serde_json::from_str(SEED).unwrap();
        let store = Arc::new(MemoryStore::new());
        let lifecycle = LifecycleManager::new(store.clone(), store.clone());

        let summary = seed.apply(&store, &lifecycle).await.unwrap();
        assert_eq!(
            summary,
            SeedSummary {
                devices: 2,
                commands: 2,
                activities: 1,
                steps: 2,
            }
        );

        let activities = lifecycle.list_activities().await.unwrap();
        let watch = &activities[0];
        assert_eq!(watch.devices.len(), 2);
        assert_eq!(watch.primary_device().map(|d| d.device_id), Some(DeviceId(1)));

        let steps = watch.ordered_steps();
        assert_eq!(steps[0].target.label(), "TV - PowerOn");
        assert_eq!(steps[0].delay_after_ms, 2000);
        assert!(steps[0].is_required);
        assert!(!steps[1].is_required);
    }
}
