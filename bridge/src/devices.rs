//! Simulated device endpoints
//!
//! The bridge has no IR or IP transmitters of its own; it answers each
//! command from a table of devices marked offline.

use std::collections::HashSet;
use std::time::Duration;
use theater_shared::DeviceId;

/// Outcome of one delivery attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    pub success: bool,
    pub message: String,
}

/// Decides whether a command reaches its device
#[derive(Debug, Clone, Default)]
pub struct DeviceSimulator {
    offline: HashSet<DeviceId>,
    latency: Duration,
}

impl DeviceSimulator {
    pub fn new(offline: impl IntoIterator<Item = DeviceId>, latency: Duration) -> Self {
        Self {
            offline: offline.into_iter().collect(),
            latency,
        }
    }

    /// Simulated transmit time per command
    pub fn latency(&self) -> Duration {
        self.latency
    }

    pub fn deliver(&self, device_id: DeviceId, command: &str) -> Delivery {
        if command.trim().is_empty() {
            return Delivery {
                success: false,
                message: "empty command name".into(),
            };
        }

        if self.offline.contains(&device_id) {
            Delivery {
                success: false,
                message: format!("device {} is offline", device_id),
            }
        } else {
            Delivery {
                success: true,
                message: format!("{} sent to device {}", command, device_id),
            }
        }
    }
}
