//! Gateway trait abstraction for pluggable command delivery backends

use anyhow::Result;
use async_trait::async_trait;
use theater_shared::DeviceId;
use tokio_util::sync::CancellationToken;

/// Delivers a named command to a device over whatever protocol it speaks
///
/// Ordinary delivery failures (device offline, protocol error) are reported as
/// `Ok(false)`. `Err` is reserved for unexpected faults.
#[async_trait]
pub trait DeviceCommandGateway: Send + Sync {
    /// Send `command` to `device_id`, returning whether delivery succeeded
    async fn send(
        &self,
        device_id: DeviceId,
        command: &str,
        cancel: &CancellationToken,
    ) -> Result<bool>;

    /// Human-readable name for this gateway
    fn name(&self) -> &'static str;
}
