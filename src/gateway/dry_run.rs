//! Dry-run gateway for development without a device bridge

use crate::gateway::traits::DeviceCommandGateway;
use anyhow::Result;
use async_trait::async_trait;
use theater_shared::DeviceId;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Logs every command and reports it as delivered
#[derive(Debug, Default)]
pub struct DryRunGateway;

#[async_trait]
impl DeviceCommandGateway for DryRunGateway {
    async fn send(
        &self,
        device_id: DeviceId,
        command: &str,
        _cancel: &CancellationToken,
    ) -> Result<bool> {
        info!("[DRY-RUN] device={} command={}", device_id, command);
        Ok(true)
    }

    fn name(&self) -> &'static str {
        "DryRun"
    }
}
