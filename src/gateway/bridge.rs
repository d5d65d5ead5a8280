//! TCP gateway to a device bridge
//!
//! Each command opens a short-lived connection, writes one `SendCommand`
//! frame and waits for the matching `CommandResult`.

use crate::gateway::traits::DeviceCommandGateway;
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use theater_shared::codec::{self, FrameDecoder};
use theater_shared::{DeviceId, Frame};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Gateway that forwards commands to a `theater-bridge` over TCP
pub struct BridgeGateway {
    address: String,
    connect_timeout: Duration,
    command_timeout: Duration,
    request_id: AtomicU64,
}

impl BridgeGateway {
    /// Create a gateway for the bridge at `address`
    pub fn new(address: String, connect_timeout: Duration, command_timeout: Duration) -> Self {
        Self {
            address,
            connect_timeout,
            command_timeout,
            request_id: AtomicU64::new(0),
        }
    }

    /// Get the next request ID
    fn next_request_id(&self) -> u64 {
        self.request_id.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// One request/response exchange with the bridge
    async fn deliver(&self, device_id: DeviceId, command: &str) -> Result<(bool, String)> {
        let mut stream = timeout(self.connect_timeout, TcpStream::connect(&self.address))
            .await
            .map_err(|_| anyhow!("Connect to bridge {} timed out", self.address))??;

        let request_id = self.next_request_id();
        let encoded = codec::encode(&Frame::SendCommand {
            request_id,
            device_id,
            command: command.to_string(),
        })?;
        stream.write_all(&encoded).await?;

        let mut decoder = FrameDecoder::new();
        let mut read_buf = vec![0u8; 4096];

        loop {
            // Drain complete frames before reading more
            while let Some(frame) = decoder.decode_next()? {
                match frame {
                    Frame::CommandResult {
                        request_id: id,
                        success,
                        message,
                    } if id == request_id => return Ok((success, message)),
                    other => debug!("[GATEWAY] Ignoring unexpected frame: {:?}", other),
                }
            }

            let n = stream.read(&mut read_buf).await?;
            if n == 0 {
                return Err(anyhow!("Bridge closed connection"));
            }
            decoder.extend(&read_buf[..n]);
        }
    }
}

#[async_trait]
impl DeviceCommandGateway for BridgeGateway {
    async fn send(
        &self,
        device_id: DeviceId,
        command: &str,
        cancel: &CancellationToken,
    ) -> Result<bool> {
        let attempt = timeout(self.command_timeout, self.deliver(device_id, command));

        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                warn!("[GATEWAY] {} -> device {} cancelled", command, device_id);
                Ok(false)
            }
            result = attempt => match result {
                Ok(Ok((true, _))) => Ok(true),
                Ok(Ok((false, message))) => {
                    warn!("[GATEWAY] {} -> device {} rejected: {}", command, device_id, message);
                    Ok(false)
                }
                Ok(Err(e)) => {
                    warn!("[GATEWAY] {} -> device {} failed: {}", command, device_id, e);
                    Ok(false)
                }
                Err(_) => {
                    warn!(
                        "[GATEWAY] {} -> device {} timed out after {:?}",
                        command, device_id, self.command_timeout
                    );
                    Ok(false)
                }
            }
        }
    }

    fn name(&self) -> &'static str {
        "Bridge"
    }
}
