//! One hub connection to the bridge

use crate::devices::DeviceSimulator;
use anyhow::Result;
use std::net::SocketAddr;
use std::sync::Arc;
use theater_shared::codec::{self, FrameDecoder};
use theater_shared::Frame;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, info, warn};

/// Reads SendCommand frames and answers each with a CommandResult
pub struct HubSession<S> {
    stream: S,
    addr: SocketAddr,
    decoder: FrameDecoder,
    read_buf: Vec<u8>,
    devices: Arc<DeviceSimulator>,
}

impl<S> HubSession<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    pub fn new(stream: S, addr: SocketAddr, devices: Arc<DeviceSimulator>) -> Self {
        Self {
            stream,
            addr,
            decoder: FrameDecoder::new(),
            read_buf: vec![0u8; 4096],
            devices,
        }
    }

    /// Serve until the hub disconnects; returns the number of commands answered
    pub async fn run(mut self) -> Result<usize> {
        let mut answered = 0;

        while let Some(frame) = self.recv().await? {
            let Some(reply) = self.handle(frame).await else {
                continue;
            };
            self.stream.write_all(&codec::encode(&reply)?).await?;
            answered += 1;
        }

        Ok(answered)
    }

    async fn handle(&self, frame: Frame) -> Option<Frame> {
        match frame {
            Frame::SendCommand {
                request_id,
                device_id,
                command,
            } => {
                if !self.devices.latency().is_zero() {
                    tokio::time::sleep(self.devices.latency()).await;
                }
                let delivery = self.devices.deliver(device_id, &command);
                if delivery.success {
                    info!("[BRIDGE] #{} {}", request_id, delivery.message);
                } else {
                    warn!("[BRIDGE] #{} failed: {}", request_id, delivery.message);
                }
                Some(Frame::CommandResult {
                    request_id,
                    success: delivery.success,
                    message: delivery.message,
                })
            }
            other => {
                debug!("[BRIDGE] Ignoring unexpected frame from {}: {:?}", self.addr, other);
                None
            }
        }
    }

    /// Next frame, or None once the hub closes the connection
    async fn recv(&mut self) -> Result<Option<Frame>> {
        loop {
            if let Some(frame) = self.decoder.decode_next()? {
                return Ok(Some(frame));
            }

            let n = self.stream.read(&mut self.read_buf).await?;
            if n == 0 {
                return Ok(None);
            }
            self.decoder.extend(&self.read_buf[..n]);
        }
    }
}
