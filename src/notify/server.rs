//! Progress server streaming events to connected monitors

use anyhow::Result;
use std::net::SocketAddr;
use theater_shared::{codec, Frame, ProgressEvent};
use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{debug, info, warn};

use super::BroadcastNotifier;

/// Accepts monitor connections and writes every progress event to each
pub struct ProgressServer {
    listener: TcpListener,
    notifier: BroadcastNotifier,
}

impl ProgressServer {
    /// Bind the listener; events come from `notifier`
    pub async fn bind(address: &str, notifier: BroadcastNotifier) -> Result<Self> {
        let listener = TcpListener::bind(address).await?;
        Ok(Self { listener, notifier })
    }

    /// Address the server is listening on
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Accept monitors until the listener fails
    pub async fn run(self) -> Result<()> {
        info!("[PROGRESS] Progress server listening on {}", self.local_addr()?);

        loop {
            let (socket, addr) = self.listener.accept().await?;
            info!("[PROGRESS] Monitor connected: {}", addr);

            let events = self.notifier.subscribe();
            tokio::spawn(async move {
                if let Err(e) = stream_events(socket, events).await {
                    debug!("[PROGRESS] Monitor {} dropped: {}", addr, e);
                }
                info!("[PROGRESS] Monitor disconnected: {}", addr);
            });
        }
    }
}

async fn stream_events(
    mut socket: TcpStream,
    mut events: broadcast::Receiver<ProgressEvent>,
) -> Result<()> {
    loop {
        match events.recv().await {
            Ok(event) => {
                let encoded = codec::encode(&Frame::Progress { event })?;
                socket.write_all(&encoded).await?;
            }
            Err(RecvError::Lagged(skipped)) => {
                warn!("[PROGRESS] Monitor lagging, skipped {} events", skipped);
            }
            Err(RecvError::Closed) => return Ok(()),
        }
    }
}
