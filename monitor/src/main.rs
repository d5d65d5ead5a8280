mod display;

use anyhow::{anyhow, Result};
use clap::Parser;
use std::time::Duration;
use theater_shared::codec::FrameDecoder;
use theater_shared::{Frame, ProgressEvent};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::{debug, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "theater-monitor", about = "Follow activity progress on a hub")]
struct Args {
    /// Hub progress address
    #[arg(long, default_value = "127.0.0.1:8081")]
    hub: String,

    #[arg(long, default_value_t = 2_000)]
    connect_timeout_ms: u64,

    /// First reconnect delay; doubles on each failure
    #[arg(long, default_value_t = 1_000)]
    reconnect_delay_ms: u64,

    #[arg(long, default_value_t = 30_000)]
    max_reconnect_delay_ms: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .init();

    let args = Args::parse();
    let initial_delay = Duration::from_millis(args.reconnect_delay_ms);
    let max_delay = Duration::from_millis(args.max_reconnect_delay_ms);
    let mut reconnect_delay = initial_delay;

    loop {
        let connect = TcpStream::connect(&args.hub);
        match timeout(Duration::from_millis(args.connect_timeout_ms), connect).await {
            Ok(Ok(stream)) => {
                info!("[MONITOR] Connected to {}", args.hub);
                reconnect_delay = initial_delay;

                match follow(stream, |event| info!("[MONITOR] {}", display::describe(&event))).await {
                    Ok(()) => info!("[MONITOR] Hub closed the connection"),
                    Err(e) => warn!("[MONITOR] Connection lost: {}", e),
                }
            }
            Ok(Err(e)) => warn!("[MONITOR] Connect to {} failed: {}", args.hub, e),
            Err(_) => warn!("[MONITOR] Connect to {} timed out", args.hub),
        }

        tokio::time::sleep(reconnect_delay).await;
        reconnect_delay = std::cmp::min(reconnect_delay * 2, max_delay);
    }
}

/// Read progress frames until the stream ends
async fn follow<R, F>(mut reader: R, mut on_event: F) -> Result<()>
where
    R: AsyncRead + Unpin,
    F: FnMut(ProgressEvent),
{
    let mut decoder = FrameDecoder::new();
    let mut buf = vec![0u8; 4096];

    loop {
        while let Some(frame) = decoder.decode_next()? {
            match frame {
                Frame::Progress { event } => on_event(event),
                other => debug!("[MONITOR] Ignoring frame: {:?}", other),
            }
        }

        let n = reader.read(&mut buf).await?;
        if n == 0 {
            if decoder.buffer_len() > 0 {
                return Err(anyhow!("stream ended mid-frame"));
            }
            return Ok(());
        }
        decoder.extend(&buf[..n]);
    }
}
