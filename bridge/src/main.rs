mod devices;
mod session;

use anyhow::Result;
use clap::Parser;
use devices::DeviceSimulator;
use session::HubSession;
use std::sync::Arc;
use std::time::Duration;
use theater_shared::DeviceId;
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "theater-bridge", about = "Delivers hub commands to devices")]
struct Args {
    /// Address the hub connects to
    #[arg(long, default_value = "0.0.0.0:9000")]
    listen: String,

    /// Device ids that fail every command
    #[arg(long, value_delimiter = ',')]
    offline: Vec<u64>,

    /// Simulated transmit time per command
    #[arg(long, default_value_t = 0)]
    latency_ms: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .init();

    let args = Args::parse();
    let devices = Arc::new(DeviceSimulator::new(
        args.offline.iter().copied().map(DeviceId),
        Duration::from_millis(args.latency_ms),
    ));

    let listener = TcpListener::bind(&args.listen).await?;
    info!("Bridge listening on {}", listener.local_addr()?);
    if !args.offline.is_empty() {
        info!("  Offline devices: {:?}", args.offline);
    }

    loop {
        let (socket, addr) = listener.accept().await?;
        let devices = devices.clone();

        tokio::spawn(async move {
            match HubSession::new(socket, addr, devices).run().await {
                Ok(answered) => info!("Hub {} disconnected after {} commands", addr, answered),
                Err(e) => warn!("Session with {} ended: {}", addr, e),
            }
        });
    }
}
