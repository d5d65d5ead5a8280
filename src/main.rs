use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use theater_hub::config::{GatewayMode, HubConfig};
use theater_hub::gateway::{BridgeGateway, DeviceCommandGateway, DryRunGateway};
use theater_hub::notify::{
    BroadcastNotifier, FanoutNotifier, LogNotifier, ProgressNotifier, ProgressServer,
};
use theater_hub::seed::Seed;
use theater_hub::store::MemoryStore;
use theater_hub::{ActivityEngine, LifecycleManager};
use theater_shared::ActivityId;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "theater-hub", about = "Home-theater activity hub")]
struct Cli {
    /// JSON config file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Seed file (overrides the config's seed_path)
    #[arg(long)]
    seed: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List activities and devices
    List,
    /// Execute one activity and exit (Ctrl-C stops it)
    Run { activity_id: u64 },
    /// Serve progress to monitors and read run/stop/list commands from stdin
    Serve,
}

/// Everything the commands need
struct Hub {
    store: Arc<MemoryStore>,
    lifecycle: Arc<LifecycleManager>,
    engine: Arc<ActivityEngine>,
    progress: BroadcastNotifier,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .init();

    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => HubConfig::load(path)?,
        None => HubConfig::default(),
    };
    if cli.seed.is_some() {
        config.seed_path = cli.seed.clone();
    }

    info!("Hub starting: {}", config.hub_id);
    info!("  Gateway: {:?}", config.gateway.mode);

    let hub = build_hub(&config).await?;

    match cli.command {
        Command::List => list(&hub).await,
        Command::Run { activity_id } => run_once(&hub, ActivityId(activity_id)).await,
        Command::Serve => serve(&hub, &config).await,
    }
}

async fn build_hub(config: &HubConfig) -> Result<Hub> {
    let store = Arc::new(MemoryStore::new());
    let lifecycle = Arc::new(LifecycleManager::new(store.clone(), store.clone()));

    if let Some(path) = &config.seed_path {
        Seed::load(path)?.apply(&store, &lifecycle).await?;
    }

    let gateway: Arc<dyn DeviceCommandGateway> = match config.gateway.mode {
        GatewayMode::Bridge => {
            info!("  Bridge: {}", config.gateway.bridge_address);
            Arc::new(BridgeGateway::new(
                config.gateway.bridge_address.clone(),
                config.gateway.connect_timeout(),
                config.gateway.command_timeout(),
            ))
        }
        GatewayMode::DryRun => Arc::new(DryRunGateway),
    };

    let progress = BroadcastNotifier::new(config.progress_buffer);
    let sinks: Vec<Arc<dyn ProgressNotifier>> =
        vec![Arc::new(LogNotifier), Arc::new(progress.clone())];
    let notifier: Arc<dyn ProgressNotifier> = Arc::new(FanoutNotifier::new(sinks));

    let engine = Arc::new(ActivityEngine::new(store.clone(), gateway, notifier));

    Ok(Hub {
        store,
        lifecycle,
        engine,
        progress,
    })
}

async fn list(hub: &Hub) -> Result<()> {
    for device in hub.store.devices().await {
        println!("device {:>4}  {:<24} {:?} ({})", device.id, device.name, device.kind, device.protocol);
    }

    for activity in hub.lifecycle.list_activities().await? {
        println!(
            "activity {:>4}  {:<24} enabled={} steps={} last_used={}",
            activity.id,
            activity.name,
            activity.enabled,
            activity.steps.len(),
            activity
                .last_used
                .map(|t| t.to_rfc3339())
                .unwrap_or_else(|| "never".into())
        );
        for step in activity.ordered_steps() {
            println!(
                "    {:>3}. {:<32} before={}ms after={}ms required={}",
                step.step_order,
                step.target.label(),
                step.delay_before_ms,
                step.delay_after_ms,
                step.is_required
            );
        }
    }

    for run in hub.engine.active_runs() {
        println!(
            "running  {:>4}  run={} since {}",
            run.activity_id,
            run.run_id,
            run.started_at.to_rfc3339()
        );
    }

    Ok(())
}

async fn run_once(hub: &Hub, activity_id: ActivityId) -> Result<()> {
    // Ctrl-C asks the run to stop at its next checkpoint
    let engine = hub.engine.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, stopping activity {}", activity_id);
            engine.request_stop(activity_id).await;
        }
    });

    if hub.engine.execute(activity_id, CancellationToken::new()).await {
        Ok(())
    } else {
        Err(anyhow!("Activity {} did not complete", activity_id))
    }
}

async fn serve(hub: &Hub, config: &HubConfig) -> Result<()> {
    let server = ProgressServer::bind(&config.progress_listen, hub.progress.clone()).await?;
    tokio::spawn(async move {
        if let Err(e) = server.run().await {
            error!("Progress server stopped: {}", e);
        }
    });

    // Cancelled on shutdown so in-flight runs stop too
    let shutdown = CancellationToken::new();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    info!("Ready. Commands: run <id> | stop <id> | list | quit");

    loop {
        let line = tokio::select! {
            line = lines.next_line() => line?,
            _ = tokio::signal::ctrl_c() => None,
        };
        let Some(line) = line else {
            break;
        };

        let mut parts = line.split_whitespace();
        match (parts.next(), parts.next().map(str::parse::<u64>)) {
            (Some("run"), Some(Ok(id))) => {
                let engine = hub.engine.clone();
                let cancel = shutdown.child_token();
                tokio::spawn(async move {
                    engine.execute(ActivityId(id), cancel).await;
                });
            }
            (Some("stop"), Some(Ok(id))) => {
                hub.engine.request_stop(ActivityId(id)).await;
            }
            (Some("list"), None) => list(hub).await?,
            (Some("quit"), None) => break,
            (None, _) => {}
            _ => warn!("Unrecognized command: {}", line),
        }
    }

    info!("Shutting down");
    shutdown.cancel();
    Ok(())
}
