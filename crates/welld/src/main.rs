use anyhow::{Context, Result};
use tokio::signal::unix::{signal, SignalKind};
use tracing_subscriber::EnvFilter;
use welld::{spawn_scheduler, Config, Shutdown, Workers};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "welld starting");

    let config = Config::load().context("loading configuration")?;
    tracing::info!(
        camera = %config.camera_device,
        models = %config.model_dir.display(),
        economy = config.economy,
        "configuration loaded"
    );

    let workers = Workers::start(&config)?;

    let shutdown = Shutdown::new();
    let (exited_tx, exited_rx) = tokio::sync::oneshot::channel::<()>();
    let scheduler = spawn_scheduler(&config, workers, shutdown.clone(), move || {
        let _ = exited_tx.send(());
    })
    .context("spawning scheduler thread")?;

    tracing::info!("welld ready");

    let mut sigterm = signal(SignalKind::terminate())?;
    tokio::select! {
        _ = tokio::signal::ctrl_c() => tracing::info!("interrupt received"),
        _ = sigterm.recv() => tracing::info!("SIGTERM received"),
        _ = exited_rx => tracing::warn!("scheduler exited on its own"),
    }

    shutdown.request();
    let joined = tokio::task::spawn_blocking(move || scheduler.join()).await?;
    if joined.is_err() {
        anyhow::bail!("scheduler thread panicked");
    }

    tracing::info!("welld shut down");
    Ok(())
}
