use anyhow::Result;
use gpustats::*;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::time::FormatTime;

struct LocalTimer;

impl FormatTime for LocalTimer {
    fn format_time(&self, w: &mut tracing_subscriber::fmt::format::Writer<'_>) -> std::fmt::Result {
        write!(
            w,
            "{}",
            chrono::Local::now().format("%Y-%m-%dT%H:%M:%S%.3f%:z")
        )
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_timer(LocalTimer)
        .with_env_filter(filter)
        .init();

    let app_config = config::AppConfig::load()?;

    let paths = worker::WorkerPaths {
        status_file: PathBuf::from(&app_config.poller.status_file),
        spoke_dir: app_config.poller.spoke_dir.as_ref().map(PathBuf::from),
        aggregate_path: PathBuf::from(&app_config.storage.aggregate_path),
        achievements_path: PathBuf::from(&app_config.storage.achievements_path),
        alias_path: PathBuf::from(&app_config.storage.alias_path),
    };

    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();
    let worker_handle = worker::spawn(
        paths,
        worker::WorkerConfig {
            interval_secs: app_config.poller.interval_secs,
            spoke_stale_secs: app_config.poller.spoke_stale_secs,
            stats_log_interval_secs: app_config.monitoring.stats_log_interval_secs,
        },
        shutdown_rx,
    );

    tracing::info!(
        status_file = %app_config.poller.status_file,
        interval_secs = app_config.poller.interval_secs,
        "gpustats poller running"
    );

    #[cfg(unix)]
    {
        let mut sigterm = match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(s) => s,
            Err(e) => {
                tracing::warn!(error = %e, "SIGTERM handler unavailable; ctrl-c only");
                tokio::signal::ctrl_c().await?;
                let _ = shutdown_tx.send(());
                let _ = worker_handle.await;
                return Ok(());
            }
        };
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {}
            _ = sigterm.recv() => {}
        }
    }
    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await?;
    }

    tracing::info!("Received shutdown signal");
    let _ = shutdown_tx.send(());
    let _ = worker_handle.await;

    Ok(())
}
