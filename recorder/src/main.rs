mod cleanup;
mod supervisor;

use std::path::PathBuf;
use std::time::Duration;

use camserve_common::config::Config;
use supervisor::Supervisor;
use tracing::info;

#[tokio::main]
async fn main() {
    let config_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("config.toml"));

    let config = match Config::load_or_default(&config_path) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load config from {}: {e}", config_path.display());
            std::process::exit(1);
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.log_filter().parse().unwrap_or_default()),
        )
        .init();

    info!(
        buffer_dir = config.recorder.buffer_dir,
        start_hour = config.recorder.start_hour,
        end_hour = config.recorder.end_hour,
        threshold_pct = config.recorder.disk_threshold_percent,
        "starting camserve recorder"
    );

    let mut supervisor = Supervisor::new(config.recorder.clone());
    let mut ticker =
        tokio::time::interval(Duration::from_secs(config.recorder.poll_interval_secs.max(1)));

    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                supervisor.tick().await;
                if supervisor.is_recording() {
                    cleanup::enforce_disk_budget(&config.recorder);
                }
            }
            _ = &mut shutdown => {
                info!("shutdown signal received, stopping recorder");
                supervisor.stop().await;
                break;
            }
        }
    }

    info!("recorder stopped, exiting");
}

async fn shutdown_signal() {
    let mut sigterm =
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler");
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {}
        _ = sigterm.recv() => {}
    }
}
