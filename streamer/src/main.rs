mod camera;
mod capture;
mod encoder;
mod http;
mod hub;
mod mjpeg;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use camserve_common::config::Config;
use capture::{CaptureLoop, CaptureSettings};
use encoder::JpegEncoder;
use hub::FrameHub;
use tracing::{error, info};

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
        source = config.camera.source,
        width = config.camera.width,
        height = config.camera.height,
        quality = config.stream.jpeg_quality,
        interval_secs = config.stream.capture_interval_secs,
        "starting camserve streamer"
    );

    // A camera that cannot even open is the one unrecoverable startup error.
    let source = match camera::open_source(&config.camera) {
        Ok(s) => s,
        Err(e) => {
            error!(error = %e, "failed to open camera source");
            std::process::exit(1);
        }
    };

    let hub = Arc::new(FrameHub::new());
    let capture = CaptureLoop::spawn(
        source,
        JpegEncoder::new(config.stream.jpeg_quality),
        Arc::clone(&hub),
        CaptureSettings::with_interval(Duration::from_secs_f64(
            config.stream.capture_interval_secs,
        )),
    );

    let state = Arc::new(http::AppState {
        hub: Arc::clone(&hub),
    });
    let app = http::router(state);

    let addr = config.server.bind_addr();
    let listener = tokio::net::TcpListener::bind(&addr).await.unwrap_or_else(|e| {
        eprintln!("Failed to bind to {addr}: {e}");
        std::process::exit(1);
    });
    info!(addr, "camserve streamer listening");

    // On shutdown: stop the producer and release every session before the
    // server waits out its open stream connections.
    let stop = capture.stop_signal();
    let shutdown_hub = Arc::clone(&hub);
    let serve = axum::serve(listener, app).with_graceful_shutdown(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "failed to listen for shutdown signal");
        }
        info!("shutdown signal received, stopping capture");
        stop.trigger();
        shutdown_hub.stop();
    });

    if let Err(e) = serve.await {
        error!(error = %e, "server error");
    }

    capture.join();
    info!("capture loop stopped, exiting");
}
