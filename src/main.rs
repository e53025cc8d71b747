use std::sync::Arc;

use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use saturn_overlay::config::OverlayConfig;
use saturn_overlay::feed::FeedBuffer;
use saturn_overlay::metrics::{self, Metrics};
use saturn_overlay::runtime;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    // Initialize logging (logs go to stderr, stdout carries frames)
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    info!("Saturn Overlay v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let config = OverlayConfig::load_or_default();
    config.validate()?;
    info!(
        "Configuration loaded: viewport {}x{}, frame {} ms, step {} ms",
        config.viewport_width, config.viewport_height, config.frame_ms, config.step_interval_ms
    );

    // Initialize metrics
    let metrics = Arc::new(Metrics::new());

    if let Some(metrics_port) = config.metrics_port {
        let metrics_clone = metrics.clone();
        tokio::spawn(async move {
            if let Err(e) = metrics::start_metrics_server(metrics_clone, metrics_port).await {
                error!("Metrics server error: {}", e);
            }
        });
    }

    // Engine clock runs on epoch ms so motivation timestamps line up
    let mut engine = runtime::build_engine(&config, metrics.clone(), runtime::epoch_ms())?;
    engine.start();

    // Feeds arrive as JSON lines on stdin
    let feed = FeedBuffer::new(config.feed_capacity);
    let feed_sender = feed.sender();
    tokio::spawn(async move {
        if let Err(e) = runtime::read_stdin_feed(feed_sender).await {
            error!("Stdin feed error: {}", e);
        }
    });

    // Shutdown signal handler
    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
        info!("Shutdown signal received");
    };

    tokio::select! {
        result = runtime::run_frame_loop(engine, feed, metrics.clone(), config) => {
            if let Err(e) = result {
                error!("Frame loop error: {}", e);
            }
        }
        _ = shutdown => {
            info!("Shutting down...");
        }
    }

    info!("Overlay stopped");
    Ok(())
}
