//! Confirmation-time service - Main Entry Point
//!
//! Loads the trained model and scaler, then serves predictions over HTTP.
//! The listener is only bound once both artifacts are ready.

use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;
use tx_confirmation_eta::{
    config::{AppConfig, LoggingConfig},
    metrics::{MetricsReporter, ServiceMetrics},
    server::{self, AppState},
    PredictionService,
};

fn init_tracing(logging: &LoggingConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(&logging.level))?;

    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if logging.format == "json" {
        builder.json().init();
    } else {
        builder.init();
    }
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration
    let config = AppConfig::load()?;
    init_tracing(&config.logging)?;

    info!("Starting confirmation-time service");
    info!(
        model_path = %config.artifacts.model_path.display(),
        scaler_path = %config.artifacts.scaler_path.display(),
        "Configuration loaded successfully"
    );

    // Both artifacts must load before anything is served
    let service = PredictionService::load(&config.artifacts)
        .context("Failed to initialise prediction service")?;
    info!(
        "Feature encoder ready ({} features: {:?})",
        service.encoder().feature_count(),
        service.encoder().feature_names()
    );

    let metrics = Arc::new(ServiceMetrics::new());

    let metrics_clone = metrics.clone();
    let report_interval = config.metrics.report_interval_secs;
    tokio::spawn(async move {
        let reporter = MetricsReporter::new(metrics_clone, report_interval);
        reporter.start().await;
    });

    let state = AppState::new(Arc::new(service), metrics.clone());
    let app = server::router(
        state,
        Duration::from_millis(config.server.request_timeout_ms),
    );

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!("Listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    // Print final summary
    info!("Service shutting down...");
    metrics.print_summary();

    Ok(())
}
