use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal;
use tracing_subscriber::{Layer, layer::SubscriberExt, util::SubscriberInitExt};

use sensor_fleet::common::AppState;
use sensor_fleet::config::Config;
use sensor_fleet::pipeline::{Analyzer, Pipeline};
use sensor_fleet::routes;
use sensor_fleet::services::alerts::{AlertSink, LogNotifier};
use sensor_fleet::services::store::Store;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    let json_logs = std::env::var("LOG_FORMAT").is_ok_and(|f| f.eq_ignore_ascii_case("json"));
    let fmt_layer = if json_logs {
        tracing_subscriber::fmt::layer().json().boxed()
    } else {
        tracing_subscriber::fmt::layer().boxed()
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,sensor_fleet=debug".into()),
        )
        .with(fmt_layer)
        .init();

    tracing::info!("Starting sensor-fleet...");

    // Everything below up to the pipeline start is fail-fast
    let config = Config::from_env()?;
    tracing::info!(
        deployment = ?config.deployment,
        devices = config.devices.len(),
        capacity = config.channel_capacity,
        "Configuration loaded"
    );

    let alerts = AlertSink::open(config.alert_log_dir.clone(), Arc::new(LogNotifier)).await?;

    tracing::info!("Opening store...");
    let store = Store::connect(&config.database_url).await?;
    tracing::info!("Store ready");

    let addr = config.bind_address();
    let listener = TcpListener::bind(&addr).await?;

    // Start the ingestion pipeline
    let analyzer = Analyzer::new(store.clone(), alerts);
    let pipeline = Pipeline::start(&config, analyzer)?;

    let state = AppState::new(store.clone(), config).with_queue(pipeline.queue_gauge());
    let app = routes::build_router(state);

    tracing::info!(address = %addr, "Serving query API");
    let served = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await;

    pipeline.shutdown().await;
    store.close().await?;
    served?;

    tracing::info!("Shut down gracefully");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received Ctrl+C, shutting down...");
        },
        () = terminate => {
            tracing::info!("Received SIGTERM, shutting down...");
        },
    }
}
