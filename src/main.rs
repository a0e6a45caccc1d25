//! Face Emotion Inference Service
//!
//! Detects faces and classifies their emotions with pluggable models.
//! Serves single-image uploads over HTTP and continuous frame streams over
//! WebSocket.

use std::sync::Arc;

use anyhow::Result;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use emoface::api::{create_rest_router, AppState};
use emoface::config::Config;
use emoface::engine::{register_builtin_models, InferenceRuntime, ModelRegistry};

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration before logging so its level can apply
    let config_path = Config::default_path();
    let loaded = Config::load(&config_path);
    let config = match &loaded {
        Ok(config) => config.clone(),
        Err(_) => Config::default(),
    };

    // Initialize logging, RUST_LOG wins over the configured level
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));
    FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    info!("Starting Face Emotion Service v{}", env!("CARGO_PKG_VERSION"));
    match loaded {
        Ok(_) => info!("Configuration loaded from {}", config_path),
        Err(e) => info!("Using default config ({}: {})", config_path, e),
    }

    info!("Configuration:");
    info!("  Bind address: {}", config.bind_address());
    info!("  Device: {}", config.inference.device);
    info!("  Failure policy: {:?}", config.inference.failure_policy);

    // Register every model once, before accepting traffic
    let runtime = Arc::new(InferenceRuntime::new(&config.inference));
    let mut registry = ModelRegistry::new();
    register_builtin_models(&mut registry, &config.models, runtime)?;
    let registry = Arc::new(registry);

    let app_state = Arc::new(AppState::new(
        registry,
        config.inference.failure_policy,
        config.server.body_limit_mb * 1024 * 1024,
    ));
    let router = create_rest_router(app_state);

    let addr = config.bind_address();
    let listener = TcpListener::bind(&addr).await?;
    info!("Listening on http://{}", addr);
    info!("  POST /predict, GET /ws, GET /models, GET /health");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Goodbye!");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received, draining connections...");
}
