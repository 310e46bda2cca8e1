//! Toolhost HTTP server - main entry point.
//!
//! Exposes the execution engine over HTTP:
//! - POST /execute-tool: resolve, normalize, and run a tool
//! - POST /load-and-describe: resolve and return a tool descriptor
//! - GET /health, /cache/stats, /tool-health: introspection
//! - POST /cache/clear, /report-health: operator actions

use std::sync::Arc;

use toolhost::engine::Engine;
use toolhost::http;
use toolhost::Config;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration
    let config = Config::from_env();

    // Initialize observability
    toolhost::observability::init_tracing(&config.observability);

    let addr = config.server.listen_addr.clone();
    let cors = http::cors_layer(&config.server.cors_origins);

    // Shared engine instance behind every route
    let engine = Arc::new(Engine::with_default_loaders(config)?);
    let app = http::router(engine).layer(cors);

    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("🚀 Toolhost engine starting on {}", addr);
    tracing::info!("  ✓ Resolver: registry fetch with cache + single-flight");
    tracing::info!("  ✓ Executor: bounded execution with timeouts");
    tracing::info!("  ✓ Health: import/execution classification");
    tracing::info!("  ✓ Rate limiter: sliding window per caller");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!("failed to install ctrl-c handler: {err}");
        return;
    }
    tracing::info!("shutdown signal received, draining connections");
}
