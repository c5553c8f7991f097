mod config;
mod errors;
mod extraction;
mod generation;
mod llm_client;
mod pipeline;
mod render;
mod retention;
mod routes;
mod state;

use anyhow::Result;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::Config;
use crate::llm_client::GeminiClient;
use crate::retention::OutputRetention;
use crate::routes::build_router;
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on missing required env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_CRATE_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Resume API v{}", env!("CARGO_PKG_VERSION"));

    config.ensure_directories().await?;
    info!(
        "Storage directories ready: uploads={}, outputs={}",
        config.upload_dir.display(),
        config.output_dir.display()
    );

    // Initialize generation client
    let backend = GeminiClient::new(&config)?;
    info!(
        "Generation client initialized (model: {}, timeout: {}s)",
        config.gemini_model,
        config.generation_timeout.as_secs()
    );

    match config.output_ttl {
        Some(ttl) => {
            OutputRetention::new(&config.output_dir, ttl).start();
            info!("Output retention enabled (ttl: {}s)", ttl.as_secs());
        }
        None => info!("Output retention disabled; rendered documents are kept"),
    }

    let state = AppState {
        config: config.clone(),
        backend: Arc::new(backend),
    };

    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
