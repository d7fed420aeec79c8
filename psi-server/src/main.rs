//! Suraksha PSI Engine Server
//!
//! Serves Personal Safety Index predictions over HTTP.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                      PSI ENGINE SERVER                       │
//! ├──────────────────────────────────────────────────────────────┤
//! │  ┌────────────┐   ┌──────────────────────────────────────┐   │
//! │  │  API       │   │  PsiEngine (shared, read-only)       │   │
//! │  │  (Axum)    │──►│  KdTree ─► StandardScaler ─► Model   │   │
//! │  └────────────┘   └──────────────────┬───────────────────┘   │
//! │                                      ▼                       │
//! │                  model / scaler / historical CSV on disk     │
//! └──────────────────────────────────────────────────────────────┘
//! ```

mod config;
mod error;
mod handlers;
mod middleware;
mod models;


use std::sync::Arc;

use anyhow::Context;
use axum::{
    http::Method,
    middleware as axum_middleware,
    routing::{get, post},
    Router,
};
use psi_core::PsiEngine;
use tower::ServiceBuilder;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

pub use error::{AppError, AppResult};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration
    dotenvy::dotenv().ok();
    let config = config::Config::from_env();

    init_tracing(&config);

    tracing::info!("PSI Engine starting ({})...", config.environment);
    tracing::info!("Model: {}", config.model_path);
    tracing::info!("Scaler: {}", config.scaler_path);
    tracing::info!("Dataset: {}", config.dataset_path);

    // Load model, scaler and dataset; builds the spatial index
    let engine = {
        let config = config.clone();
        tokio::task::spawn_blocking(move || {
            PsiEngine::load(&config.model_path, &config.scaler_path, &config.dataset_path)
        })
        .await?
        .context("Failed to load PSI engine")?
    };

    tracing::info!(
        "Engine ready: backend={} dataset_rows={}",
        engine.metadata().backend,
        engine.dataset().len()
    );

    let state = AppState {
        engine: Arc::new(engine),
        config: config.clone(),
    };

    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind((config.host.as_str(), config.port))
        .await
        .with_context(|| format!("Failed to bind {}:{}", config.host, config.port))?;
    tracing::info!("Server listening on http://{}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    tracing::info!("PSI Engine stopped");
    Ok(())
}

fn init_tracing(config: &config::Config) {
    let default_filter = if config.is_production() {
        "psi_server=info,psi_core=info,tower_http=info"
    } else {
        "psi_server=debug,psi_core=info,tower_http=debug"
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| default_filter.into());

    let registry = tracing_subscriber::registry().with(filter);
    if config.json_logs() {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<PsiEngine>,
    pub config: config::Config,
}

/// Create the main router with all routes
fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(handlers::health::root))
        .route("/health", get(handlers::health::check))
        .route("/model-info", get(handlers::health::model_info))
        .route("/predict", post(handlers::predict::predict))
        .route("/location-psi", post(handlers::location::location_psi))
        .route("/safest-route", post(handlers::routes::safest_route))
        .fallback(handlers::not_found)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CompressionLayer::new())
                .layer(axum_middleware::from_fn(middleware::logging::log_requests)),
        )
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
                .allow_headers(Any)
                .expose_headers(Any),
        )
        .with_state(state)
}
