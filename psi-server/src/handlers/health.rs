//! Health, banner and model info handlers

use axum::{extract::State, Json};
use psi_core::EngineStatus;
use serde::Serialize;

use crate::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    status: &'static str,
    version: &'static str,
    environment: String,
    timestamp: i64,
}

#[derive(Serialize)]
pub struct RootResponse {
    status: &'static str,
    demo: &'static str,
}

pub async fn root() -> Json<RootResponse> {
    Json(RootResponse {
        status: "PSI Engine is Running",
        demo: "Suraksha Pune Safety Model",
    })
}

pub async fn check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        environment: state.config.environment.clone(),
        timestamp: chrono::Utc::now().timestamp(),
    })
}

/// Loaded model, layout and usage counters
pub async fn model_info(State(state): State<AppState>) -> Json<EngineStatus> {
    Json(state.engine.status())
}
