//! Location PSI: context from the nearest historical row

use axum::{extract::State, Json};
use psi_core::LocationPsi;
use validator::Validate;

use super::run_blocking;
use crate::models::LocationRequest;
use crate::{AppResult, AppState};

pub async fn location_psi(
    State(state): State<AppState>,
    Json(req): Json<LocationRequest>,
) -> AppResult<Json<LocationPsi>> {
    req.validate()?;

    let (lat, lng) = (req.lat, req.lng);
    let engine = state.engine.clone();
    let result = run_blocking(move || engine.location_psi(lat, lng)).await?;

    tracing::debug!(
        "Location ({}, {}) -> {} psi={:.3}",
        lat,
        lng,
        result.area,
        result.psi_score
    );

    Ok(Json(result))
}
