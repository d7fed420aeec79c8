//! Safest route selection

use axum::{extract::State, Json};
use psi_core::SafestRoute;

use super::run_blocking;
use crate::models::RouteRequest;
use crate::{AppResult, AppState};

pub async fn safest_route(
    State(state): State<AppState>,
    Json(req): Json<RouteRequest>,
) -> AppResult<Json<SafestRoute>> {
    req.validate_points()?;

    let engine = state.engine.clone();
    let routes = req.routes;
    let result = run_blocking(move || engine.safest_route(&routes)).await?;

    Ok(Json(result))
}
