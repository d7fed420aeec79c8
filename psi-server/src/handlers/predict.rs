//! Direct prediction from a full feature set

use axum::{extract::State, Json};
use psi_core::SafetyFeatures;

use super::run_blocking;
use crate::models::{PredictRequest, PsiScoreResponse};
use crate::{AppResult, AppState};

pub async fn predict(
    State(state): State<AppState>,
    Json(req): Json<PredictRequest>,
) -> AppResult<Json<PsiScoreResponse>> {
    let features = SafetyFeatures::from(req);
    let engine = state.engine.clone();
    let psi_score = run_blocking(move || engine.predict(&features)).await?;

    Ok(Json(PsiScoreResponse { psi_score }))
}
