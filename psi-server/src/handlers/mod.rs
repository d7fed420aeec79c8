//! HTTP handlers

pub mod health;
pub mod location;
pub mod predict;
pub mod routes;

use crate::{AppError, AppResult};

/// Run model work on the blocking pool
pub(crate) async fn run_blocking<T, F>(task: F) -> AppResult<T>
where
    F: FnOnce() -> psi_core::Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(task)
        .await
        .map_err(|e| AppError::InternalError(format!("scoring task failed: {}", e)))?
        .map_err(AppError::from)
}

/// Fallback for unknown paths
pub async fn not_found() -> AppError {
    AppError::NotFound("Route not found".to_string())
}
