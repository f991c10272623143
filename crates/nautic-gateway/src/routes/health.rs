//! Health check endpoint.

use axum::{extract::State, routing::get, Json, Router};

use crate::error::AppError;
use crate::json::HealthResponse;
use crate::AppState;

/// Health check routes.
pub fn routes() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}

fn label(available: bool) -> String {
    if available { "available" } else { "unavailable" }.to_string()
}

/// Health check handler. Never initializes a capability.
///
/// Probes may touch the filesystem, so the snapshot is taken on the
/// blocking pool.
async fn health_check(State(state): State<AppState>) -> Result<Json<HealthResponse>, AppError> {
    let response = tokio::task::spawn_blocking(move || {
        let auth = state.auth.is_available();
        let vision = state.vision.is_available();

        HealthResponse {
            status: if auth && vision { "healthy" } else { "degraded" }.to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            auth: label(auth),
            vision: label(vision),
            capabilities: state.registry.status(),
        }
    })
    .await?;

    Ok(Json(response))
}
