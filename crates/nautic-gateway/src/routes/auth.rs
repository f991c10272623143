//! Registration, login and token verification.
//!
//! Password hashing is CPU bound, so store calls run on the blocking pool.

use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use nautic_core::token::timestamp_to_datetime;
use nautic_core::Error as CoreError;

use crate::error::AppError;
use crate::extract::Authenticated;
use crate::json::{CredentialsRequest, TokenResponse, VerifyResponse};
use crate::AppState;

/// Authentication routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route("/auth/verify", get(verify))
}

async fn register(
    State(state): State<AppState>,
    Json(request): Json<CredentialsRequest>,
) -> Result<Json<TokenResponse>, AppError> {
    let auth = state.auth.get_or_init().await?;
    let issued =
        tokio::task::spawn_blocking(move || auth.register(&request.username, &request.password))
            .await??;
    Ok(Json(issued.into()))
}

async fn login(
    State(state): State<AppState>,
    Json(request): Json<CredentialsRequest>,
) -> Result<Json<TokenResponse>, AppError> {
    let auth = state.auth.get_or_init().await?;
    let issued = tokio::task::spawn_blocking(move || {
        let result = auth.login(&request.username, &request.password);
        if let Err(CoreError::AuthFailure) = &result {
            tracing::info!(username = %request.username, "login failed");
        }
        result
    })
    .await??;
    Ok(Json(issued.into()))
}

async fn verify(Authenticated(admission): Authenticated) -> Json<VerifyResponse> {
    Json(VerifyResponse {
        valid: true,
        expires_at: timestamp_to_datetime(admission.claims.exp),
        username: admission.claims.sub,
    })
}
