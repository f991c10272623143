//! Bearer token extractor.

use async_trait::async_trait;
use axum::extract::FromRequestParts;
use axum::http::{header::AUTHORIZATION, request::Parts};
use nautic_core::{extract_bearer, Admission, RequestGate};

use crate::error::AppError;
use crate::AppState;

/// A request that passed the request gate.
///
/// Put it before any extractor or handler code that touches a vision backend:
/// an unauthenticated request is rejected without initializing anything but
/// the auth manager.
#[derive(Debug, Clone)]
pub struct Authenticated(pub Admission);

#[async_trait]
impl FromRequestParts<AppState> for Authenticated {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, AppError> {
        // Non UTF-8 values fall through as malformed.
        let header = parts
            .headers
            .get(AUTHORIZATION)
            .map(|value| value.to_str().unwrap_or_default());

        // Reject obviously bad headers before touching the auth capability.
        extract_bearer(header)?;

        let auth = state.auth.get_or_init().await?;
        let admission = RequestGate::new(&*auth).admit(header)?;
        Ok(Authenticated(admission))
    }
}
