//! JSON request and response types for the HTTP gateway.

use chrono::{DateTime, Utc};
use nautic_core::{IssuedToken, SlotStatus};
use serde::{Deserialize, Serialize};

use crate::vision::{Detection, DetectionReport, ImageSize};

/// Service information.
#[derive(Debug, Serialize)]
pub struct InfoResponse {
    pub name: String,
    pub version: String,
    pub health: String,
    pub endpoints: Endpoints,
}

/// Endpoint listing grouped by area.
#[derive(Debug, Serialize)]
pub struct Endpoints {
    pub auth: Vec<String>,
    pub vision: Vec<String>,
}

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// `healthy` when every capability is available, `degraded` otherwise.
    pub status: String,
    /// Gateway version.
    pub version: String,
    /// `available` or `unavailable`.
    pub auth: String,
    /// `available` or `unavailable`.
    pub vision: String,
    /// Per-slot details.
    pub capabilities: Vec<SlotStatus>,
}

/// Registration or login body.
#[derive(Debug, Deserialize)]
pub struct CredentialsRequest {
    pub username: String,
    pub password: String,
}

/// Issued access token.
#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub access_token: String,
    /// Always `bearer`.
    pub token_type: String,
    /// Lifetime in seconds.
    pub expires_in: u64,
}

impl From<IssuedToken> for TokenResponse {
    fn from(issued: IssuedToken) -> Self {
        Self {
            access_token: issued.token,
            token_type: "bearer".to_string(),
            expires_in: issued.expires_in,
        }
    }
}

/// Token verification result.
#[derive(Debug, Serialize)]
pub struct VerifyResponse {
    pub valid: bool,
    pub username: String,
    pub expires_at: DateTime<Utc>,
}

/// Optional confidence override for vision endpoints.
#[derive(Debug, Default, Deserialize)]
pub struct ConfidenceQuery {
    pub confidence: Option<f32>,
}

/// Detection results for one uploaded image.
#[derive(Debug, Serialize)]
pub struct DetectionResponse {
    pub timestamp: DateTime<Utc>,
    pub model: String,
    pub detections: Vec<Detection>,
    pub detection_count: usize,
    pub image_size: ImageSize,
    pub inference_time_ms: f64,
}

impl DetectionResponse {
    pub fn new(model: &str, report: DetectionReport) -> Self {
        Self {
            timestamp: Utc::now(),
            model: model.to_string(),
            detection_count: report.detections.len(),
            detections: report.detections,
            image_size: report.image_size,
            inference_time_ms: report.inference_time_ms,
        }
    }
}
