//! Image analysis endpoints. Both require a bearer token.

use axum::{
    body::Bytes,
    extract::{Multipart, Query, State},
    http::{header, HeaderName},
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};

use crate::error::AppError;
use crate::extract::Authenticated;
use crate::json::{ConfidenceQuery, DetectionResponse};
use crate::AppState;

/// Vision routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/vision/detect", post(detect))
        .route("/vision/annotate", post(annotate))
}

struct Upload {
    filename: Option<String>,
    data: Bytes,
}

/// Read the `file` field of a multipart upload.
async fn read_upload(mut multipart: Multipart) -> Result<Upload, AppError> {
    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some("file") {
            continue;
        }
        let filename = field.file_name().map(str::to_string);
        let data = field.bytes().await?;
        if data.is_empty() {
            return Err(AppError::BadRequest("uploaded file is empty".to_string()));
        }
        return Ok(Upload { filename, data });
    }
    Err(AppError::BadRequest("missing 'file' field".to_string()))
}

fn resolve_confidence(requested: Option<f32>, default: f32) -> Result<f32, AppError> {
    match requested {
        None => Ok(default),
        Some(c) if (0.0..=1.0).contains(&c) => Ok(c),
        Some(c) => Err(AppError::BadRequest(format!(
            "confidence {} is outside [0, 1]",
            c
        ))),
    }
}

/// Keep header-safe characters of a client supplied file name.
fn safe_filename(name: Option<&str>) -> String {
    let cleaned: String = name
        .unwrap_or("upload")
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_'))
        .collect();
    if cleaned.is_empty() {
        "upload".to_string()
    } else {
        cleaned
    }
}

async fn detect(
    State(state): State<AppState>,
    Authenticated(admission): Authenticated,
    Query(query): Query<ConfidenceQuery>,
    multipart: Multipart,
) -> Result<Json<DetectionResponse>, AppError> {
    let confidence = resolve_confidence(query.confidence, state.config.confidence)?;
    let backend = state.vision.get_or_init().await?;
    let Upload { filename, data } = read_upload(multipart).await?;

    let model = backend.model_name().to_string();
    let report = tokio::task::spawn_blocking(move || backend.detect(&data, confidence)).await??;

    tracing::info!(
        user = admission.subject(),
        filename = filename.as_deref().unwrap_or("-"),
        detections = report.detections.len(),
        inference_time_ms = report.inference_time_ms,
        "image analyzed"
    );
    Ok(Json(DetectionResponse::new(&model, report)))
}

async fn annotate(
    State(state): State<AppState>,
    Authenticated(admission): Authenticated,
    Query(query): Query<ConfidenceQuery>,
    multipart: Multipart,
) -> Result<Response, AppError> {
    let confidence = resolve_confidence(query.confidence, state.config.confidence)?;
    let backend = state.vision.get_or_init().await?;
    let Upload { filename, data } = read_upload(multipart).await?;

    let annotated =
        tokio::task::spawn_blocking(move || backend.annotate(&data, confidence)).await??;

    tracing::info!(
        user = admission.subject(),
        filename = filename.as_deref().unwrap_or("-"),
        confidence,
        detections = annotated.detection_count,
        "image annotated"
    );

    let headers = [
        (header::CONTENT_TYPE, "image/jpeg".to_string()),
        (
            header::CONTENT_DISPOSITION,
            format!(
                "inline; filename=detected_{}",
                safe_filename(filename.as_deref())
            ),
        ),
        (
            HeaderName::from_static("x-detection-count"),
            annotated.detection_count.to_string(),
        ),
        (
            HeaderName::from_static("x-inference-time-ms"),
            annotated.inference_time_ms.to_string(),
        ),
        (
            HeaderName::from_static("x-image-width"),
            annotated.image_size.width.to_string(),
        ),
        (
            HeaderName::from_static("x-image-height"),
            annotated.image_size.height.to_string(),
        ),
    ];
    Ok((headers, annotated.jpeg).into_response())
}
