//! Service information endpoint.

use axum::{routing::get, Json, Router};

use crate::json::{Endpoints, InfoResponse};
use crate::AppState;

pub fn routes() -> Router<AppState> {
    Router::new().route("/", get(info))
}

async fn info() -> Json<InfoResponse> {
    let paths = |list: &[&str]| -> Vec<String> { list.iter().map(|p| p.to_string()).collect() };

    Json(InfoResponse {
        name: "Nautic API".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        health: "/health".to_string(),
        endpoints: Endpoints {
            auth: paths(&["/auth/register", "/auth/login", "/auth/verify"]),
            vision: paths(&["/vision/detect", "/vision/annotate"]),
        },
    })
}
