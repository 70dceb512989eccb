use std::sync::Arc;

use axum::{
    Json, Router,
    extract::Extension,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::post,
};

use crate::app::dto;
use crate::app::routes::common::blocking;
use crate::app::services::AppServices;

pub const IDEMPOTENCY_KEY_HEADER: &str = "idempotency-key";

pub fn router() -> Router {
    Router::new().route("/", post(record_movement))
}

/// `POST /movements`: commit one movement. A replayed idempotency key answers with
/// the original result.
pub async fn record_movement(
    Extension(services): Extension<Arc<AppServices>>,
    headers: HeaderMap,
    Json(body): Json<dto::MovementRequest>,
) -> axum::response::Response {
    let header_key = headers
        .get(IDEMPOTENCY_KEY_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    let command = match body.into_command(header_key) {
        Ok(c) => c,
        Err(rejection) => return rejection,
    };

    match blocking(services, move |s| s.ledger.record_movement(command)).await {
        Ok(result) => (StatusCode::CREATED, Json(result)).into_response(),
        Err(response) => response,
    }
}
