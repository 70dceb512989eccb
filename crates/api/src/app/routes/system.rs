use std::sync::Arc;

use axum::{extract::Extension, http::StatusCode, response::IntoResponse};

use crate::app::services::AppServices;

pub async fn health() -> StatusCode {
    StatusCode::OK
}

pub async fn stream(Extension(services): Extension<Arc<AppServices>>) -> impl IntoResponse {
    services.sse_stream()
}
