use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Query},
    http::StatusCode,
    response::IntoResponse,
    routing::post,
};

use crate::app::dto;
use crate::app::routes::common::blocking;
use crate::app::services::AppServices;

pub fn router() -> Router {
    Router::new().route("/verify", post(verify))
}

/// Replay the movement log and compare it with the live projections; with
/// `repair=true`, rebuild them when they differ.
pub async fn verify(
    Extension(services): Extension<Arc<AppServices>>,
    Query(params): Query<dto::VerifyParams>,
) -> axum::response::Response {
    let repair = params.repair;
    match blocking(services, move |s| s.ledger.verify(repair)).await {
        Ok(report) => {
            if !report.is_consistent() {
                tracing::warn!(
                    mismatches = report.mismatches.len(),
                    repaired = report.repaired,
                    "projection verification found mismatches"
                );
            }
            (StatusCode::OK, Json(report)).into_response()
        }
        Err(response) => response,
    }
}
