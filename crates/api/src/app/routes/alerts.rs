use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Query},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
};

use crate::app::dto;
use crate::app::routes::common::blocking;
use crate::app::services::AppServices;

pub fn router() -> Router {
    Router::new().route("/", get(list_alerts))
}

/// `GET /alerts?status=open|resolved`, oldest first.
pub async fn list_alerts(
    Extension(services): Extension<Arc<AppServices>>,
    Query(params): Query<dto::AlertsParams>,
) -> axum::response::Response {
    let status = params.status;
    let alerts = match blocking(services, move |s| s.ledger.list_alerts(status)).await {
        Ok(a) => a,
        Err(response) => return response,
    };
    (
        StatusCode::OK,
        Json(serde_json::json!({
            "count": alerts.len(),
            "alerts": alerts,
        })),
    )
        .into_response()
}
