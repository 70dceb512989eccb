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
    Router::new().route("/", get(query_audit))
}

/// `GET /audit?sku=&actor=&kind=&from=&until=&token=&limit=`
///
/// Entries come back in commit order; `next_token` continues after the last one.
pub async fn query_audit(
    Extension(services): Extension<Arc<AppServices>>,
    Query(params): Query<dto::AuditParams>,
) -> axum::response::Response {
    let filter = match params.filter() {
        Ok(f) => f,
        Err(rejection) => return rejection,
    };

    let token = params.token;
    let limit = params.limit;
    match blocking(services, move |s| s.ledger.query_audit(filter, token.as_deref(), limit)).await {
        Ok(page) => (StatusCode::OK, Json(page)).into_response(),
        Err(response) => response,
    }
}
