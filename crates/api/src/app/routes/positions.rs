use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path, Query},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
};

use stockledger_infra::ledger::PositionQuery;

use crate::app::errors;
use crate::app::routes::common::blocking;
use crate::app::services::AppServices;

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_positions))
        .route("/:sku", get(get_position))
}

pub fn reports_router() -> Router {
    Router::new().route("/low-stock", get(low_stock))
}

/// `GET /positions?category=&sort=sku|quantity|valuation&descending=`
pub async fn list_positions(
    Extension(services): Extension<Arc<AppServices>>,
    Query(query): Query<PositionQuery>,
) -> axum::response::Response {
    match blocking(services, move |s| s.ledger.list_positions(&query)).await {
        Ok(lines) => (StatusCode::OK, Json(lines)).into_response(),
        Err(response) => response,
    }
}

pub async fn get_position(
    Extension(services): Extension<Arc<AppServices>>,
    Path(sku): Path<String>,
) -> axum::response::Response {
    let sku = match errors::parse_sku(&sku) {
        Ok(s) => s,
        Err(rejection) => return rejection,
    };
    match blocking(services, move |s| s.ledger.get_position(&sku)).await {
        Ok(position) => (StatusCode::OK, Json(position)).into_response(),
        Err(response) => response,
    }
}

/// Products at or below their reorder threshold right now.
pub async fn low_stock(Extension(services): Extension<Arc<AppServices>>) -> axum::response::Response {
    match blocking(services, |s| s.ledger.low_stock()).await {
        Ok(lines) => (
            StatusCode::OK,
            Json(serde_json::json!({
                "count": lines.len(),
                "positions": lines,
            })),
        )
            .into_response(),
        Err(response) => response,
    }
}
