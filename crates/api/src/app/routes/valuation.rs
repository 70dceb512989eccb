use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
};

use crate::app::{dto, errors};
use crate::app::routes::common::blocking;
use crate::app::services::AppServices;

pub fn router() -> Router {
    Router::new()
        .route("/", get(total_valuation))
        .route("/:sku", get(sku_valuation))
}

/// Aggregate valuation with the per-product breakdown.
pub async fn total_valuation(Extension(services): Extension<Arc<AppServices>>) -> axum::response::Response {
    match blocking(services, |s| s.ledger.valuation_report()).await {
        Ok(report) => (StatusCode::OK, Json(report)).into_response(),
        Err(response) => response,
    }
}

pub async fn sku_valuation(
    Extension(services): Extension<Arc<AppServices>>,
    Path(sku): Path<String>,
) -> axum::response::Response {
    let sku = match errors::parse_sku(&sku) {
        Ok(s) => s,
        Err(rejection) => return rejection,
    };

    let valued = blocking(services, move |s| {
        let position = s.ledger.get_position(&sku)?;
        let layers = s.ledger.layers(&sku)?;
        Ok(dto::SkuValuation::new(s.ledger.config().costing_method, position, layers))
    })
    .await;

    match valued {
        Ok(body) => (StatusCode::OK, Json(body)).into_response(),
        Err(response) => response,
    }
}
