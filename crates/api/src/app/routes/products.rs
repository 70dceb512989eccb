use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
};

use stockledger_infra::LedgerError;

use crate::app::{dto, errors};
use crate::app::routes::common::blocking;
use crate::app::services::AppServices;

pub fn router() -> Router {
    Router::new().route("/:sku", get(get_product).put(put_product))
}

pub async fn get_product(
    Extension(services): Extension<Arc<AppServices>>,
    Path(sku): Path<String>,
) -> axum::response::Response {
    let sku = match errors::parse_sku(&sku) {
        Ok(s) => s,
        Err(rejection) => return rejection,
    };
    let found = blocking(services, move |s| {
        s.ledger.product(&sku).ok_or(LedgerError::UnknownProduct(sku))
    })
    .await;
    match found {
        Ok(product) => (StatusCode::OK, Json(product)).into_response(),
        Err(response) => response,
    }
}

/// Register or update a product reference; threshold changes apply from the next
/// movement.
pub async fn put_product(
    Extension(services): Extension<Arc<AppServices>>,
    Path(sku): Path<String>,
    Json(body): Json<dto::ProductRequest>,
) -> axum::response::Response {
    let sku = match errors::parse_sku(&sku) {
        Ok(s) => s,
        Err(rejection) => return rejection,
    };
    let product = body.into_product(sku);

    let registered = product.clone();
    match blocking(services, move |s| s.ledger.register_product(registered)).await {
        Ok(None) => (StatusCode::CREATED, Json(product)).into_response(),
        Ok(Some(_)) => (StatusCode::OK, Json(product)).into_response(),
        Err(response) => response,
    }
}
