use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

use stockledger_infra::LedgerError;

pub fn ledger_error_to_response(err: LedgerError) -> axum::response::Response {
    match err {
        LedgerError::UnknownProduct(sku) => json_error(
            StatusCode::NOT_FOUND,
            "unknown_product",
            format!("unknown product: {sku}"),
        ),
        LedgerError::InvalidQuantity(msg) => json_error(StatusCode::BAD_REQUEST, "invalid_quantity", msg),
        LedgerError::Validation(msg) => json_error(StatusCode::BAD_REQUEST, "validation_error", msg),
        LedgerError::InsufficientStock {
            available,
            requested,
        } => (
            StatusCode::UNPROCESSABLE_ENTITY,
            axum::Json(json!({
                "error": "insufficient_stock",
                "message": "insufficient stock",
                "available": available,
                "requested": requested,
            })),
        )
            .into_response(),
        e @ LedgerError::Contention { .. } => {
            json_error(StatusCode::SERVICE_UNAVAILABLE, "contention", e.to_string())
        }
        LedgerError::InvalidToken(msg) => json_error(StatusCode::BAD_REQUEST, "invalid_token", msg),
        e @ LedgerError::Invariant(_) => {
            tracing::error!(error = %e, "ledger invariant violated");
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "invariant_violation", e.to_string())
        }
        e @ (LedgerError::Store(_) | LedgerError::Poisoned) => {
            tracing::error!(error = %e, "movement log failure");
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "store_error", e.to_string())
        }
        e @ LedgerError::Projection(_) => {
            tracing::error!(error = %e, "projection failure; run POST /admin/verify?repair=true");
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "projection_error", e.to_string())
        }
    }
}

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}

pub fn parse_sku(raw: &str) -> Result<stockledger_inventory::Sku, axum::response::Response> {
    stockledger_inventory::Sku::parse(raw)
        .map_err(|e| json_error(StatusCode::BAD_REQUEST, "invalid_sku", e.to_string()))
}
