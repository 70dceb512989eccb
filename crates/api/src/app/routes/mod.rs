use axum::{Router, routing::get};

pub mod admin;
pub mod alerts;
pub mod audit;
pub mod common;
pub mod movements;
pub mod positions;
pub mod products;
pub mod system;
pub mod valuation;

/// Router for all ledger endpoints (`/health` is mounted separately).
pub fn router() -> Router {
    Router::new()
        .route("/stream", get(system::stream))
        .nest("/movements", movements::router())
        .nest("/positions", positions::router())
        .nest("/valuation", valuation::router())
        .nest("/alerts", alerts::router())
        .nest("/audit", audit::router())
        .nest("/products", products::router())
        .nest("/reports", positions::reports_router())
        .nest("/admin", admin::router())
}
