use std::sync::Arc;

use axum::http::StatusCode;

use stockledger_infra::LedgerError;

use crate::app::errors;
use crate::app::services::AppServices;

/// Run a ledger call that may block (journal IO, lane contention, pending idempotency
/// keys) off the async workers.
pub async fn blocking<T, F>(services: Arc<AppServices>, f: F) -> Result<T, axum::response::Response>
where
    F: FnOnce(&AppServices) -> Result<T, LedgerError> + Send + 'static,
    T: Send + 'static,
{
    match tokio::task::spawn_blocking(move || f(&services)).await {
        Ok(result) => result.map_err(errors::ledger_error_to_response),
        Err(e) => Err(errors::json_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "internal_error",
            e.to_string(),
        )),
    }
}
