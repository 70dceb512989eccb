use std::sync::Arc;

use anyhow::Context;

use stockledger_infra::LedgerConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    stockledger_observability::init();

    let config = LedgerConfig::from_env().context("invalid ledger configuration")?;
    let addr = config.socket_addr()?;

    let services = stockledger_api::app::services::build_services(config)
        .context("failed to open the inventory ledger")?;
    let app = stockledger_api::app::build_app(Arc::new(services));

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;

    tracing::info!("listening on {}", listener.local_addr()?);

    axum::serve(listener, app).await?;
    Ok(())
}
