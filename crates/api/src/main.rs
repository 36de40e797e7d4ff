use std::sync::Arc;

use anyhow::Context;

use feeledger_infra::LedgerConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    feeledger_observability::init();

    let config = LedgerConfig::from_env().context("invalid configuration")?;
    let services = feeledger_api::app::services::build_services(&config)?;
    let app = feeledger_api::app::build_app(Arc::new(services));

    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr))?;

    tracing::info!("listening on {}", listener.local_addr()?);

    axum::serve(listener, app).await?;
    Ok(())
}
