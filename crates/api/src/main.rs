use std::sync::Arc;

use anyhow::Context;

use agrosupply_infra::config::AppConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::from_env()?;
    agrosupply_observability::init(config.log_format);

    let services = agrosupply_api::app::services::build_services(&config).await?;
    let app = agrosupply_api::app::build_app(Arc::new(services));

    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr))?;

    tracing::info!(
        addr = %listener.local_addr()?,
        restock_on_cancel = config.fulfillment.restock_on_cancel,
        "listening"
    );

    axum::serve(listener, app).await?;
    Ok(())
}
