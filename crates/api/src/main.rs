use std::sync::Arc;

use anyhow::Context;

use storefront_infra::StorefrontConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = StorefrontConfig::from_env().context("invalid configuration")?;
    storefront_observability::init(config.log_format);

    let services = storefront_api::app::services::build_services(&config)
        .await
        .context("failed to start services")?;
    let app = storefront_api::app::build_app(Arc::new(services));

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr))?;

    tracing::info!(addr = %listener.local_addr()?, "listening");

    axum::serve(listener, app).await?;
    Ok(())
}
