use anyhow::Context;

use rentdesk_api::config::AppConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    rentdesk_observability::init();

    let config = AppConfig::from_env().context("invalid configuration")?;
    let app = rentdesk_api::app::build_app(&config).await?;

    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr))?;

    tracing::info!(addr = %listener.local_addr()?, persistent = config.use_persistent_stores, "listening");

    axum::serve(listener, app).await.context("server terminated")?;
    Ok(())
}
