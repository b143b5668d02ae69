use anyhow::Context;
use needlelog_api::ApiConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    needlelog_observability::init();

    let config = ApiConfig::from_env()?;
    if config.token.is_none() {
        tracing::warn!("NEEDLELOG_API_TOKEN not set; accepting unauthenticated requests");
    }

    let app = needlelog_api::build_app(&config);

    let listener = tokio::net::TcpListener::bind(config.addr)
        .await
        .with_context(|| format!("failed to bind {}", config.addr))?;

    tracing::info!(addr = %listener.local_addr()?, "listening");

    axum::serve(listener, app).await.context("server error")?;
    Ok(())
}
