use anyhow::Context;

use devportal_infra::PortalConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    devportal_observability::init();

    let config = PortalConfig::from_env().context("invalid portal configuration")?;
    let bind_addr = config.bind_addr;

    let app = devportal_api::app::build_app(config).context("failed to initialise the portal")?;

    let listener = tokio::net::TcpListener::bind(bind_addr)
        .await
        .with_context(|| format!("failed to bind {bind_addr}"))?;

    tracing::info!("listening on {}", listener.local_addr()?);

    axum::serve(listener, app).await?;
    Ok(())
}
