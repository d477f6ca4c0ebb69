use anyhow::Context;

use tallyerp_infra::Settings;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let settings = Settings::load().context("failed to load settings")?;
    tallyerp_observability::init_with_filter(&settings.log_filter);

    let app = tallyerp_api::app::build_app_from_settings(&settings)
        .await
        .context("failed to initialize services")?;

    let listener = tokio::net::TcpListener::bind(&settings.listen_addr)
        .await
        .with_context(|| format!("failed to bind {}", settings.listen_addr))?;

    tracing::info!(addr = %listener.local_addr()?, "listening");

    axum::serve(listener, app).await?;
    Ok(())
}
