use agri_gateway::GatewayConfig;
use anyhow::Context;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = GatewayConfig::load().context("failed to load configuration")?;
    tracing::debug!(?config, "configuration loaded");

    agri_gateway::serve(config)
        .await
        .context("gateway terminated with an error")
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}
