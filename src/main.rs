//! Boutique Storefront - cart and WhatsApp checkout service

use anyhow::Result;
use boutique_storefront::{api, StorefrontConfig};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::registry().with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into())).with(tracing_subscriber::fmt::layer()).init();

    let config = StorefrontConfig::from_env()?;
    let addr = config.socket_addr();
    tracing::info!(storage_dir = %config.storage_dir.display(), currency = %config.currency, "Cart storage ready");
    let state = api::AppState::from_config(config)?;

    tracing::info!("🚀 Boutique storefront listening on {}", addr);
    axum::serve(tokio::net::TcpListener::bind(addr).await?, api::router(state)).await?;
    Ok(())
}
