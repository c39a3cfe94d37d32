/// HTTP entry point for the exchange history service
use std::sync::Arc;

use tracing::info;

use exchange_history::{
    api::{app_router, AppState},
    cache::build_cache,
    config::load_config,
    exchange::ExchangeRegistry,
    logging::init_tracing,
};

const DEFAULT_CONFIG_PATH: &str = "exchange_api.toml";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config_path =
        std::env::var("EXCHANGE_API_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
    let config = load_config(&config_path)?;

    init_tracing(&config);
    info!("🚀 Starting exchange history service...");

    let cache = build_cache(&config).await?;
    let registry = ExchangeRegistry::from_config(&config, cache)?;
    let router = app_router(Arc::new(AppState { registry }));

    info!("Listening on {}", config.listen_addr);
    let listener = tokio::net::TcpListener::bind(&config.listen_addr).await?;
    axum::serve(listener, router).await?;

    Ok(())
}
