/// Standalone utility to print one ticker's canonical history as JSON
/// Usage: cargo run --bin fetch_history -- moex sber
use exchange_history::{
    cache::build_cache, config::load_config, exchange::ExchangeRegistry, logging::init_tracing,
    Exchange,
};
use tracing::{error, info};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let mut args = std::env::args().skip(1);
    let (Some(exchange), Some(ticker)) = (args.next(), args.next()) else {
        eprintln!("usage: fetch_history <moex|spbex> <ticker>");
        std::process::exit(2);
    };

    let config = load_config("exchange_api.toml")?;
    init_tracing(&config);

    let exchange: Exchange = exchange.parse()?;
    let cache = build_cache(&config).await?;
    let registry = ExchangeRegistry::from_config(&config, cache)?;
    let Some(client) = registry.get(exchange) else {
        anyhow::bail!("no client registered for {}", exchange);
    };

    info!("📥 Fetching {} history for {}", exchange, ticker);
    match client.try_fetch_history(&ticker.to_lowercase()).await {
        Ok(records) => {
            println!("{}", serde_json::to_string_pretty(&records)?);
            info!("✅ {} records", records.len());
            Ok(())
        }
        Err(e) => {
            error!("❌ [{}] {}", e.error_code(), e);
            Err(e.into())
        }
    }
}
