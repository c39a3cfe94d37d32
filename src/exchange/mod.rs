pub mod http;
pub mod moex;
pub mod rate_limiter;
pub mod spbex;

pub use http::{HttpResponse, HttpTransport, ReqwestTransport};
pub use moex::MoexClient;
pub use rate_limiter::RateLimiter;
pub use spbex::SpbexClient;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::error;

use crate::cache::CacheStore;
use crate::error::Result;
use crate::types::{CanonicalRecord, Config, Exchange};

/// Capability shared by every exchange: full daily history for one ticker
#[async_trait]
pub trait HistoryClient: Send + Sync {
    fn exchange(&self) -> Exchange;

    /// Strict result: "no data" is `Ok(vec![])`, every failure is an `Err`
    async fn try_fetch_history(&self, ticker: &str) -> Result<Vec<CanonicalRecord>>;

    /// Compatibility view: soft failures are logged and become an empty
    /// history, hard failures (cache backend) still propagate
    async fn fetch_history(&self, ticker: &str) -> Result<Vec<CanonicalRecord>> {
        match self.try_fetch_history(ticker).await {
            Ok(records) => Ok(records),
            Err(e) if e.is_soft() => {
                error!(
                    "[{}] {} history for {} unavailable: {}",
                    e.error_code(),
                    self.exchange(),
                    ticker,
                    e
                );
                Ok(Vec::new())
            }
            Err(e) => Err(e),
        }
    }
}

/// Exchange -> client lookup used by the HTTP boundary
#[derive(Default, Clone)]
pub struct ExchangeRegistry {
    clients: HashMap<Exchange, Arc<dyn HistoryClient>>,
}

impl ExchangeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Both exchanges over one transport and one cache
    pub fn from_config(config: &Config, cache: Arc<dyn CacheStore>) -> Result<Self> {
        let transport: Arc<dyn HttpTransport> = Arc::new(ReqwestTransport::new(
            Duration::from_secs(config.request_timeout_secs),
            config.requests_per_second,
        )?);

        let mut registry = Self::new();
        registry.register(Arc::new(MoexClient::new(
            config.moex_base_url.clone(),
            Arc::clone(&transport),
            cache,
        )));
        registry.register(Arc::new(SpbexClient::new(
            config.spbex_base_url.clone(),
            transport,
        )));
        Ok(registry)
    }

    pub fn register(&mut self, client: Arc<dyn HistoryClient>) {
        self.clients.insert(client.exchange(), client);
    }

    pub fn get(&self, exchange: Exchange) -> Option<Arc<dyn HistoryClient>> {
        self.clients.get(&exchange).cloned()
    }
}
