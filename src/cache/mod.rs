pub mod redis_store;
pub mod single_flight;
pub mod store;

pub use redis_store::RedisCache;
pub use single_flight::SingleFlight;
pub use store::{CacheEntry, CacheStore, Expiry, InMemoryCache, NoopCache};

use std::sync::Arc;
use tracing::info;

use crate::error::Result;
use crate::types::Config;

/// Build the process-wide cache store from configuration
pub async fn build_cache(config: &Config) -> Result<Arc<dyn CacheStore>> {
    if config.redis_enabled {
        let url = config.redis_url();
        info!("🗄️  Redis cache enabled at {}", url);
        Ok(Arc::new(RedisCache::connect(&url).await?))
    } else {
        info!("Cache disabled, every lookup is a miss");
        Ok(Arc::new(NoopCache))
    }
}
