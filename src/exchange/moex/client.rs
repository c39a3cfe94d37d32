/// MOEX history client: resolve, page, normalize
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info};

use super::pages::{PageFetcher, PAGE_SIZE};
use super::resolver::SecurityResolver;
use crate::cache::CacheStore;
use crate::data::{is_currency_ticker, normalize_all};
use crate::error::Result;
use crate::exchange::http::HttpTransport;
use crate::exchange::HistoryClient;
use crate::types::{CanonicalRecord, Exchange};

const CURRENCY_ENGINE: &str = "currency";

pub struct MoexClient {
    resolver: SecurityResolver,
    pages: PageFetcher,
}

impl MoexClient {
    pub fn new(
        base_url: impl Into<String>,
        transport: Arc<dyn HttpTransport>,
        cache: Arc<dyn CacheStore>,
    ) -> Self {
        let base_url = base_url.into();
        MoexClient {
            resolver: SecurityResolver::new(base_url.clone(), Arc::clone(&transport), Arc::clone(&cache)),
            pages: PageFetcher::new(base_url, transport, cache),
        }
    }
}

#[async_trait]
impl HistoryClient for MoexClient {
    fn exchange(&self) -> Exchange {
        Exchange::Moex
    }

    async fn try_fetch_history(&self, ticker: &str) -> Result<Vec<CanonicalRecord>> {
        let route = self.resolver.resolve(ticker).await?;
        let is_currency = route.engine == CURRENCY_ENGINE || is_currency_ticker(ticker);

        // Each offset depends on whether the previous page was full
        let mut records = Vec::new();
        let mut start = 0;
        loop {
            let page = self.pages.fetch_page(ticker, &route, start).await?;
            debug!(
                "{} page at {}: {} rows (bond: {})",
                ticker, start, page.row_count, page.is_bond
            );

            records.extend(normalize_all(&page.rows, page.is_bond, is_currency));

            if !page.is_full() {
                break;
            }
            start += PAGE_SIZE;
        }

        info!(
            "📈 {} {}: {} records via {}/{}/{}",
            self.exchange(),
            ticker,
            records.len(),
            route.engine,
            route.market,
            route.board
        );

        Ok(records)
    }
}
