/// Ticker -> board/market/engine resolution
use std::sync::Arc;

use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, error, warn};

use super::IssTable;
use crate::cache::{CacheStore, Expiry};
use crate::error::{HistoryError, Result};
use crate::exchange::http::{endpoint_url, HttpTransport};
use crate::types::SecurityRoute;

/// Value of `is_primary` marking the primary board
const PRIMARY_FLAG: i64 = 1;

#[derive(Debug, Deserialize)]
struct BoardsResponse {
    #[serde(default)]
    boards: Option<IssTable>,
}

#[derive(Debug, Clone, PartialEq)]
struct BoardRow {
    board: String,
    market: String,
    engine: String,
    is_primary: bool,
}

impl BoardRow {
    fn decode(table: &IssTable, row: &[Value]) -> Option<Self> {
        let at = |name: &str, fallback: usize| {
            table
                .column_index(name)
                .or(Some(fallback))
                .and_then(|i| row.get(i))
        };

        let text = |v: Option<&Value>| v.and_then(Value::as_str).map(str::to_string);

        Some(BoardRow {
            board: text(at("boardid", 0))?,
            market: text(at("market", 1))?,
            engine: text(at("engine", 2))?,
            is_primary: at("is_primary", 3).and_then(Value::as_i64) == Some(PRIMARY_FLAG),
        })
    }
}

pub struct SecurityResolver {
    base_url: String,
    transport: Arc<dyn HttpTransport>,
    cache: Arc<dyn CacheStore>,
}

impl SecurityResolver {
    pub fn new(
        base_url: impl Into<String>,
        transport: Arc<dyn HttpTransport>,
        cache: Arc<dyn CacheStore>,
    ) -> Self {
        Self {
            base_url: base_url.into(),
            transport,
            cache,
        }
    }

    pub fn resolution_url(&self, ticker: &str) -> Result<String> {
        endpoint_url(
            &self.base_url,
            &["iss", "securities", &format!("{}.json", ticker)],
            &[
                ("iss.only", "boards"),
                ("iss.meta", "off"),
                ("boards.columns", "boardid,market,engine,is_primary"),
            ],
        )
    }

    /// Resolve the primary route for `ticker`.
    ///
    /// Routes are cached without expiry. Any upstream or shape problem is a
    /// `SecurityNotFound`; cache backend failures propagate as-is.
    pub async fn resolve(&self, ticker: &str) -> Result<SecurityRoute> {
        let url = self.resolution_url(ticker)?;

        if let Some(cached) = self.cache.get(&url).await? {
            match serde_json::from_str::<SecurityRoute>(&cached) {
                Ok(route) => {
                    debug!("Route cache hit for {}: {:?}", ticker, route);
                    return Ok(route);
                }
                Err(e) => warn!("Ignoring unreadable cached route for {}: {}", ticker, e),
            }
        }

        debug!("Requesting security parameters for {} via {}", ticker, url);
        let body = match self.transport.get(&url).await.and_then(|r| r.into_body(&url)) {
            Ok(body) => body,
            Err(e) => {
                error!("Resolution request for {} failed: {}", ticker, e);
                return Err(HistoryError::SecurityNotFound(ticker.to_string()));
            }
        };

        let route = match primary_route(&body) {
            Some(route) => route,
            None => {
                error!("Not found primary board for {}", ticker);
                return Err(HistoryError::SecurityNotFound(ticker.to_string()));
            }
        };

        let cached = serde_json::to_string(&route)
            .map_err(|e| HistoryError::Cache(format!("Failed to encode route: {}", e)))?;
        self.cache.set(&url, &cached, Expiry::Never).await?;

        Ok(route)
    }
}

/// First board flagged primary, if the response has the expected shape
fn primary_route(body: &str) -> Option<SecurityRoute> {
    let response: BoardsResponse = serde_json::from_str(body).ok()?;
    let table = response.boards?;
    let rows = table.data.as_ref()?;

    rows.iter()
        .filter_map(|row| BoardRow::decode(&table, row))
        .find(|row| row.is_primary)
        .map(|row| SecurityRoute {
            board: row.board,
            market: row.market,
            engine: row.engine,
        })
}
