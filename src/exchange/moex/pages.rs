/// Paged ISS history download with per-page caching
use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

use super::IssTable;
use crate::cache::{CacheStore, Expiry, SingleFlight};
use crate::data::{decimal_from_value, RawRow};
use crate::error::{HistoryError, Result};
use crate::exchange::http::{endpoint_url, HttpTransport};
use crate::time::next_session_boundary;
use crate::types::SecurityRoute;

/// Rows per ISS history page
pub const PAGE_SIZE: usize = 100;

const HISTORY_COLUMNS: &str = "TRADEDATE,CLOSE,HIGH,LOW,VOLUME,FACEVALUE";

/// One decoded history page
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MoexPage {
    pub rows: Vec<RawRow>,
    /// Rows upstream returned, including any dropped while decoding
    pub row_count: usize,
    /// FACEVALUE is only present in the column set for bonds
    pub is_bond: bool,
}

impl MoexPage {
    pub fn is_full(&self) -> bool {
        self.row_count == PAGE_SIZE
    }
}

#[derive(Debug, Deserialize)]
struct HistoryResponse {
    #[serde(default)]
    history: Option<IssTable>,
}

/// Decode an ISS history body. Missing `history`, `columns` or `data` is
/// `MalformedResponse`.
pub fn parse_history_page(body: &str) -> Result<MoexPage> {
    let response: HistoryResponse = serde_json::from_str(body)?;
    let table = response
        .history
        .ok_or_else(|| HistoryError::MalformedResponse("no history block".to_string()))?;
    if table.columns.is_none() {
        return Err(HistoryError::MalformedResponse("no history columns".to_string()));
    }
    let date_idx = table
        .column_index("TRADEDATE")
        .ok_or_else(|| HistoryError::MalformedResponse("no TRADEDATE column".to_string()))?;

    let close_idx = table.column_index("CLOSE");
    let high_idx = table.column_index("HIGH");
    let low_idx = table.column_index("LOW");
    let volume_idx = table.column_index("VOLUME");
    let face_idx = table.column_index("FACEVALUE");

    let data = table
        .data
        .as_ref()
        .ok_or_else(|| HistoryError::MalformedResponse("no history data".to_string()))?;

    let mut rows = Vec::with_capacity(data.len());
    for row in data {
        let date = row
            .get(date_idx)
            .and_then(|v| v.as_str())
            .and_then(|s| NaiveDate::parse_from_str(s, "%Y-%m-%d").ok());

        let Some(date) = date else {
            warn!("Skipping history row with unreadable date: {:?}", row);
            continue;
        };

        rows.push(RawRow {
            date,
            close: number(row, close_idx),
            high: number(row, high_idx),
            low: number(row, low_idx),
            volume: number(row, volume_idx),
            face_value: number(row, face_idx),
        });
    }

    Ok(MoexPage {
        rows,
        row_count: data.len(),
        is_bond: face_idx.is_some(),
    })
}

fn number(row: &[Value], idx: Option<usize>) -> Option<rust_decimal::Decimal> {
    idx.and_then(|i| row.get(i)).and_then(decimal_from_value)
}

/// Downloads single history pages, consulting the cache first.
///
/// Full pages are cached forever; a short page is the tail of the history,
/// may still include today's session and expires at the next session
/// boundary. Concurrent loads of the same URL share one upstream call.
pub struct PageFetcher {
    base_url: String,
    transport: Arc<dyn HttpTransport>,
    cache: Arc<dyn CacheStore>,
    flights: SingleFlight<MoexPage>,
}

impl PageFetcher {
    pub fn new(
        base_url: impl Into<String>,
        transport: Arc<dyn HttpTransport>,
        cache: Arc<dyn CacheStore>,
    ) -> Self {
        Self {
            base_url: base_url.into(),
            transport,
            cache,
            flights: SingleFlight::new(),
        }
    }

    pub fn history_url(&self, ticker: &str, route: &SecurityRoute, start: usize) -> Result<String> {
        let security = format!("{}.json", ticker);
        let start = start.to_string();
        endpoint_url(
            &self.base_url,
            &[
                "iss", "history", "engines", &route.engine, "markets", &route.market, "boards",
                &route.board, "securities", &security,
            ],
            &[
                ("iss.meta", "off"),
                ("start", &start),
                ("history.columns", HISTORY_COLUMNS),
            ],
        )
    }

    pub async fn fetch_page(
        &self,
        ticker: &str,
        route: &SecurityRoute,
        start: usize,
    ) -> Result<MoexPage> {
        let url = self.history_url(ticker, route, start)?;
        let load = load_page(url.clone(), Arc::clone(&self.transport), Arc::clone(&self.cache));
        self.flights.run(&url, load).await
    }
}

async fn load_page(
    url: String,
    transport: Arc<dyn HttpTransport>,
    cache: Arc<dyn CacheStore>,
) -> Result<MoexPage> {
    if let Some(cached) = cache.get(&url).await? {
        debug!("Cache hit for {}", url);
        match parse_history_page(&cached) {
            Ok(page) => return Ok(page),
            Err(e) => warn!("Ignoring unreadable cached page {}: {}", url, e),
        }
    }

    debug!("Requesting security history via {}", url);
    let body = transport.get(&url).await?.into_body(&url)?;
    let fetched_at = Utc::now();

    let page = match parse_history_page(&body) {
        Ok(page) => page,
        Err(HistoryError::MalformedResponse(reason)) => {
            warn!("Treating malformed page {} as empty: {}", url, reason);
            return Ok(MoexPage::default());
        }
        Err(e) => return Err(e),
    };

    if page.row_count > 0 {
        let expiry = if page.is_full() {
            Expiry::Never
        } else {
            Expiry::At(next_session_boundary(fetched_at))
        };
        debug!("Saving {} to cache ({:?})", url, expiry);
        cache.set(&url, &body, expiry).await?;
    }

    Ok(page)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::InMemoryCache;
    use crate::exchange::http::mock::MockTransport;
    use rust_decimal_macros::dec;

    fn route() -> SecurityRoute {
        SecurityRoute {
            board: "TQBR".to_string(),
            market: "shares".to_string(),
            engine: "stock".to_string(),
        }
    }

    fn share_page(rows: usize) -> String {
        let data: Vec<String> = (0..rows)
            .map(|i| format!(r#"["2020-01-{:02}", 250.5, 252, 249, {}]"#, (i % 28) + 1, 1000 + i))
            .collect();
        format!(
            r#"{{"history":{{"columns":["TRADEDATE","CLOSE","HIGH","LOW","VOLUME"],"data":[{}]}}}}"#,
            data.join(",")
        )
    }

    #[test]
    fn test_parse_share_page() {
        let page = parse_history_page(&share_page(3)).unwrap();
        assert_eq!(page.row_count, 3);
        assert!(!page.is_bond);
        assert!(!page.is_full());
        assert_eq!(page.rows[0].close, Some(dec!(250.5)));
        assert_eq!(page.rows[0].low, Some(dec!(249)));
        assert_eq!(page.rows[2].volume, Some(dec!(1002)));
        assert_eq!(page.rows[0].face_value, None);
    }

    #[test]
    fn test_parse_bond_page_with_nulls() {
        let body = r#"{"history":{"columns":["TRADEDATE","CLOSE","HIGH","LOW","VOLUME","FACEVALUE"],
            "data":[["2021-06-01", 99.5, null, 99.1, 40, 1000],["2021-06-02", null, null, null, 0, null]]}}"#;
        let page = parse_history_page(body).unwrap();
        assert!(page.is_bond);
        assert_eq!(page.rows[0].high, None);
        assert_eq!(page.rows[0].face_value, Some(dec!(1000)));
        assert_eq!(page.rows[1].face_value, None);
    }

    #[test]
    fn test_parse_missing_blocks_is_malformed() {
        for body in [r#"{}"#, r#"{"history":{"columns":["TRADEDATE"]}}"#, r#"{"history":{"data":[]}}"#] {
            assert!(matches!(
                parse_history_page(body),
                Err(HistoryError::MalformedResponse(_))
            ));
        }
    }

    #[test]
    fn test_bad_date_rows_are_dropped_but_counted() {
        let body = r#"{"history":{"columns":["TRADEDATE","CLOSE"],"data":[["not-a-date", 1],["2022-01-03", 2]]}}"#;
        let page = parse_history_page(body).unwrap();
        assert_eq!(page.row_count, 2);
        assert_eq!(page.rows.len(), 1);
    }

    #[tokio::test]
    async fn test_full_page_cached_without_expiry() {
        let transport = Arc::new(MockTransport::new());
        let cache = Arc::new(InMemoryCache::new());
        let fetcher = PageFetcher::new("https://iss.test", transport.clone(), cache.clone());
        let url = fetcher.history_url("sber", &route(), 0).unwrap();
        transport.respond(url.clone(), 200, share_page(PAGE_SIZE));

        let page = fetcher.fetch_page("sber", &route(), 0).await.unwrap();
        assert!(page.is_full());
        assert_eq!(cache.entry(&url).await.unwrap().expiry, Expiry::Never);

        // served from cache on the next call
        fetcher.fetch_page("sber", &route(), 0).await.unwrap();
        assert_eq!(transport.request_count(), 1);
    }

    #[tokio::test]
    async fn test_short_page_expires_at_session_boundary() {
        let transport = Arc::new(MockTransport::new());
        let cache = Arc::new(InMemoryCache::new());
        let fetcher = PageFetcher::new("https://iss.test", transport.clone(), cache.clone());
        let url = fetcher.history_url("sber", &route(), 100).unwrap();
        transport.respond(url.clone(), 200, share_page(7));

        let before = Utc::now();
        fetcher.fetch_page("sber", &route(), 100).await.unwrap();
        let after = Utc::now();

        match cache.entry(&url).await.unwrap().expiry {
            Expiry::At(at) => {
                assert!(at > before);
                assert!(at <= next_session_boundary(after));
            }
            Expiry::Never => panic!("short page must expire"),
        }
    }

    #[tokio::test]
    async fn test_malformed_page_is_empty_and_uncached() {
        let transport = Arc::new(MockTransport::new());
        let cache = Arc::new(InMemoryCache::new());
        let fetcher = PageFetcher::new("https://iss.test", transport.clone(), cache.clone());
        transport.respond(fetcher.history_url("sber", &route(), 0).unwrap(), 200, r#"{"error":"x"}"#);

        let page = fetcher.fetch_page("sber", &route(), 0).await.unwrap();
        assert_eq!(page, MoexPage::default());
        assert!(cache.is_empty().await);
    }

    #[tokio::test]
    async fn test_upstream_status_is_an_error() {
        let transport = Arc::new(MockTransport::new());
        let fetcher = PageFetcher::new("https://iss.test", transport, Arc::new(InMemoryCache::new()));

        let result = fetcher.fetch_page("sber", &route(), 0).await;
        assert!(matches!(result, Err(HistoryError::UpstreamStatus { status: 404, .. })));
    }
}
