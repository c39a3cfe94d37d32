/// SPB Exchange range client (investcab chart API)
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::data::{normalize_all, RawRow};
use crate::error::{HistoryError, Result};
use crate::exchange::http::{endpoint_url, HttpTransport};
use crate::exchange::HistoryClient;
use crate::types::{CanonicalRecord, Exchange};

/// Start of the requested range; the feed has nothing before it anyway
const RANGE_EPOCH: i64 = 0;

/// Daily bars
const DAY_RESOLUTION: &str = "D";

/// Unix-seconds window of one range request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpbexRange {
    pub start: i64,
    pub end: i64,
}

impl SpbexRange {
    pub fn until(now: DateTime<Utc>) -> Self {
        SpbexRange {
            start: RANGE_EPOCH,
            end: now.timestamp(),
        }
    }
}

/// Parallel, position-aligned arrays
#[derive(Debug, Default, Deserialize)]
struct RangeBars {
    #[serde(default)]
    t: Vec<i64>,
    #[serde(default)]
    h: Vec<Option<Decimal>>,
    #[serde(default)]
    l: Vec<Option<Decimal>>,
    #[serde(default)]
    c: Vec<Option<Decimal>>,
}

/// Decode a range payload into rows.
///
/// The upstream body is a JSON string whose content is itself the JSON
/// document, so it is decoded twice. A body that is already an object is
/// accepted as-is.
pub fn decode_range_payload(body: &str) -> Result<Vec<RawRow>> {
    let outer: Value = serde_json::from_str(body)?;
    let bars: RangeBars = match outer {
        Value::String(inner) => serde_json::from_str(&inner)?,
        Value::Object(_) => {
            debug!("Range payload was not double-encoded");
            serde_json::from_value(outer)?
        }
        other => {
            return Err(HistoryError::MalformedResponse(format!(
                "unexpected range payload: {}",
                other
            )))
        }
    };

    let mut rows = Vec::with_capacity(bars.t.len());
    for (((time, high), low), close) in bars.t.iter().zip(bars.h).zip(bars.l).zip(bars.c) {
        let Some(stamp) = DateTime::from_timestamp(*time, 0) else {
            warn!("Skipping bar with out-of-range timestamp {}", time);
            continue;
        };

        rows.push(RawRow {
            date: stamp.date_naive(),
            close,
            high,
            low,
            volume: None,
            face_value: None,
        });
    }

    Ok(rows)
}

pub struct SpbexClient {
    base_url: String,
    transport: Arc<dyn HttpTransport>,
}

impl SpbexClient {
    pub fn new(base_url: impl Into<String>, transport: Arc<dyn HttpTransport>) -> Self {
        SpbexClient {
            base_url: base_url.into(),
            transport,
        }
    }

    pub fn range_url(&self, ticker: &str, range: SpbexRange) -> Result<String> {
        endpoint_url(
            &self.base_url,
            &["chistory"],
            &[
                ("symbol", ticker),
                ("resolution", DAY_RESOLUTION),
                ("from", &range.start.to_string()),
                ("to", &range.end.to_string()),
            ],
        )
    }
}

#[async_trait]
impl HistoryClient for SpbexClient {
    fn exchange(&self) -> Exchange {
        Exchange::Spbex
    }

    async fn try_fetch_history(&self, ticker: &str) -> Result<Vec<CanonicalRecord>> {
        let url = self.range_url(ticker, SpbexRange::until(Utc::now()))?;

        debug!("Requesting security history for {} via {}", ticker, url);
        let body = self.transport.get(&url).await?.into_body(&url)?;
        let rows = decode_range_payload(&body)?;

        // The range feed carries no volume
        let records = normalize_all(&rows, false, true);

        info!("📈 {} {}: {} records", self.exchange(), ticker, records.len());
        Ok(records)
    }
}
