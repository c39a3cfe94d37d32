/// HTTP transport seam between the clients and the network
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Url};
use tracing::debug;

use super::rate_limiter::RateLimiter;
use crate::error::{HistoryError, Result};

/// Status and body of one upstream GET
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Body of a 2xx response, or `UpstreamStatus` for anything else
    pub fn into_body(self, url: &str) -> Result<String> {
        if self.is_success() {
            Ok(self.body)
        } else {
            Err(HistoryError::UpstreamStatus {
                url: url.to_string(),
                status: self.status,
            })
        }
    }
}

#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn get(&self, url: &str) -> Result<HttpResponse>;
}

/// Join `segments` onto `base` and append `query`, percent-encoding both, so
/// a ticker can never alter the request (or the cache key derived from it)
pub fn endpoint_url(base: &str, segments: &[&str], query: &[(&str, &str)]) -> Result<String> {
    let mut url = Url::parse(base)
        .map_err(|e| HistoryError::Config(format!("Invalid base url {}: {}", base, e)))?;

    url.path_segments_mut()
        .map_err(|_| HistoryError::Config(format!("Base url cannot carry a path: {}", base)))?
        .pop_if_empty()
        .extend(segments);

    if !query.is_empty() {
        url.query_pairs_mut().extend_pairs(query);
    }

    Ok(url.into())
}

/// reqwest-backed transport with optional request pacing
pub struct ReqwestTransport {
    client: Client,
    limiter: Option<Arc<RateLimiter>>,
}

impl ReqwestTransport {
    pub fn new(timeout: Duration, requests_per_second: u32) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| HistoryError::Config(format!("Failed to build HTTP client: {}", e)))?;

        let limiter = (requests_per_second > 0).then(|| Arc::new(RateLimiter::new(requests_per_second)));

        Ok(ReqwestTransport { client, limiter })
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn get(&self, url: &str) -> Result<HttpResponse> {
        if let Some(limiter) = &self.limiter {
            limiter.acquire().await;
        }

        let response = self.client.get(url).send().await?;
        let status = response.status().as_u16();
        let body = response.text().await?;

        debug!("GET {} -> {} ({} bytes)", url, status, body.len());

        Ok(HttpResponse { status, body })
    }
}

#[cfg(test)]
pub mod mock {
    use std::collections::HashMap;
    use std::sync::Mutex;

    use super::*;

    /// Scripted upstream: exact URL -> response, every request logged
    #[derive(Default)]
    pub struct MockTransport {
        routes: Mutex<HashMap<String, HttpResponse>>,
        requests: Mutex<Vec<String>>,
    }

    impl MockTransport {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn respond(&self, url: impl Into<String>, status: u16, body: impl Into<String>) {
            self.routes.lock().unwrap().insert(
                url.into(),
                HttpResponse {
                    status,
                    body: body.into(),
                },
            );
        }

        pub fn requests(&self) -> Vec<String> {
            self.requests.lock().unwrap().clone()
        }

        pub fn request_count(&self) -> usize {
            self.requests.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl HttpTransport for MockTransport {
        async fn get(&self, url: &str) -> Result<HttpResponse> {
            self.requests.lock().unwrap().push(url.to_string());
            let routes = self.routes.lock().unwrap();
            Ok(routes.get(url).cloned().unwrap_or(HttpResponse {
                status: 404,
                body: String::new(),
            }))
        }
    }
}
