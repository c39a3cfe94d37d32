/// Centralized error types for the history service
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum HistoryError {
    // Resolution Errors
    #[error("Security not found: {0}")]
    SecurityNotFound(String),

    // Upstream Errors
    #[error("Upstream returned {status} for {url}")]
    UpstreamStatus { url: String, status: u16 },

    #[error("HTTP request failed: {0}")]
    Http(String),

    #[error("Malformed upstream response: {0}")]
    MalformedResponse(String),

    // Cache Errors
    #[error("Cache backend failure: {0}")]
    Cache(String),

    // Configuration Errors
    #[error("Configuration error: {0}")]
    Config(String),

    // Routing Errors
    #[error("Unknown exchange: {0}")]
    UnknownExchange(String),
}

pub type Result<T> = std::result::Result<T, HistoryError>;

impl HistoryError {
    /// Soft failures collapse to an empty history at the compatibility boundary
    pub fn is_soft(&self) -> bool {
        matches!(
            self,
            HistoryError::SecurityNotFound(_)
                | HistoryError::UpstreamStatus { .. }
                | HistoryError::Http(_)
                | HistoryError::MalformedResponse(_)
        )
    }

    /// Get error code for logging
    pub fn error_code(&self) -> &str {
        match self {
            HistoryError::SecurityNotFound(_) => "RES_001",
            HistoryError::UpstreamStatus { .. } => "NET_001",
            HistoryError::Http(_) => "NET_002",
            HistoryError::MalformedResponse(_) => "DATA_001",
            HistoryError::Cache(_) => "CACHE_001",
            HistoryError::Config(_) => "CFG_001",
            HistoryError::UnknownExchange(_) => "API_001",
        }
    }
}

impl From<reqwest::Error> for HistoryError {
    fn from(e: reqwest::Error) -> Self {
        HistoryError::Http(e.to_string())
    }
}

impl From<serde_json::Error> for HistoryError {
    fn from(e: serde_json::Error) -> Self {
        HistoryError::MalformedResponse(e.to_string())
    }
}

impl From<redis::RedisError> for HistoryError {
    fn from(e: redis::RedisError) -> Self {
        HistoryError::Cache(e.to_string())
    }
}

impl From<::config::ConfigError> for HistoryError {
    fn from(e: ::config::ConfigError) -> Self {
        HistoryError::Config(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_failure_is_hard() {
        assert!(!HistoryError::Cache("connection refused".to_string()).is_soft());
        assert!(!HistoryError::Config("bad".to_string()).is_soft());
    }

    #[test]
    fn test_upstream_failures_are_soft() {
        let status = HistoryError::UpstreamStatus {
            url: "https://iss.moex.com".to_string(),
            status: 502,
        };
        assert!(status.is_soft());
        assert!(HistoryError::SecurityNotFound("sber".to_string()).is_soft());
        assert_eq!(status.error_code(), "NET_001");
    }
}
