/// Core type definitions for the history service
use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::HistoryError;

/// One trading day of normalized history
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CanonicalRecord {
    pub date: NaiveDate,
    pub close: Option<Decimal>,
    pub high: Option<Decimal>,
    pub low: Option<Decimal>,
    pub volume: Option<Decimal>,
}

/// Market segment a MOEX ticker trades on
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecurityRoute {
    pub board: String,
    pub market: String,
    pub engine: String,
}

/// Supported exchanges
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Exchange {
    Moex,
    Spbex,
}

impl Exchange {
    pub fn as_str(&self) -> &str {
        match self {
            Exchange::Moex => "moex",
            Exchange::Spbex => "spbex",
        }
    }
}

impl fmt::Display for Exchange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Exchange {
    type Err = HistoryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "moex" => Ok(Exchange::Moex),
            "spbex" => Ok(Exchange::Spbex),
            other => Err(HistoryError::UnknownExchange(other.to_string())),
        }
    }
}

/// Service configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub verbose: bool,
    pub log_format: String,

    // Cache
    pub redis_enabled: bool,
    pub redis_host: String,
    pub redis_port: u16,

    // Server
    pub listen_addr: String,

    // Upstreams
    pub moex_base_url: String,
    pub spbex_base_url: String,
    pub request_timeout_secs: u64,
    pub requests_per_second: u32,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            verbose: false,
            log_format: "text".to_string(),
            redis_enabled: false,
            redis_host: "127.0.0.1".to_string(),
            redis_port: 6379,
            listen_addr: "0.0.0.0:8000".to_string(),
            moex_base_url: "https://iss.moex.com".to_string(),
            spbex_base_url: "https://investcab.ru/api".to_string(),
            request_timeout_secs: 30,
            requests_per_second: 0,
        }
    }
}

impl Config {
    pub fn redis_url(&self) -> String {
        format!("redis://{}:{}/0", self.redis_host, self.redis_port)
    }
}
