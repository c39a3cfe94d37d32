pub mod api;
pub mod cache;
pub mod config;
pub mod data;
pub mod error;
pub mod exchange;
pub mod logging;
pub mod time;
pub mod types;

pub use error::{HistoryError, Result};
pub use exchange::{ExchangeRegistry, HistoryClient};
pub use types::*;
