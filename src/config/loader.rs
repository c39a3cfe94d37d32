/// Configuration loading from an optional TOML file plus EXCHANGE_API_* variables
use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::Path;

use ::config::{Config as Layered, Environment, File, FileFormat};
use reqwest::Url;

use crate::error::{HistoryError, Result};
use crate::types::Config;

pub const ENV_PREFIX: &str = "EXCHANGE_API";

pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config> {
    load_config_with_env(path, None)
}

/// Same as [`load_config`] but reads variables from `env` instead of the process
pub fn load_config_with_env<P: AsRef<Path>>(
    path: P,
    env: Option<HashMap<String, String>>,
) -> Result<Config> {
    let path = path.as_ref().to_string_lossy().into_owned();

    let layered = Layered::builder()
        .add_source(File::new(&path, FileFormat::Toml).required(false))
        .add_source(
            Environment::with_prefix(ENV_PREFIX)
                .try_parsing(true)
                .source(env),
        )
        .build()
        .map_err(|e| HistoryError::Config(format!("Failed to read config: {}", e)))?;

    let config: Config = layered
        .try_deserialize()
        .map_err(|e| HistoryError::Config(format!("Failed to parse config: {}", e)))?;

    validate_config(&config)?;

    Ok(config)
}

fn validate_config(config: &Config) -> Result<()> {
    if config.moex_base_url.is_empty() || config.spbex_base_url.is_empty() {
        return Err(HistoryError::Config("upstream base urls must not be empty".to_string()));
    }

    for base in [&config.moex_base_url, &config.spbex_base_url] {
        if Url::parse(base).map_or(true, |url| url.cannot_be_a_base()) {
            return Err(HistoryError::Config(format!("Invalid upstream base url: {}", base)));
        }
    }

    if config.request_timeout_secs == 0 {
        return Err(HistoryError::Config("request_timeout_secs must be > 0".to_string()));
    }

    if config.listen_addr.parse::<SocketAddr>().is_err() {
        return Err(HistoryError::Config(format!(
            "Invalid listen_addr: {}",
            config.listen_addr
        )));
    }

    match config.log_format.as_str() {
        "text" | "json" => Ok(()),
        other => Err(HistoryError::Config(format!("Invalid log_format: {}", other))),
    }
}
