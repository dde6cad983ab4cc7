use std::collections::HashMap;
use std::str::FromStr;
use thiserror::Error;

use crate::domain::PointsNetwork;
use crate::pricing::coingecko::DEFAULT_BASE_URL;

#[derive(Debug, Clone)]
pub struct Config {
    /// SQLite file; the indexer runs against an in-memory store when unset.
    pub database_path: Option<String>,
    pub events_path: String,
    pub price_api_url: String,
    pub price_cache_ttl_ms: u64,
    pub price_batch_size: usize,
    pub price_max_retries: u32,
    pub hourly_block_interval: u64,
    pub average_block_time_secs: u64,
    pub points_network: PointsNetwork,
    pub native_price_id: String,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnv(String),
    #[error("Invalid value for {0}: {1}")]
    InvalidValue(String, String),
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_env_map(std::env::vars().collect())
    }

    pub fn from_env_map(env_map: HashMap<String, String>) -> Result<Self, ConfigError> {
        let database_path = env_map
            .get("DATABASE_PATH")
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());

        let events_path = env_map
            .get("EVENTS_PATH")
            .cloned()
            .ok_or_else(|| ConfigError::MissingEnv("EVENTS_PATH".to_string()))?;

        let price_api_url = env_map
            .get("PRICE_API_URL")
            .cloned()
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());

        let price_cache_ttl_ms = parse_or(&env_map, "PRICE_CACHE_TTL_MS", 300_000u64, "must be a valid u64")?;
        let price_batch_size = parse_or(&env_map, "PRICE_BATCH_SIZE", 30usize, "must be a positive integer")?;
        if price_batch_size == 0 {
            return Err(ConfigError::InvalidValue(
                "PRICE_BATCH_SIZE".to_string(),
                "must be a positive integer".to_string(),
            ));
        }
        let price_max_retries = parse_or(&env_map, "PRICE_MAX_RETRIES", 3u32, "must be a valid u32")?;
        let hourly_block_interval =
            parse_or(&env_map, "HOURLY_BLOCK_INTERVAL", 300u64, "must be a valid u64")?;
        let average_block_time_secs =
            parse_or(&env_map, "AVERAGE_BLOCK_TIME_SECS", 12u64, "must be a valid u64")?;

        let points_network = match env_map.get("POINTS_NETWORK") {
            Some(raw) => raw.parse::<PointsNetwork>().map_err(|_| {
                ConfigError::InvalidValue(
                    "POINTS_NETWORK".to_string(),
                    format!("must be mainnet, testnet, or generic, got {}", raw),
                )
            })?,
            None => PointsNetwork::Mainnet,
        };

        let native_price_id = env_map
            .get("NATIVE_PRICE_ID")
            .cloned()
            .unwrap_or_else(|| "tangle".to_string());

        Ok(Config {
            database_path,
            events_path,
            price_api_url,
            price_cache_ttl_ms,
            price_batch_size,
            price_max_retries,
            hourly_block_interval,
            average_block_time_secs,
            points_network,
            native_price_id,
        })
    }
}

fn parse_or<T: FromStr>(
    env_map: &HashMap<String, String>,
    key: &str,
    default: T,
    expected: &str,
) -> Result<T, ConfigError> {
    match env_map.get(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|_| ConfigError::InvalidValue(key.to_string(), expected.to_string())),
        None => Ok(default),
    }
}
