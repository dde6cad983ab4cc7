//! USD pricing: remote feed abstraction, asset registry and price oracle.

use async_trait::async_trait;
use std::collections::HashMap;
use std::fmt;

use crate::domain::Decimal;

pub mod assets;
pub mod coingecko;
pub mod mock;
pub mod oracle;

pub use assets::{AssetCategory, AssetMetadata, AssetRegistry};
pub use coingecko::CoinGeckoFeed;
pub use mock::MockPriceFeed;
pub use oracle::{PriceComputation, PriceOracle, PriceOracleConfig};

/// Remote source of USD prices keyed by feed identifier.
///
/// Implementations handle their own retry/backoff. Identifiers the feed does
/// not know, and non-positive prices, are left out of the result.
#[async_trait]
pub trait PriceFeed: Send + Sync + fmt::Debug {
    async fn fetch_prices(&self, ids: &[String]) -> Result<HashMap<String, Decimal>, PriceFeedError>;
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PriceFeedError {
    #[error("network error: {0}")]
    Network(String),
    #[error("HTTP error {status}: {message}")]
    Http { status: u16, message: String },
    #[error("parse error: {0}")]
    Parse(String),
    #[error("rate limited")]
    RateLimited,
}
