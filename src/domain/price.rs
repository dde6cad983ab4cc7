//! Price of record and price resolution audit rows.

use serde::{Deserialize, Serialize};

use super::{Address, Amount, Decimal, Timestamp};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PriceSource {
    Coingecko,
    Static,
    Derived,
    Fallback,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PriceStatus {
    Success,
    Fallback,
    Failure,
}

/// Latest usable price for an asset. Only written for non-failing resolutions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetPrice {
    pub id: Address,
    pub symbol: String,
    /// USD price at 1e8 fixed point.
    pub price: Amount,
    pub price_usd: Decimal,
    pub source: PriceSource,
    pub block_number: u64,
    pub updated_at: Timestamp,
}

/// One price resolution attempt, successful or not.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetPriceSample {
    pub id: String,
    pub asset: Address,
    pub symbol: String,
    pub price: Option<Amount>,
    pub source: PriceSource,
    pub status: PriceStatus,
    pub reason: Option<String>,
    pub block_number: u64,
    pub fetched_at: Timestamp,
}
