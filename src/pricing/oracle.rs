//! Price oracle: feed lookup, derivation, static fallback and USD conversion.
//!
//! Resolution order for an asset:
//! 1. feed quote by price id
//! 2. price of the asset it derives from, times its scale
//! 3. static fallback price
//! 4. failure
//!
//! Every resolution is recorded as an `AssetPriceSample`. Only non-failing
//! resolutions replace the `AssetPrice` of record.

use chrono::{DateTime, Utc};
use futures::future::join_all;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use super::{AssetMetadata, AssetRegistry, PriceFeed};
use crate::domain::{
    Address, Amount, AssetPrice, AssetPriceSample, Decimal, PriceSource, PriceStatus, Timestamp,
};
use crate::store::{Repository, StoreError};

/// Decimals of normalized token amounts and of USD values.
pub const USD_DECIMALS: u32 = 18;

const MAX_DERIVATION_DEPTH: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PriceOracleConfig {
    pub cache_ttl_ms: u64,
    pub batch_size: usize,
}

impl Default for PriceOracleConfig {
    fn default() -> Self {
        Self {
            cache_ttl_ms: 5 * 60 * 1000,
            batch_size: 30,
        }
    }
}

/// Outcome of resolving one asset's price.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PriceComputation {
    pub price: Option<Decimal>,
    pub source: PriceSource,
    pub status: PriceStatus,
    pub reason: Option<String>,
}

impl PriceComputation {
    fn quoted(price: Decimal) -> Self {
        Self {
            price: Some(price),
            source: PriceSource::Coingecko,
            status: PriceStatus::Success,
            reason: None,
        }
    }

    fn failure(source: PriceSource, reason: &str) -> Self {
        Self {
            price: None,
            source,
            status: PriceStatus::Failure,
            reason: Some(reason.to_string()),
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct CachedPrice {
    price: Decimal,
    fetched_at: DateTime<Utc>,
}

/// Where direct quotes come from during one resolution.
enum Quotes<'a> {
    /// Cache, then the remote feed.
    Live,
    /// A batch fetched up front.
    Snapshot(&'a HashMap<String, Decimal>),
}

#[derive(Debug)]
pub struct PriceOracle {
    feed: Arc<dyn PriceFeed>,
    registry: Arc<AssetRegistry>,
    config: PriceOracleConfig,
    cache: Mutex<HashMap<String, CachedPrice>>,
    sample_seq: AtomicU64,
}

impl PriceOracle {
    pub fn new(feed: Arc<dyn PriceFeed>, registry: Arc<AssetRegistry>, config: PriceOracleConfig) -> Self {
        Self {
            feed,
            registry,
            config,
            cache: Mutex::new(HashMap::new()),
            sample_seq: AtomicU64::new(0),
        }
    }

    pub fn registry(&self) -> &Arc<AssetRegistry> {
        &self.registry
    }

    pub async fn clear_cache(&self) {
        self.cache.lock().await.clear();
    }

    /// Quote for one feed id, served from cache while fresh.
    pub async fn price_by_id(&self, price_id: &str) -> Option<Decimal> {
        if price_id.is_empty() {
            return None;
        }
        if let Some(price) = self.cached(price_id).await {
            return Some(price);
        }
        self.fetch_batch(&[price_id.to_string()])
            .await
            .get(price_id)
            .copied()
    }

    async fn cached(&self, price_id: &str) -> Option<Decimal> {
        let ttl = chrono::Duration::milliseconds(i64::try_from(self.config.cache_ttl_ms).unwrap_or(i64::MAX));
        let cache = self.cache.lock().await;
        let entry = cache.get(price_id)?;
        if Utc::now() - entry.fetched_at < ttl {
            Some(entry.price)
        } else {
            None
        }
    }

    /// Fetch quotes for `ids` in batches of at most `batch_size`.
    ///
    /// Duplicate and empty ids are dropped. A failing batch is logged and
    /// contributes nothing; the remaining batches still count.
    pub async fn fetch_batch(&self, ids: &[String]) -> HashMap<String, Decimal> {
        let mut seen = HashSet::new();
        let unique: Vec<String> = ids
            .iter()
            .filter(|id| !id.is_empty() && seen.insert(id.as_str()))
            .cloned()
            .collect();
        if unique.is_empty() {
            return HashMap::new();
        }

        let chunks: Vec<&[String]> = unique.chunks(self.config.batch_size.max(1)).collect();
        let results = join_all(chunks.iter().map(|chunk| self.feed.fetch_prices(chunk))).await;

        let now = Utc::now();
        let mut out = HashMap::new();
        let mut cache = self.cache.lock().await;
        for (chunk, result) in chunks.iter().zip(results) {
            match result {
                Ok(prices) => {
                    for (id, price) in prices {
                        if !price.is_positive() {
                            continue;
                        }
                        cache.insert(id.clone(), CachedPrice { price, fetched_at: now });
                        out.insert(id, price);
                    }
                }
                Err(e) => warn!(batch = chunk.len(), error = %e, "Price feed batch failed"),
            }
        }
        out
    }

    /// Resolve a price using cached or live feed quotes.
    pub async fn resolve(&self, metadata: &AssetMetadata) -> PriceComputation {
        self.resolve_with(metadata, &Quotes::Live).await
    }

    async fn direct_quote(&self, metadata: &AssetMetadata, quotes: &Quotes<'_>) -> Option<Decimal> {
        let price_id = metadata.price_id.as_deref()?;
        let price = match quotes {
            Quotes::Live => self.price_by_id(price_id).await,
            Quotes::Snapshot(map) => map.get(price_id).copied(),
        };
        price.filter(|p| p.is_positive())
    }

    /// Walk the derivation chain down to the first quoted asset, then settle
    /// each level on the way back up.
    async fn resolve_with(&self, metadata: &AssetMetadata, quotes: &Quotes<'_>) -> PriceComputation {
        let mut visited: HashSet<Address> = HashSet::new();
        let mut chain: Vec<AssetMetadata> = Vec::new();
        let mut current = metadata.clone();
        let mut base: Option<PriceComputation> = None;

        loop {
            visited.insert(current.address.clone());
            if let Some(price) = self.direct_quote(&current, quotes).await {
                base = Some(PriceComputation::quoted(price));
                break;
            }
            let next = current.derived_from.clone();
            chain.push(current);
            match next {
                None => break,
                Some(addr) if visited.contains(&addr) => {
                    base = Some(PriceComputation::failure(PriceSource::Derived, "derivation-cycle"));
                    break;
                }
                Some(_) if chain.len() >= MAX_DERIVATION_DEPTH => {
                    base = Some(PriceComputation::failure(PriceSource::Derived, "derivation-too-deep"));
                    break;
                }
                Some(addr) => current = self.registry.get(&addr).await,
            }
        }

        for level in chain.iter().rev() {
            base = Some(settle_level(level, base));
        }
        base.unwrap_or_else(|| settle_level(metadata, None))
    }

    /// Persist a sample for `computation` and, unless it failed, the price of record.
    pub async fn record_sample(
        &self,
        repo: &Repository,
        metadata: &AssetMetadata,
        computation: &PriceComputation,
        block_number: u64,
        timestamp: Timestamp,
    ) -> Result<(), StoreError> {
        let seq = self.sample_seq.fetch_add(1, Ordering::SeqCst);
        let sample = AssetPriceSample {
            id: format!("{}-{}-{}", metadata.address, timestamp, seq),
            asset: metadata.address.clone(),
            symbol: metadata.symbol.clone(),
            price: computation.price.map(|p| p.to_price_units()),
            source: computation.source,
            status: computation.status,
            reason: computation.reason.clone(),
            block_number,
            fetched_at: timestamp,
        };
        repo.set(&sample).await?;

        if let Some(price) = computation.price {
            if computation.status != PriceStatus::Failure {
                repo.set(&AssetPrice {
                    id: metadata.address.clone(),
                    symbol: metadata.symbol.clone(),
                    price: price.to_price_units(),
                    price_usd: price,
                    source: computation.source,
                    block_number,
                    updated_at: timestamp,
                })
                .await?;
            }
        }
        Ok(())
    }

    /// Price of record at 1e8 fixed point, if positive.
    pub async fn stored_price(
        &self,
        repo: &Repository,
        metadata: &AssetMetadata,
    ) -> Result<Option<Amount>, StoreError> {
        let stored: Option<AssetPrice> = repo.get(metadata.address.as_str()).await?;
        Ok(stored.map(|p| p.price).filter(|p| p.is_positive()))
    }

    /// Price of record, resolving and recording one if none exists yet.
    pub async fn ensure_price(
        &self,
        repo: &Repository,
        metadata: &AssetMetadata,
        block_number: u64,
        timestamp: Timestamp,
    ) -> Result<Option<Amount>, StoreError> {
        if let Some(price) = self.stored_price(repo, metadata).await? {
            return Ok(Some(price));
        }
        let computation = self.resolve(metadata).await;
        self.record_sample(repo, metadata, &computation, block_number, timestamp)
            .await?;
        Ok(computation
            .price
            .map(|p| p.to_price_units())
            .filter(|p| p.is_positive()))
    }

    /// USD value of `amount` of `token`, 1e18-scaled.
    ///
    /// Without any usable price the 18-decimal normalized amount is returned as is.
    pub async fn convert_to_usd(
        &self,
        repo: &Repository,
        amount: Amount,
        token: &Address,
        block_number: u64,
        timestamp: Timestamp,
    ) -> Result<Amount, StoreError> {
        if amount.is_zero() {
            return Ok(Amount::ZERO);
        }
        let metadata = self.registry.get(token).await;
        let normalized = normalize_decimals(amount, metadata.decimals);
        match self.ensure_price(repo, &metadata, block_number, timestamp).await? {
            Some(price) => Ok(normalized
                .mul_div(price, Amount::pow10(crate::domain::decimal::PRICE_SCALE_DECIMALS))
                .unwrap_or(Amount::ZERO)),
            None => {
                debug!(token = %token, "No price available, using normalized amount");
                Ok(normalized)
            }
        }
    }

    /// Batch-fetch every registered price id and re-resolve every registered asset.
    ///
    /// Returns the number of assets resolved.
    pub async fn refresh_registered(
        &self,
        repo: &Repository,
        block_number: u64,
        timestamp: Timestamp,
    ) -> Result<usize, StoreError> {
        let assets = self.registry.list().await;
        let ids: Vec<String> = assets.iter().filter_map(|a| a.price_id.clone()).collect();
        let quotes = self.fetch_batch(&ids).await;

        for metadata in &assets {
            let computation = self.resolve_with(metadata, &Quotes::Snapshot(&quotes)).await;
            self.record_sample(repo, metadata, &computation, block_number, timestamp)
                .await?;
        }
        debug!(assets = assets.len(), quoted = quotes.len(), "Refreshed asset prices");
        Ok(assets.len())
    }
}

/// Settle one level of a derivation chain given the result for its base.
fn settle_level(metadata: &AssetMetadata, base: Option<PriceComputation>) -> PriceComputation {
    if let Some(b) = base.as_ref() {
        let scale = metadata.derived_scale.unwrap_or_else(Decimal::one);
        if let Some(price) = b.price.and_then(|p| p.checked_mul(scale)) {
            return PriceComputation {
                price: Some(price),
                source: PriceSource::Derived,
                status: b.status,
                reason: b.reason.clone(),
            };
        }
    }

    if let Some(fallback) = metadata.fallback_price_usd {
        return match metadata.price_id {
            Some(_) => PriceComputation {
                price: Some(fallback),
                source: PriceSource::Fallback,
                status: PriceStatus::Fallback,
                reason: Some("coingecko-miss".to_string()),
            },
            None => PriceComputation {
                price: Some(fallback),
                source: PriceSource::Static,
                status: PriceStatus::Success,
                reason: None,
            },
        };
    }

    if let Some(base) = base {
        if metadata.derived_from.is_some() && base.status == PriceStatus::Failure {
            return PriceComputation {
                source: PriceSource::Derived,
                ..base
            };
        }
    }

    if metadata.price_id.is_some() {
        PriceComputation::failure(PriceSource::Fallback, "coingecko-miss")
    } else {
        PriceComputation::failure(PriceSource::Static, "missing-price-config")
    }
}

/// Rescale a token amount to 18 decimals.
pub fn normalize_decimals(amount: Amount, decimals: u32) -> Amount {
    if decimals <= USD_DECIMALS {
        amount.saturating_mul(Amount::pow10(USD_DECIMALS - decimals))
    } else {
        amount
            .checked_div(Amount::pow10(decimals - USD_DECIMALS))
            .unwrap_or(Amount::ZERO)
    }
}
