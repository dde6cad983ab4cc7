//! Asset metadata registry used for pricing.
//!
//! Unknown addresses get lazily registered 18-decimal metadata with no price
//! configuration, so lookups never fail.

use std::collections::BTreeMap;
use tokio::sync::RwLock;

use crate::domain::{Address, Decimal};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssetCategory {
    Restaking,
    Vault,
    Stable,
    Reward,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetMetadata {
    pub address: Address,
    pub symbol: String,
    pub decimals: u32,
    /// Feed identifier, if the asset is listed remotely.
    pub price_id: Option<String>,
    pub category: AssetCategory,
    /// Static USD price used when the feed has no quote.
    pub fallback_price_usd: Option<Decimal>,
    /// Asset this one derives its value from, e.g. a vault's underlying.
    pub derived_from: Option<Address>,
    /// Units of `derived_from` one unit of this asset is worth.
    pub derived_scale: Option<Decimal>,
}

impl AssetMetadata {
    /// Bare 18-decimal metadata with no price configuration.
    pub fn unpriced(address: Address) -> Self {
        let tag: String = address.as_str().chars().skip(2).take(4).collect();
        Self {
            symbol: format!("token-{}", tag),
            address,
            decimals: 18,
            price_id: None,
            category: AssetCategory::Restaking,
            fallback_price_usd: None,
            derived_from: None,
            derived_scale: None,
        }
    }

    fn listed(address: &str, symbol: &str, decimals: u32, price_id: &str, category: AssetCategory) -> Self {
        Self {
            address: Address::new(address),
            symbol: symbol.to_string(),
            decimals,
            price_id: Some(price_id.to_string()),
            category,
            fallback_price_usd: None,
            derived_from: None,
            derived_scale: None,
        }
    }
}

/// Well-known restaking and stable assets. The native asset lives at the zero address.
fn default_assets(native_price_id: &str) -> Vec<AssetMetadata> {
    use AssetCategory::{Restaking, Stable};
    vec![
        AssetMetadata::listed(crate::domain::ZERO_ADDRESS, "TNT", 18, native_price_id, Restaking),
        AssetMetadata::listed("0xc02aaa39b223fe8d0a0e5c4f27ead9083c756cc2", "WETH", 18, "weth", Restaking),
        AssetMetadata::listed("0xae7ab96520de3a18e5e111b5eaab095312d7fe84", "stETH", 18, "staked-ether", Restaking),
        AssetMetadata::listed("0x7f39c581f595b53c5cb9546a3f048c57f8d9aefc", "wstETH", 18, "wrapped-steth", Restaking),
        AssetMetadata::listed("0xae78736cd615f374d3085123a210448e74fc6393", "rETH", 18, "rocket-pool-eth", Restaking),
        AssetMetadata::listed("0xbe9895146f7af43049ca1c1ae358b0541ea49704", "cbETH", 18, "coinbase-wrapped-staked-eth", Restaking),
        AssetMetadata::listed("0x2260fac5e5542a773aa44fbcfedf7c193bc2c599", "WBTC", 8, "wrapped-bitcoin", Restaking),
        AssetMetadata::listed("0xa0b86991c6218b36c1d19d4a2e9eb0ce3606eb48", "USDC", 6, "usd-coin", Stable),
        AssetMetadata::listed("0xdac17f958d2ee523a2206206994597c13d831ec7", "USDT", 6, "tether", Stable),
        AssetMetadata::listed("0x6b175474e89094c44da98b954eedeac495271d0f", "DAI", 18, "dai", Stable),
    ]
}

#[derive(Debug, Default)]
pub struct AssetRegistry {
    assets: RwLock<BTreeMap<Address, AssetMetadata>>,
}

impl AssetRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry seeded with the well-known assets.
    pub fn with_defaults(native_price_id: &str) -> Self {
        let assets = default_assets(native_price_id)
            .into_iter()
            .map(|meta| (meta.address.clone(), meta))
            .collect();
        Self {
            assets: RwLock::new(assets),
        }
    }

    /// Insert or replace metadata for its address.
    pub async fn register(&self, metadata: AssetMetadata) {
        self.assets
            .write()
            .await
            .insert(metadata.address.clone(), metadata);
    }

    /// Metadata for `address`, registering unpriced defaults on first sight.
    pub async fn get(&self, address: &Address) -> AssetMetadata {
        if let Some(meta) = self.assets.read().await.get(address) {
            return meta.clone();
        }
        self.assets
            .write()
            .await
            .entry(address.clone())
            .or_insert_with(|| AssetMetadata::unpriced(address.clone()))
            .clone()
    }

    pub async fn list(&self) -> Vec<AssetMetadata> {
        self.assets.read().await.values().cloned().collect()
    }

    pub async fn clear(&self) {
        self.assets.write().await.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_defaults_include_native_asset() {
        let registry = AssetRegistry::with_defaults("tangle");
        let native = registry.get(&Address::zero()).await;
        assert_eq!(native.symbol, "TNT");
        assert_eq!(native.price_id.as_deref(), Some("tangle"));

        let usdc = registry
            .get(&Address::new("0xA0b86991c6218b36c1d19d4a2e9eb0ce3606eb48"))
            .await;
        assert_eq!(usdc.decimals, 6);
    }

    #[tokio::test]
    async fn test_unknown_asset_lazily_registered() {
        let registry = AssetRegistry::new();
        let addr = Address::new("0xabcdef0000000000000000000000000000000001");
        let meta = registry.get(&addr).await;
        assert_eq!(meta.decimals, 18);
        assert_eq!(meta.symbol, "token-abcd");
        assert!(meta.price_id.is_none());
        assert_eq!(registry.list().await.len(), 1);
    }
}
