//! Mock price feed for testing without network calls.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

use super::{PriceFeed, PriceFeedError};
use crate::domain::Decimal;

/// Feed that answers from a fixed table and records every batch it is asked for.
#[derive(Debug, Clone, Default)]
pub struct MockPriceFeed {
    prices: HashMap<String, Decimal>,
    error: Option<PriceFeedError>,
    requests: Arc<Mutex<Vec<Vec<String>>>>,
}

impl MockPriceFeed {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a USD price. Non-finite values are ignored.
    pub fn with_price(mut self, id: &str, usd: f64) -> Self {
        if let Some(price) = Decimal::from_f64(usd) {
            self.prices.insert(id.to_string(), price);
        }
        self
    }

    /// Fail every request with `error`.
    pub fn with_error(mut self, error: PriceFeedError) -> Self {
        self.error = Some(error);
        self
    }

    /// Batches requested so far, in call order.
    pub async fn requests(&self) -> Vec<Vec<String>> {
        self.requests.lock().await.clone()
    }
}

#[async_trait]
impl PriceFeed for MockPriceFeed {
    async fn fetch_prices(&self, ids: &[String]) -> Result<HashMap<String, Decimal>, PriceFeedError> {
        self.requests.lock().await.push(ids.to_vec());
        if let Some(err) = &self.error {
            return Err(err.clone());
        }
        Ok(ids
            .iter()
            .filter_map(|id| self.prices.get(id).map(|p| (id.clone(), *p)))
            .collect())
    }
}
