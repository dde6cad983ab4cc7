//! CoinGecko simple-price client.

use async_trait::async_trait;
use backoff::future::retry;
use backoff::ExponentialBackoff;
use reqwest::Client;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;
use tracing::debug;

use super::{PriceFeed, PriceFeedError};
use crate::domain::Decimal;

pub const DEFAULT_BASE_URL: &str = "https://api.coingecko.com/api/v3";

const BASE_BACKOFF: Duration = Duration::from_millis(250);

/// Price feed backed by the public `/simple/price` endpoint.
#[derive(Debug, Clone)]
pub struct CoinGeckoFeed {
    client: Client,
    base_url: String,
    max_retries: u32,
}

impl CoinGeckoFeed {
    pub fn new(base_url: String, max_retries: u32) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            max_retries: max_retries.max(1),
        }
    }

    /// Exponential schedule starting at 250ms and doubling each attempt.
    fn backoff_policy() -> ExponentialBackoff {
        ExponentialBackoff {
            initial_interval: BASE_BACKOFF,
            current_interval: BASE_BACKOFF,
            multiplier: 2.0,
            randomization_factor: 0.0,
            max_elapsed_time: Some(Duration::from_secs(30)),
            ..Default::default()
        }
    }

    async fn get_simple_price(
        &self,
        ids: &[String],
    ) -> Result<HashMap<String, HashMap<String, f64>>, PriceFeedError> {
        let url = format!("{}/simple/price", self.base_url);
        let joined = ids.join(",");
        let attempts = AtomicU32::new(0);

        retry(Self::backoff_policy(), || async {
            let attempt = attempts.fetch_add(1, Ordering::SeqCst) + 1;
            let exhausted = attempt >= self.max_retries;
            let transient = |e: PriceFeedError| {
                if exhausted {
                    backoff::Error::permanent(e)
                } else {
                    backoff::Error::transient(e)
                }
            };

            let response = self
                .client
                .get(&url)
                .query(&[("ids", joined.as_str()), ("vs_currencies", "usd")])
                .header("accept", "application/json")
                .send()
                .await
                .map_err(|e| transient(PriceFeedError::Network(e.to_string())))?;

            let status = response.status();
            if status == 429 {
                return Err(transient(PriceFeedError::RateLimited));
            }
            if status.is_server_error() {
                return Err(transient(PriceFeedError::Http {
                    status: status.as_u16(),
                    message: "Server error".to_string(),
                }));
            }
            if !status.is_success() {
                return Err(backoff::Error::permanent(PriceFeedError::Http {
                    status: status.as_u16(),
                    message: "Client error".to_string(),
                }));
            }

            response
                .json::<HashMap<String, HashMap<String, f64>>>()
                .await
                .map_err(|e| backoff::Error::permanent(PriceFeedError::Parse(e.to_string())))
        })
        .await
    }
}

#[async_trait]
impl PriceFeed for CoinGeckoFeed {
    async fn fetch_prices(&self, ids: &[String]) -> Result<HashMap<String, Decimal>, PriceFeedError> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }
        debug!(count = ids.len(), "Fetching prices");

        let body = self.get_simple_price(ids).await?;
        Ok(extract_usd_prices(ids, &body))
    }
}

/// Pick the positive, finite `usd` quote for each requested id.
fn extract_usd_prices(
    ids: &[String],
    body: &HashMap<String, HashMap<String, f64>>,
) -> HashMap<String, Decimal> {
    ids.iter()
        .filter_map(|id| {
            let usd = *body.get(id)?.get("usd")?;
            if !usd.is_finite() || usd <= 0.0 {
                return None;
            }
            Decimal::from_f64(usd).map(|price| (id.clone(), price))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_usd_prices_filters_bad_quotes() {
        let body: HashMap<String, HashMap<String, f64>> = serde_json::from_str(
            r#"{
                "tangle": {"usd": 2.0},
                "weth": {"usd": 0.0},
                "dai": {"eur": 1.0}
            }"#,
        )
        .unwrap();
        let ids = vec![
            "tangle".to_string(),
            "weth".to_string(),
            "dai".to_string(),
            "missing".to_string(),
        ];

        let prices = extract_usd_prices(&ids, &body);
        assert_eq!(prices.len(), 1);
        assert_eq!(prices["tangle"], Decimal::from_str_canonical("2").unwrap());
    }

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        let feed = CoinGeckoFeed::new("http://localhost:9/".to_string(), 0);
        assert_eq!(feed.base_url, "http://localhost:9");
        assert_eq!(feed.max_retries, 1);
    }
}
