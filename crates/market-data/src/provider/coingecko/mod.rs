//! CoinGecko market data provider implementation.
//!
//! This module provides market data from the CoinGecko public API:
//! - Paged market listings via /coins/markets
//! - USD spot prices via /simple/price
//!
//! The public tier is limited to a few dozen calls per minute.
//! API documentation: https://docs.coingecko.com/reference/introduction

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::collections::HashMap;
use tracing::{debug, warn};

use crate::errors::MarketDataError;
use crate::models::{DataKind, MarketsQuery, NormalizedRecord, PriceMap};
use crate::provider::http::JsonClient;
use crate::provider::{MarketDataProvider, ProviderCapabilities, RateLimit};

pub const DEFAULT_BASE_URL: &str = "https://api.coingecko.com/api/v3";
const PROVIDER_ID: &str = "COINGECKO";
const API_KEY_HEADER: &str = "x-cg-demo-api-key";

// ============================================================================
// API Response Structures
// ============================================================================

/// Item of the /coins/markets response
#[derive(Debug, Deserialize)]
struct MarketItem {
    id: String,
    name: String,
    symbol: String,
    image: Option<String>,
    /// Null for coins without recent trades
    current_price: Option<Decimal>,
    price_change_percentage_24h: Option<Decimal>,
}

/// /simple/price response: coin id -> currency -> price
type SimplePriceResponse = HashMap<String, HashMap<String, Option<Decimal>>>;

// ============================================================================
// CoinGeckoProvider
// ============================================================================

/// CoinGecko market data provider.
///
/// Serves both market listings and spot prices, in every sort order.
pub struct CoinGeckoProvider {
    client: JsonClient,
    base_url: String,
    api_key: Option<String>,
}

impl CoinGeckoProvider {
    /// Create a provider against the public API.
    pub fn new(api_key: Option<String>) -> Self {
        Self::with_base_url(DEFAULT_BASE_URL, api_key)
    }

    /// Create a provider against a custom endpoint (used by tests).
    pub fn with_base_url(base_url: impl Into<String>, api_key: Option<String>) -> Self {
        Self {
            client: JsonClient::new(PROVIDER_ID),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.filter(|k| !k.trim().is_empty()),
        }
    }

    fn headers(&self) -> Vec<(&'static str, String)> {
        self.api_key
            .iter()
            .map(|key| (API_KEY_HEADER, key.clone()))
            .collect()
    }

    fn normalize_market(item: MarketItem) -> Option<NormalizedRecord> {
        let price = item.current_price?;
        if item.id.trim().is_empty() {
            return None;
        }

        let mut record = NormalizedRecord::new(item.id, item.name, item.symbol, price);
        if let Some(image) = item.image.filter(|i| !i.is_empty()) {
            record = record.with_image_url(image);
        }
        if let Some(change) = item.price_change_percentage_24h {
            record = record.with_change_percent_24h(change);
        }
        Some(record)
    }
}

#[async_trait]
impl MarketDataProvider for CoinGeckoProvider {
    fn id(&self) -> &'static str {
        PROVIDER_ID
    }

    fn capabilities(&self) -> ProviderCapabilities {
        ProviderCapabilities {
            data_kinds: &[DataKind::Markets, DataKind::Prices],
        }
    }

    fn rate_limit(&self) -> RateLimit {
        RateLimit::default()
    }

    async fn get_markets(
        &self,
        query: &MarketsQuery,
    ) -> Result<Vec<NormalizedRecord>, MarketDataError> {
        let url = format!("{}/coins/markets", self.base_url);
        let params = [
            ("vs_currency", "usd".to_string()),
            ("order", query.order.as_str().to_string()),
            ("per_page", query.per_page.to_string()),
            ("page", query.page.to_string()),
            ("sparkline", "false".to_string()),
            ("price_change_percentage", "24h".to_string()),
        ];

        let items: Vec<MarketItem> = self.client.get_json(&url, &params, &self.headers()).await?;
        let total = items.len();

        let records: Vec<NormalizedRecord> =
            items.into_iter().filter_map(Self::normalize_market).collect();

        if records.len() < total {
            debug!(
                "CoinGecko: dropped {} of {} market items without a price",
                total - records.len(),
                total
            );
        }

        Ok(records)
    }

    async fn get_prices(&self, ids: &[String]) -> Result<PriceMap, MarketDataError> {
        if ids.is_empty() {
            return Ok(PriceMap::new());
        }

        let url = format!("{}/simple/price", self.base_url);
        let params = [
            ("ids", ids.join(",")),
            ("vs_currencies", "usd".to_string()),
        ];

        let response: SimplePriceResponse =
            self.client.get_json(&url, &params, &self.headers()).await?;

        let prices: PriceMap = response
            .into_iter()
            .filter_map(|(id, quotes)| {
                let price = quotes.get("usd").copied().flatten()?;
                Some((id.to_lowercase(), price))
            })
            .collect();

        if prices.len() < ids.len() {
            warn!(
                "CoinGecko: no price for {} of {} requested ids",
                ids.len() - prices.len(),
                ids.len()
            );
        }

        Ok(prices)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_provider_id_and_capabilities() {
        let provider = CoinGeckoProvider::new(None);
        assert_eq!(provider.id(), "COINGECKO");
        let caps = provider.capabilities();
        assert!(caps.supports(DataKind::Markets));
        assert!(caps.supports(DataKind::Prices));
        assert!(!caps.supports(DataKind::FxRate));
    }

    #[test]
    fn test_blank_api_key_is_ignored() {
        let provider = CoinGeckoProvider::with_base_url("http://localhost/", Some("  ".into()));
        assert!(provider.headers().is_empty());
        assert_eq!(provider.base_url, "http://localhost");

        let provider = CoinGeckoProvider::new(Some("demo".into()));
        assert_eq!(provider.headers(), vec![(API_KEY_HEADER, "demo".to_string())]);
    }

    #[test]
    fn test_normalize_market_item() {
        let item: MarketItem = serde_json::from_str(
            r#"{
                "id": "bitcoin",
                "name": "Bitcoin",
                "symbol": "btc",
                "image": "https://example.com/btc.png",
                "current_price": 64000.5,
                "price_change_percentage_24h": -1.25
            }"#,
        )
        .unwrap();

        let record = CoinGeckoProvider::normalize_market(item).unwrap();
        assert_eq!(record.symbol, "BTC");
        assert_eq!(record.price_usd, dec!(64000.5));
        assert_eq!(record.change_percent_24h, Some(dec!(-1.25)));
        assert_eq!(record.image_url.as_deref(), Some("https://example.com/btc.png"));
    }

    #[test]
    fn test_items_without_price_are_dropped() {
        let item: MarketItem = serde_json::from_str(
            r#"{"id": "dead", "name": "Dead", "symbol": "ded", "image": null, "current_price": null}"#,
        )
        .unwrap();
        assert!(CoinGeckoProvider::normalize_market(item).is_none());
    }
}
