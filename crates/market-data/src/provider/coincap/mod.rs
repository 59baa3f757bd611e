//! CoinCap market data provider implementation.
//!
//! This module provides market data from the CoinCap v2 API:
//! - Market listings via /assets (ranked by market cap only)
//! - USD spot prices via /assets?ids=...
//!
//! CoinCap encodes numbers as strings and uses the same slug-style ids as
//! CoinGecko for the major coins.
//! API documentation: https://docs.coincap.io

use std::str::FromStr;

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::debug;

use crate::errors::MarketDataError;
use crate::models::{DataKind, MarketOrder, MarketsQuery, NormalizedRecord, PriceMap};
use crate::provider::http::JsonClient;
use crate::provider::{MarketDataProvider, ProviderCapabilities, RateLimit};

pub const DEFAULT_BASE_URL: &str = "https://api.coincap.io/v2";
const PROVIDER_ID: &str = "COINCAP";
const ICON_URL: &str = "https://assets.coincap.io/assets/icons";

// ============================================================================
// API Response Structures
// ============================================================================

/// Envelope of the /assets response
#[derive(Debug, Deserialize)]
struct AssetsResponse {
    data: Vec<AssetItem>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AssetItem {
    id: String,
    name: String,
    symbol: String,
    price_usd: Option<String>,
    change_percent24_hr: Option<String>,
}

/// Parse a CoinCap numeric string, which may use scientific notation.
fn parse_number(raw: Option<&str>) -> Option<Decimal> {
    let raw = raw?.trim();
    if raw.is_empty() {
        return None;
    }
    Decimal::from_str(raw)
        .or_else(|_| Decimal::from_scientific(raw))
        .ok()
}

// ============================================================================
// CoinCapProvider
// ============================================================================

/// CoinCap market data provider.
///
/// Only serves listings ordered by market cap, descending. Other orders are
/// reported as unsupported so the chain moves on.
pub struct CoinCapProvider {
    client: JsonClient,
    base_url: String,
}

impl CoinCapProvider {
    pub fn new() -> Self {
        Self::with_base_url(DEFAULT_BASE_URL)
    }

    /// Create a provider against a custom endpoint (used by tests).
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            client: JsonClient::new(PROVIDER_ID),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    async fn fetch_assets(
        &self,
        params: &[(&str, String)],
    ) -> Result<Vec<AssetItem>, MarketDataError> {
        let url = format!("{}/assets", self.base_url);
        let response: AssetsResponse = self.client.get_json(&url, params, &[]).await?;
        Ok(response.data)
    }

    fn normalize_asset(item: AssetItem) -> Option<NormalizedRecord> {
        let price = parse_number(item.price_usd.as_deref())?;
        let icon = format!("{}/{}@2x.png", ICON_URL, item.symbol.to_lowercase());

        let mut record =
            NormalizedRecord::new(item.id, item.name, item.symbol, price).with_image_url(icon);
        if let Some(change) = parse_number(item.change_percent24_hr.as_deref()) {
            record = record.with_change_percent_24h(change.round_dp(4));
        }
        Some(record)
    }
}

impl Default for CoinCapProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MarketDataProvider for CoinCapProvider {
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

    /// `/assets` is always ranked by market cap, largest first.
    fn supports_order(&self, order: MarketOrder) -> bool {
        order == MarketOrder::MarketCapDesc
    }

    async fn get_markets(
        &self,
        query: &MarketsQuery,
    ) -> Result<Vec<NormalizedRecord>, MarketDataError> {
        if !self.supports_order(query.order) {
            return Err(MarketDataError::NotSupported {
                operation: format!("markets ordered by {}", query.order),
                provider: PROVIDER_ID.to_string(),
            });
        }

        let params = [
            ("limit", query.per_page.to_string()),
            ("offset", query.offset().to_string()),
        ];
        let items = self.fetch_assets(&params).await?;
        let total = items.len();

        let records: Vec<NormalizedRecord> =
            items.into_iter().filter_map(Self::normalize_asset).collect();
        if records.len() < total {
            debug!(
                "CoinCap: dropped {} of {} assets without a price",
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

        let items = self.fetch_assets(&[("ids", ids.join(","))]).await?;

        Ok(items
            .into_iter()
            .filter_map(|item| {
                let price = parse_number(item.price_usd.as_deref())?;
                Some((item.id.to_lowercase(), price))
            })
            .collect())
    }
}
