//! Frankfurter FX provider implementation.
//!
//! Serves ECB reference rates via /latest?from=...&to=...
//! API documentation: https://www.frankfurter.app/docs

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::Deserialize;

use crate::errors::MarketDataError;
use crate::models::{CurrencyPair, DataKind};
use crate::provider::http::JsonClient;
use crate::provider::{MarketDataProvider, ProviderCapabilities, RateLimit};

pub const DEFAULT_BASE_URL: &str = "https://api.frankfurter.app";
const PROVIDER_ID: &str = "FRANKFURTER";

#[derive(Debug, Deserialize)]
struct LatestResponse {
    #[serde(default)]
    rates: HashMap<String, Decimal>,
}

/// Frankfurter (ECB reference rates) provider.
pub struct FrankfurterProvider {
    client: JsonClient,
    base_url: String,
}

impl FrankfurterProvider {
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
}

impl Default for FrankfurterProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MarketDataProvider for FrankfurterProvider {
    fn id(&self) -> &'static str {
        PROVIDER_ID
    }

    fn capabilities(&self) -> ProviderCapabilities {
        ProviderCapabilities {
            data_kinds: &[DataKind::FxRate],
        }
    }

    fn rate_limit(&self) -> RateLimit {
        RateLimit::new(10, Duration::from_secs(60), Duration::from_secs(180))
    }

    async fn get_fx_rate(&self, pair: &CurrencyPair) -> Result<Decimal, MarketDataError> {
        let url = format!("{}/latest", self.base_url);
        let params = [
            ("from", pair.base().to_string()),
            ("to", pair.quote().to_string()),
        ];
        let response: LatestResponse = self.client.get_json(&url, &params, &[]).await?;

        response
            .rates
            .get(pair.quote())
            .copied()
            .ok_or_else(|| MarketDataError::MalformedResponse {
                provider: PROVIDER_ID.to_string(),
                message: format!("no rate for {}", pair),
            })
    }
}
