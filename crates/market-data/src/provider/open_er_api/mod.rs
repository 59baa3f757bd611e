//! ExchangeRate-API (open access) FX provider implementation.
//!
//! One call to /v6/latest/{base} returns every rate for the base currency.
//! No API key is needed; the open endpoint refreshes once a day.
//! API documentation: https://www.exchangerate-api.com/docs/free

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::Deserialize;

use crate::errors::MarketDataError;
use crate::models::{CurrencyPair, DataKind};
use crate::provider::http::JsonClient;
use crate::provider::{MarketDataProvider, ProviderCapabilities, RateLimit};

pub const DEFAULT_BASE_URL: &str = "https://open.er-api.com";
const PROVIDER_ID: &str = "OPEN_ER_API";

#[derive(Debug, Deserialize)]
struct LatestResponse {
    /// "success" or "error"
    result: String,
    #[serde(rename = "error-type")]
    error_type: Option<String>,
    #[serde(default)]
    rates: HashMap<String, Decimal>,
}

/// Open ExchangeRate-API provider.
pub struct OpenErApiProvider {
    client: JsonClient,
    base_url: String,
}

impl OpenErApiProvider {
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

impl Default for OpenErApiProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MarketDataProvider for OpenErApiProvider {
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
        let url = format!("{}/v6/latest/{}", self.base_url, pair.base());
        let response: LatestResponse = self.client.get_json(&url, &[], &[]).await?;

        if response.result != "success" {
            let error_type = response.error_type.unwrap_or_else(|| "unknown".to_string());
            // The open endpoint signals throttling in the body
            if error_type == "rate-limited" {
                return Err(MarketDataError::RateLimited {
                    provider: PROVIDER_ID.to_string(),
                });
            }
            return Err(MarketDataError::ProviderError {
                provider: PROVIDER_ID.to_string(),
                message: error_type,
            });
        }

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
