//! Market data provider trait definitions.
//!
//! This module defines the core `MarketDataProvider` trait that all
//! market data providers must implement.

use async_trait::async_trait;
use rust_decimal::Decimal;

use crate::errors::MarketDataError;
use crate::models::{CurrencyPair, MarketOrder, MarketsQuery, NormalizedRecord, PriceMap};

use super::capabilities::{ProviderCapabilities, RateLimit};

/// Trait for market data providers.
///
/// Implement this trait to add support for a new upstream source. Each method
/// returns data already normalized into the crate's canonical types; raw
/// provider payloads never leave the implementation.
///
/// Only the methods matching the data kinds declared in
/// [`capabilities`](Self::capabilities) need to be implemented; the others
/// default to [`MarketDataError::NotSupported`].
///
/// # Example
///
/// ```ignore
/// use async_trait::async_trait;
/// use cryptofolio_market_data::provider::{MarketDataProvider, ProviderCapabilities};
/// use cryptofolio_market_data::DataKind;
///
/// struct MyProvider;
///
/// #[async_trait]
/// impl MarketDataProvider for MyProvider {
///     fn id(&self) -> &'static str {
///         "MY_PROVIDER"
///     }
///
///     fn capabilities(&self) -> ProviderCapabilities {
///         ProviderCapabilities {
///             data_kinds: &[DataKind::Prices],
///         }
///     }
///
///     // ... implement get_prices
/// }
/// ```
#[async_trait]
pub trait MarketDataProvider: Send + Sync {
    /// Unique identifier for this provider.
    ///
    /// Should be a constant string like "COINGECKO". Used for logging,
    /// rate gate tracking and provider ordering.
    fn id(&self) -> &'static str;

    /// Describes which data kinds this provider can serve.
    fn capabilities(&self) -> ProviderCapabilities;

    /// Upstream call budget for this provider.
    ///
    /// Used to configure the rate gate unless overridden in the gateway
    /// configuration.
    fn rate_limit(&self) -> RateLimit {
        RateLimit::default()
    }

    /// Whether [`get_markets`](Self::get_markets) can sort by `order`.
    ///
    /// Checked before the rate gate, so an unsupported listing never spends
    /// call budget.
    fn supports_order(&self, order: MarketOrder) -> bool {
        let _ = order;
        true
    }

    /// Fetch one page of the market listing, priced in USD.
    async fn get_markets(
        &self,
        query: &MarketsQuery,
    ) -> Result<Vec<NormalizedRecord>, MarketDataError> {
        let _ = query;
        Err(MarketDataError::NotSupported {
            operation: "markets".to_string(),
            provider: self.id().to_string(),
        })
    }

    /// Fetch USD prices for a set of coin ids.
    ///
    /// `ids` are normalized (lowercase, sorted, de-duplicated). Ids the
    /// provider doesn't know are left out of the returned map.
    async fn get_prices(&self, ids: &[String]) -> Result<PriceMap, MarketDataError> {
        let _ = ids;
        Err(MarketDataError::NotSupported {
            operation: "prices".to_string(),
            provider: self.id().to_string(),
        })
    }

    /// Fetch the exchange rate for a currency pair (quote units per base unit).
    async fn get_fx_rate(&self, pair: &CurrencyPair) -> Result<Decimal, MarketDataError> {
        let _ = pair;
        Err(MarketDataError::NotSupported {
            operation: "fx_rate".to_string(),
            provider: self.id().to_string(),
        })
    }
}
