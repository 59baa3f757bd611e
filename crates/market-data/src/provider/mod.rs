//! Market data provider abstractions and implementations.
//!
//! This module contains:
//! - The `MarketDataProvider` trait that all providers implement
//! - Provider capabilities and rate limiting configuration
//! - Concrete provider implementations (CoinGecko, CoinCap, FX sources)
//!
//! # Architecture
//!
//! The provider system is designed to be:
//! - **Provider-agnostic**: The gateway only sees normalized records and rates
//! - **Extensible**: New providers can be added by implementing `MarketDataProvider`
//! - **Resilient**: Rate gating and ordered fallback protect against provider failures

mod capabilities;
pub(crate) mod http;
mod traits;

pub mod coincap;
pub mod coingecko;
pub mod frankfurter;
pub mod open_er_api;

// Re-exports
pub use capabilities::{
    ProviderCapabilities, RateLimit, DEFAULT_MAX_CALLS_PER_WINDOW, DEFAULT_THROTTLE_BACKOFF,
    DEFAULT_WINDOW,
};
pub use coincap::CoinCapProvider;
pub use coingecko::CoinGeckoProvider;
pub use frankfurter::FrankfurterProvider;
pub use open_er_api::OpenErApiProvider;
pub use traits::MarketDataProvider;
