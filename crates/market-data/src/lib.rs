//! Cryptofolio Market Data Crate
//!
//! This crate keeps the portfolio's market data fresh while staying inside
//! the free-tier budgets of public crypto and FX APIs.
//!
//! # Overview
//!
//! The market data crate supports:
//! - Paged USD market listings, simple USD prices and fiat exchange rates
//! - Multiple providers per data kind with ordered fallback
//! - Per-provider sliding-window rate gating with throttle backoff
//! - TTL caching with stale fallback and single-flight request coalescing
//!
//! # Architecture
//!
//! ```text
//! +------------------+
//! |  HTTP handlers   |
//! +------------------+
//!          |
//!          v
//! +------------------+     +------------------+
//! | MarketDataGateway| --> |    TtlStore      |  (fresh hit returns here)
//! +------------------+     +------------------+
//!          |
//!          v
//! +------------------+
//! | RequestCoalescer |  (one upstream call per cache key)
//! +------------------+
//!          |
//!          v
//! +------------------+     +------------------+
//! |  ProviderChain   | --> |    RateGate      |  (admit, skip or back off)
//! +------------------+     +------------------+
//!          |
//!          v
//! +------------------+
//! |    Provider      |  (CoinGecko, CoinCap, ...)
//! +------------------+
//! ```
//!
//! # Core Types
//!
//! - [`MarketDataGateway`] - The façade; never returns an error
//! - [`NormalizedRecord`] - Provider-agnostic market record
//! - [`CurrencyPair`] / [`FxRate`] - Fiat exchange rates
//! - [`MarketsQuery`] - Page, page size and sort order of a listing request
//! - [`GatewayConfig`] - Tunables, loadable from `CF_*` environment variables

pub mod cache;
pub mod clock;
pub mod config;
pub mod errors;
pub mod gateway;
pub mod models;
pub mod provider;
pub mod registry;

// Re-export all public types from models
pub use models::{
    normalize_ids, resolve_coin_id, slugify_coin_id, CacheKey, CurrencyPair, DataKind, FxRate,
    MarketOrder, MarketsQuery, NormalizedRecord, PriceMap, ProviderId, MAX_PAGE_SIZE,
};

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::GatewayConfig;
pub use errors::{MarketDataError, RetryClass};
pub use gateway::{
    GatewayStatus, MarketDataGateway, DEFAULT_LISTING_ITEMS, DEFAULT_LISTING_PAGE_SIZE,
};

// Re-export provider types
pub use provider::{
    CoinCapProvider, CoinGeckoProvider, FrankfurterProvider, MarketDataProvider,
    OpenErApiProvider, ProviderCapabilities, RateLimit,
};

// Re-export registry types
pub use registry::{
    Admission, FetchDiagnostics, GateSnapshot, ProviderAttempt, ProviderChain, RateGate,
    RetryPolicy, SkipReason,
};
