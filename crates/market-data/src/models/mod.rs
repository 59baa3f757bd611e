//! Market data models
//!
//! This module contains the core data types for market data operations:
//! - `types` - Provider identifiers and the data kinds the gateway serves
//! - `record` - The canonical normalized market record
//! - `fx` - Currency pairs and exchange rates
//! - `query` - Paged market listing parameters
//! - `cache_key` - Deterministic cache keys derived from requests
//! - `coin_id` - Coin id slug derivation

mod cache_key;
mod coin_id;
mod fx;
mod query;
mod record;
mod types;

pub use cache_key::{normalize_ids, CacheKey};
pub use coin_id::{resolve_coin_id, slugify_coin_id};
pub use fx::{CurrencyPair, FxRate};
pub use query::{MarketOrder, MarketsQuery, MAX_PAGE_SIZE};
pub use record::{NormalizedRecord, PriceMap};
pub use types::{DataKind, ProviderId};
