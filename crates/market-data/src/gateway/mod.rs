//! The market data façade.
//!
//! [`MarketDataGateway`] is the only entry point request handlers use. Every
//! operation follows the same path:
//!
//! 1. A fresh cache hit is returned without touching the network.
//! 2. Otherwise the request joins (or starts) the single in-flight upstream
//!    call for its cache key.
//! 3. The call walks the provider chain; a success refreshes the cache.
//! 4. On failure the caller gets the last known value, or an empty/default one.
//!
//! The façade never returns an error.

mod status;

use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;

use rust_decimal::Decimal;
use tracing::{debug, info, warn};

use crate::cache::{RequestCoalescer, TtlStore};
use crate::clock::{Clock, SystemClock};
use crate::config::GatewayConfig;
use crate::errors::MarketDataError;
use crate::models::{
    normalize_ids, CacheKey, CurrencyPair, DataKind, FxRate, MarketOrder, MarketsQuery,
    NormalizedRecord, PriceMap, ProviderId, MAX_PAGE_SIZE,
};
use crate::provider::{
    CoinCapProvider, CoinGeckoProvider, FrankfurterProvider, MarketDataProvider,
    OpenErApiProvider,
};
use crate::registry::{ProviderChain, RateGate};

pub use status::{CacheStatus, ChainStatus, GatewayStatus};

/// Default number of records gathered by [`MarketDataGateway::get_market_listing`].
pub const DEFAULT_LISTING_ITEMS: usize = 60;

/// Default page size used to walk a listing.
pub const DEFAULT_LISTING_PAGE_SIZE: u32 = 30;

/// Cached, coalesced, rate-gated access to market data.
///
/// Cheap to clone; clones share all state. Independent instances share
/// nothing, which keeps tests isolated.
#[derive(Clone)]
pub struct MarketDataGateway {
    inner: Arc<GatewayInner>,
}

struct GatewayInner {
    config: GatewayConfig,

    markets_chain: ProviderChain,
    prices_chain: ProviderChain,
    fx_chain: ProviderChain,

    market_gate: Arc<RateGate>,
    fx_gate: Arc<RateGate>,

    markets_cache: TtlStore<Vec<NormalizedRecord>>,
    prices_cache: TtlStore<PriceMap>,
    fx_cache: TtlStore<FxRate>,

    markets_flights: RequestCoalescer<Vec<NormalizedRecord>>,
    prices_flights: RequestCoalescer<PriceMap>,
    fx_flights: RequestCoalescer<FxRate>,
}

impl MarketDataGateway {
    /// Build a gateway over `providers`, using the system clock.
    ///
    /// Which providers serve which data kind, and in what order, is decided
    /// by the provider lists in `config`.
    pub fn new(config: GatewayConfig, providers: Vec<Arc<dyn MarketDataProvider>>) -> Self {
        Self::with_clock(config, providers, Arc::new(SystemClock))
    }

    /// Build a gateway with the built-in HTTP providers.
    pub fn from_config(config: GatewayConfig) -> Self {
        let providers: Vec<Arc<dyn MarketDataProvider>> = vec![
            Arc::new(CoinGeckoProvider::new(config.coingecko_api_key.clone())),
            Arc::new(CoinCapProvider::new()),
            Arc::new(OpenErApiProvider::new()),
            Arc::new(FrankfurterProvider::new()),
        ];
        Self::new(config, providers)
    }

    /// Build a gateway with an injected clock.
    pub fn with_clock(
        config: GatewayConfig,
        providers: Vec<Arc<dyn MarketDataProvider>>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let market_gate = Arc::new(RateGate::with_default_limit(
            config.market_rate_limit.unwrap_or_default(),
            Arc::clone(&clock),
        ));
        let fx_gate = Arc::new(RateGate::with_default_limit(
            config.fx_rate_limit.unwrap_or_default(),
            Arc::clone(&clock),
        ));

        let build_chain = |kind: DataKind, gate: &Arc<RateGate>| {
            let ordered = order_providers(&config, kind, &providers);
            for provider in &ordered {
                let id: ProviderId = provider.id().into();
                gate.configure(&id, config.rate_limit_for(&id, kind, provider.rate_limit()));
            }
            ProviderChain::new(kind, ordered, Arc::clone(gate), Arc::clone(&clock))
                .with_retry(config.retry)
                .with_attempt_timeout(config.attempt_timeout)
        };

        let markets_chain = build_chain(DataKind::Markets, &market_gate);
        let prices_chain = build_chain(DataKind::Prices, &market_gate);
        let fx_chain = build_chain(DataKind::FxRate, &fx_gate);

        info!(
            markets = ?markets_chain.provider_ids(),
            prices = ?prices_chain.provider_ids(),
            fx = ?fx_chain.provider_ids(),
            "market data gateway ready"
        );

        let inner = GatewayInner {
            markets_cache: build_cache(&config, &clock, DataKind::Markets),
            prices_cache: build_cache(&config, &clock, DataKind::Prices),
            fx_cache: build_cache(&config, &clock, DataKind::FxRate),
            markets_chain,
            prices_chain,
            fx_chain,
            market_gate,
            fx_gate,
            markets_flights: RequestCoalescer::new(),
            prices_flights: RequestCoalescer::new(),
            fx_flights: RequestCoalescer::new(),
            config,
        };

        Self {
            inner: Arc::new(inner),
        }
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.inner.config
    }

    /// The gate guarding upstream calls for `kind`.
    ///
    /// Markets and prices share one gate, so a provider serving both spends
    /// a single budget.
    pub fn rate_gate(&self, kind: DataKind) -> &Arc<RateGate> {
        match kind {
            DataKind::Markets | DataKind::Prices => &self.inner.market_gate,
            DataKind::FxRate => &self.inner.fx_gate,
        }
    }

    /// One page of the USD market listing.
    ///
    /// Falls back to the last cached copy of the page, then to an empty list.
    pub async fn get_markets(&self, query: MarketsQuery) -> Vec<NormalizedRecord> {
        let key = CacheKey::markets(&query);
        if let Some(records) = self.inner.markets_cache.get_fresh(&key) {
            debug!(key = %key, "markets cache hit");
            return records;
        }

        let inner = Arc::clone(&self.inner);
        let cache_key = key.clone();
        let flight = self.inner.markets_flights.run_exclusive(key.clone(), move || async move {
            let (result, _) = inner
                .markets_chain
                .fetch_eligible(
                    |provider| provider.supports_order(query.order),
                    move |provider| async move { provider.get_markets(&query).await },
                )
                .await;
            if let Ok(records) = &result {
                inner.markets_cache.set(cache_key, records.clone());
            }
            result
        });

        match self.wait(flight).await {
            Ok(records) => records,
            Err(e) => degrade(&key, &e, self.inner.markets_cache.get_stale(&key))
                .unwrap_or_default(),
        }
    }

    /// USD prices for `ids`.
    ///
    /// Ids are trimmed, lowercased and de-duplicated; blank ids are dropped.
    /// An empty id set returns an empty map without any lookup. Ids unknown
    /// to every provider are simply absent from the result.
    pub async fn get_prices<S: AsRef<str>>(&self, ids: &[S]) -> PriceMap {
        let ids = normalize_ids(ids.iter().map(|id| id.as_ref()));
        if ids.is_empty() {
            return PriceMap::new();
        }

        let key = CacheKey::prices(&ids);
        if let Some(prices) = self.inner.prices_cache.get_fresh(&key) {
            debug!(key = %key, "prices cache hit");
            return prices;
        }

        let inner = Arc::clone(&self.inner);
        let cache_key = key.clone();
        let flight = self.inner.prices_flights.run_exclusive(key.clone(), move || async move {
            let ids = Arc::new(ids);
            let (result, _) = inner
                .prices_chain
                .fetch_with_fallback(|provider| {
                    let ids = Arc::clone(&ids);
                    async move { provider.get_prices(&ids).await }
                })
                .await;
            if let Ok(prices) = &result {
                inner.prices_cache.set(cache_key, prices.clone());
            }
            result
        });

        match self.wait(flight).await {
            Ok(prices) => prices,
            Err(e) => {
                degrade(&key, &e, self.inner.prices_cache.get_stale(&key)).unwrap_or_default()
            }
        }
    }

    /// Exchange rate for `pair` (quote units per base unit).
    ///
    /// Falls back to the last known rate, then to the configured default for
    /// the pair, then to 1.
    pub async fn get_fx_rate(&self, pair: &CurrencyPair) -> Decimal {
        if pair.is_identity() {
            return Decimal::ONE;
        }

        let key = CacheKey::fx(pair);
        if let Some(fx) = self.inner.fx_cache.get_fresh(&key) {
            debug!(key = %key, "fx cache hit");
            return fx.rate;
        }

        let inner = Arc::clone(&self.inner);
        let cache_key = key.clone();
        let fetch_pair = pair.clone();
        let flight = self.inner.fx_flights.run_exclusive(key.clone(), move || async move {
            let pair = Arc::new(fetch_pair);
            let (result, _) = inner
                .fx_chain
                .fetch_with_fallback(|provider| {
                    let pair = Arc::clone(&pair);
                    async move { provider.get_fx_rate(&pair).await }
                })
                .await;
            let result = result.map(|rate| FxRate::new(pair.as_ref().clone(), rate));
            if let Ok(fx) = &result {
                inner.fx_cache.set(cache_key, fx.clone());
            }
            result
        });

        match self.wait(flight).await {
            Ok(fx) => fx.rate,
            Err(e) => match degrade(&key, &e, self.inner.fx_cache.get_stale(&key)) {
                Some(fx) => fx.rate,
                None => match self.inner.config.fx_default(pair) {
                    Some(rate) => {
                        warn!(pair = %pair, %rate, "using configured default fx rate");
                        rate
                    }
                    None => {
                        warn!(pair = %pair, "no default fx rate configured, using 1");
                        Decimal::ONE
                    }
                },
            },
        }
    }

    /// USD/BRL, the rate the portfolio views are denominated in.
    pub async fn get_usd_brl(&self) -> Decimal {
        self.get_fx_rate(&CurrencyPair::usd_brl()).await
    }

    /// Gather up to `max_items` records by walking listing pages from page 1.
    ///
    /// Each page goes through [`get_markets`](Self::get_markets), so pages are
    /// cached and coalesced individually. The walk stops at the first empty
    /// or short page. Records repeated across pages are kept once.
    pub async fn get_market_listing(
        &self,
        order: MarketOrder,
        max_items: usize,
        page_size: u32,
    ) -> Vec<NormalizedRecord> {
        let page_size = page_size.clamp(1, MAX_PAGE_SIZE);
        let mut seen = HashSet::new();
        let mut items = Vec::new();
        let mut page = 1;

        while items.len() < max_items {
            let batch = self
                .get_markets(MarketsQuery::new(page, page_size, order))
                .await;
            if batch.is_empty() {
                break;
            }

            let short = batch.len() < page_size as usize;
            items.extend(batch.into_iter().filter(|r| seen.insert(r.id.clone())));
            if short {
                break;
            }
            page += 1;
        }

        items.truncate(max_items);
        items
    }

    /// Snapshot of gates, caches and in-flight calls.
    pub fn status(&self) -> GatewayStatus {
        let inner = &self.inner;
        let chain = |chain: &ProviderChain| ChainStatus {
            kind: chain.kind(),
            providers: chain.provider_ids(),
        };

        GatewayStatus {
            chains: vec![
                chain(&inner.markets_chain),
                chain(&inner.prices_chain),
                chain(&inner.fx_chain),
            ],
            market_gate: inner.market_gate.snapshot(),
            fx_gate: inner.fx_gate.snapshot(),
            cached: CacheStatus {
                markets: inner.markets_cache.len(),
                prices: inner.prices_cache.len(),
                fx: inner.fx_cache.len(),
            },
            in_flight: inner.markets_flights.in_flight()
                + inner.prices_flights.in_flight()
                + inner.fx_flights.in_flight(),
        }
    }

    /// Wait on a shared call, giving up after the caller wait timeout.
    ///
    /// Giving up only detaches this caller; the call keeps running and still
    /// refreshes the cache for later requests.
    async fn wait<V, F>(&self, flight: F) -> Result<V, MarketDataError>
    where
        F: Future<Output = Result<V, MarketDataError>>,
    {
        let limit = self.inner.config.caller_wait_timeout;
        match tokio::time::timeout(limit, flight).await {
            Ok(result) => result,
            Err(_) => Err(MarketDataError::Timeout {
                provider: "gateway".to_string(),
            }),
        }
    }
}

/// Log a failed fetch and pass through the stale value, if any.
fn build_cache<V: Clone>(
    config: &GatewayConfig,
    clock: &Arc<dyn Clock>,
    kind: DataKind,
) -> TtlStore<V> {
    TtlStore::new(config.ttl_for(kind), Arc::clone(clock))
        .with_capacity_limit(config.cache_capacity)
}

fn degrade<V>(key: &CacheKey, error: &MarketDataError, stale: Option<V>) -> Option<V> {
    match &stale {
        Some(_) => warn!(key = %key, error = %error, "upstream failed, serving stale data"),
        None => warn!(key = %key, error = %error, "upstream failed and nothing cached"),
    }
    stale
}

/// Pick the providers listed for `kind`, in configured order.
fn order_providers(
    config: &GatewayConfig,
    kind: DataKind,
    providers: &[Arc<dyn MarketDataProvider>],
) -> Vec<Arc<dyn MarketDataProvider>> {
    config
        .providers_for(kind)
        .iter()
        .filter_map(|id| {
            let found = providers.iter().find(|p| p.id().eq_ignore_ascii_case(id));
            if found.is_none() {
                warn!(provider = %id, %kind, "configured provider is not available");
            }
            found.cloned()
        })
        .collect()
}
