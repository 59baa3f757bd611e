//! Gateway configuration.
//!
//! [`GatewayConfig::default`] carries the recommended values.
//! [`GatewayConfig::from_env`] overlays `CF_*` environment variables (and a
//! `.env` file when present) on top of them.

use std::collections::HashMap;
use std::str::FromStr;
use std::time::Duration;

use rust_decimal::Decimal;
use tracing::warn;

use crate::models::{CurrencyPair, DataKind};
use crate::provider::RateLimit;
use crate::registry::{RetryPolicy, DEFAULT_ATTEMPT_TIMEOUT};

pub const DEFAULT_MARKETS_TTL: Duration = Duration::from_secs(30);
pub const DEFAULT_PRICES_TTL: Duration = Duration::from_secs(60);
pub const DEFAULT_FX_TTL: Duration = Duration::from_secs(600);
pub const DEFAULT_CALLER_WAIT_TIMEOUT: Duration = Duration::from_secs(10);

/// Everything a [`MarketDataGateway`](crate::MarketDataGateway) needs besides
/// its providers.
#[derive(Clone, Debug)]
pub struct GatewayConfig {
    pub markets_ttl: Duration,
    pub prices_ttl: Duration,
    pub fx_ttl: Duration,

    /// Optional cap on entries per cache. `None` means unbounded.
    pub cache_capacity: Option<usize>,

    /// Gate limits shared by the markets and prices chains.
    ///
    /// `None` keeps each provider's own declared limit.
    pub market_rate_limit: Option<RateLimit>,

    /// Gate limits for the FX chain. `None` keeps each provider's own limit.
    pub fx_rate_limit: Option<RateLimit>,

    /// Per-provider overrides, keyed by provider id. Take precedence over
    /// the group limits above.
    pub provider_rate_limits: HashMap<String, RateLimit>,

    pub retry: RetryPolicy,
    pub attempt_timeout: Duration,

    /// How long a caller waits on a shared upstream call before serving
    /// stale data instead. The call itself keeps running.
    pub caller_wait_timeout: Duration,

    /// Provider ids per data kind, in fallback order.
    pub markets_providers: Vec<String>,
    pub prices_providers: Vec<String>,
    pub fx_providers: Vec<String>,

    /// Rate returned when a pair was never fetched and every FX provider fails.
    pub fx_defaults: HashMap<CurrencyPair, Decimal>,

    pub coingecko_api_key: Option<String>,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        let mut fx_defaults = HashMap::new();
        fx_defaults.insert(CurrencyPair::usd_brl(), Decimal::new(50, 1));

        Self {
            markets_ttl: DEFAULT_MARKETS_TTL,
            prices_ttl: DEFAULT_PRICES_TTL,
            fx_ttl: DEFAULT_FX_TTL,
            cache_capacity: None,
            market_rate_limit: None,
            fx_rate_limit: None,
            provider_rate_limits: HashMap::new(),
            retry: RetryPolicy::default(),
            attempt_timeout: DEFAULT_ATTEMPT_TIMEOUT,
            caller_wait_timeout: DEFAULT_CALLER_WAIT_TIMEOUT,
            markets_providers: ids(&["COINGECKO", "COINCAP"]),
            prices_providers: ids(&["COINGECKO", "COINCAP"]),
            fx_providers: ids(&["OPEN_ER_API", "FRANKFURTER"]),
            fx_defaults,
            coingecko_api_key: None,
        }
    }
}

impl GatewayConfig {
    /// Load `.env` (if any) and overlay `CF_*` variables on the defaults.
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build a config from an arbitrary variable source.
    ///
    /// Unparsable values are logged and the default is kept.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = EnvReader { lookup };
        let mut config = Self::default();

        if let Some(secs) = env.parse::<u64>("CF_MARKETS_TTL_SECS") {
            config.markets_ttl = Duration::from_secs(secs);
        }
        if let Some(secs) = env.parse::<u64>("CF_PRICES_TTL_SECS") {
            config.prices_ttl = Duration::from_secs(secs);
        }
        if let Some(secs) = env.parse::<u64>("CF_FX_TTL_SECS") {
            config.fx_ttl = Duration::from_secs(secs);
        }
        if let Some(capacity) = env.parse::<usize>("CF_CACHE_CAPACITY") {
            config.cache_capacity = Some(capacity).filter(|c| *c > 0);
        }

        config.market_rate_limit = env.rate_limit("CF_MARKET", RateLimit::default());
        config.fx_rate_limit = env.rate_limit(
            "CF_FX",
            RateLimit::new(10, Duration::from_secs(60), Duration::from_secs(180)),
        );

        if let Some(max_retries) = env.parse::<u32>("CF_RETRY_MAX") {
            config.retry.max_retries = max_retries;
        }
        if let Some(ms) = env.parse::<u64>("CF_RETRY_BACKOFF_MS") {
            config.retry.backoff_base = Duration::from_millis(ms);
        }
        if let Some(ms) = env.parse::<u64>("CF_ATTEMPT_TIMEOUT_MS") {
            config.attempt_timeout = Duration::from_millis(ms);
        }
        if let Some(ms) = env.parse::<u64>("CF_CALLER_WAIT_TIMEOUT_MS") {
            config.caller_wait_timeout = Duration::from_millis(ms);
        }

        if let Some(list) = env.list("CF_MARKETS_PROVIDERS") {
            config.markets_providers = list;
        }
        if let Some(list) = env.list("CF_PRICES_PROVIDERS") {
            config.prices_providers = list;
        }
        if let Some(list) = env.list("CF_FX_PROVIDERS") {
            config.fx_providers = list;
        }

        if let Some(rate) = env.parse::<Decimal>("CF_FX_DEFAULT_USD_BRL") {
            config.fx_defaults.insert(CurrencyPair::usd_brl(), rate);
        }

        config.coingecko_api_key = env
            .get("CF_COINGECKO_API_KEY")
            .filter(|key| !key.trim().is_empty());

        config
    }

    /// TTL of the cache serving `kind`.
    pub fn ttl_for(&self, kind: DataKind) -> Duration {
        match kind {
            DataKind::Markets => self.markets_ttl,
            DataKind::Prices => self.prices_ttl,
            DataKind::FxRate => self.fx_ttl,
        }
    }

    /// Provider order for `kind`.
    pub fn providers_for(&self, kind: DataKind) -> &[String] {
        match kind {
            DataKind::Markets => &self.markets_providers,
            DataKind::Prices => &self.prices_providers,
            DataKind::FxRate => &self.fx_providers,
        }
    }

    /// Gate limit for a provider serving `kind`.
    ///
    /// Precedence: per-provider override, then the group limit, then the
    /// provider's own declared limit.
    pub fn rate_limit_for(&self, provider_id: &str, kind: DataKind, declared: RateLimit) -> RateLimit {
        if let Some(limit) = self.provider_rate_limits.get(provider_id) {
            return *limit;
        }
        let group = match kind {
            DataKind::Markets | DataKind::Prices => self.market_rate_limit,
            DataKind::FxRate => self.fx_rate_limit,
        };
        group.unwrap_or(declared)
    }

    /// Configured fallback rate for `pair`, if any.
    pub fn fx_default(&self, pair: &CurrencyPair) -> Option<Decimal> {
        self.fx_defaults.get(pair).copied()
    }
}

fn ids(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| v.to_string()).collect()
}

struct EnvReader<F> {
    lookup: F,
}

impl<F> EnvReader<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn get(&self, name: &str) -> Option<String> {
        (self.lookup)(name).map(|v| v.trim().to_string())
    }

    fn parse<T: FromStr>(&self, name: &str) -> Option<T> {
        let raw = self.get(name)?;
        match raw.parse::<T>() {
            Ok(value) => Some(value),
            Err(_) => {
                warn!("Ignoring invalid value for {}: '{}'", name, raw);
                None
            }
        }
    }

    fn list(&self, name: &str) -> Option<Vec<String>> {
        let list: Vec<String> = self
            .get(name)?
            .split(',')
            .map(|s| s.trim().to_uppercase())
            .filter(|s| !s.is_empty())
            .collect();
        if list.is_empty() {
            warn!("Ignoring empty provider list in {}", name);
            return None;
        }
        Some(list)
    }

    /// `{prefix}_MAX_CALLS`, `{prefix}_WINDOW_SECS` and `{prefix}_BACKOFF_SECS`.
    ///
    /// Returns `None` when none of the three is set; missing ones fall back
    /// to `base`.
    fn rate_limit(&self, prefix: &str, base: RateLimit) -> Option<RateLimit> {
        let max_calls = self.parse::<u32>(&format!("{}_MAX_CALLS", prefix));
        let window = self.parse::<u64>(&format!("{}_WINDOW_SECS", prefix));
        let backoff = self.parse::<u64>(&format!("{}_BACKOFF_SECS", prefix));

        if max_calls.is_none() && window.is_none() && backoff.is_none() {
            return None;
        }

        Some(RateLimit::new(
            max_calls.unwrap_or(base.max_calls_per_window),
            window.map(Duration::from_secs).unwrap_or(base.window),
            backoff.map(Duration::from_secs).unwrap_or(base.throttle_backoff),
        ))
    }
}
