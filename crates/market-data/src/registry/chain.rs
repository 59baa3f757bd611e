//! Ordered provider fallback for one data kind.
//!
//! The chain walks its providers in configured order. For each provider it:
//! - Asks the rate gate for admission and skips the provider when rejected
//! - Calls the provider with a per-attempt timeout
//! - Retries transient failures with linear backoff, re-admitting each retry
//! - Records throttling with the gate and moves on to the next provider
//!
//! The first non-empty normalized result wins.

use std::borrow::Cow;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use log::{debug, warn};
use rust_decimal::Decimal;

use super::{Admission, FetchDiagnostics, RateGate, SkipReason};
use crate::clock::Clock;
use crate::errors::{MarketDataError, RetryClass};
use crate::models::{DataKind, NormalizedRecord, PriceMap, ProviderId};
use crate::provider::MarketDataProvider;

/// Default number of retries after the first attempt.
pub const DEFAULT_MAX_RETRIES: u32 = 2;

/// Default base delay for linear retry backoff.
pub const DEFAULT_BACKOFF_BASE: Duration = Duration::from_millis(700);

/// Default upper bound on a single upstream attempt.
pub const DEFAULT_ATTEMPT_TIMEOUT: Duration = Duration::from_secs(5);

/// Bounded retry with linear backoff.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt, per provider.
    pub max_retries: u32,
    /// Delay before retry `n` is `backoff_base * n`.
    pub backoff_base: Duration,
}

impl RetryPolicy {
    pub fn new(max_retries: u32, backoff_base: Duration) -> Self {
        Self {
            max_retries,
            backoff_base,
        }
    }

    /// Delay before the given retry (1-based).
    pub fn delay_for(&self, retry: u32) -> Duration {
        self.backoff_base * retry
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_RETRIES, DEFAULT_BACKOFF_BASE)
    }
}

/// A normalized provider result that may turn out to carry nothing usable.
///
/// Empty payloads count as a provider failure and the chain moves on.
pub trait Payload {
    fn is_empty_payload(&self) -> bool;
}

impl Payload for Vec<NormalizedRecord> {
    fn is_empty_payload(&self) -> bool {
        self.is_empty()
    }
}

impl Payload for PriceMap {
    fn is_empty_payload(&self) -> bool {
        self.is_empty()
    }
}

impl Payload for Decimal {
    fn is_empty_payload(&self) -> bool {
        *self <= Decimal::ZERO
    }
}

/// Ordered list of providers serving one data kind.
pub struct ProviderChain {
    kind: DataKind,
    providers: Vec<Arc<dyn MarketDataProvider>>,
    gate: Arc<RateGate>,
    retry: RetryPolicy,
    attempt_timeout: Duration,
    clock: Arc<dyn Clock>,
}

impl ProviderChain {
    /// Build a chain from `providers`, keeping their order.
    ///
    /// Providers that don't declare support for `kind` are dropped.
    pub fn new(
        kind: DataKind,
        providers: Vec<Arc<dyn MarketDataProvider>>,
        gate: Arc<RateGate>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let providers: Vec<_> = providers
            .into_iter()
            .filter(|p| {
                let supported = p.capabilities().supports(kind);
                if !supported {
                    warn!(
                        "Provider '{}' does not serve {}, leaving it out of the chain",
                        p.id(),
                        kind
                    );
                }
                supported
            })
            .collect();

        Self {
            kind,
            providers,
            gate,
            retry: RetryPolicy::default(),
            attempt_timeout: DEFAULT_ATTEMPT_TIMEOUT,
            clock,
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_attempt_timeout(mut self, timeout: Duration) -> Self {
        self.attempt_timeout = timeout;
        self
    }

    pub fn kind(&self) -> DataKind {
        self.kind
    }

    pub fn providers(&self) -> &[Arc<dyn MarketDataProvider>] {
        &self.providers
    }

    pub fn provider_ids(&self) -> Vec<&'static str> {
        self.providers.iter().map(|p| p.id()).collect()
    }

    pub fn gate(&self) -> &Arc<RateGate> {
        &self.gate
    }

    /// Try each provider in order until one returns a non-empty result.
    ///
    /// `call` performs one upstream request against the given provider.
    /// Returns the result together with a record of what each provider did.
    pub async fn fetch_with_fallback<T, F, Fut>(
        &self,
        call: F,
    ) -> (Result<T, MarketDataError>, FetchDiagnostics)
    where
        T: Payload,
        F: Fn(Arc<dyn MarketDataProvider>) -> Fut,
        Fut: Future<Output = Result<T, MarketDataError>>,
    {
        self.fetch_eligible(|_| true, call).await
    }

    /// Like [`fetch_with_fallback`](Self::fetch_with_fallback), but providers
    /// for which `eligible` returns false are skipped before the gate is
    /// consulted.
    pub async fn fetch_eligible<T, E, F, Fut>(
        &self,
        eligible: E,
        call: F,
    ) -> (Result<T, MarketDataError>, FetchDiagnostics)
    where
        T: Payload,
        E: Fn(&dyn MarketDataProvider) -> bool,
        F: Fn(Arc<dyn MarketDataProvider>) -> Fut,
        Fut: Future<Output = Result<T, MarketDataError>>,
    {
        let mut diagnostics = FetchDiagnostics::new();

        if self.providers.is_empty() {
            warn!("No providers configured for {}", self.kind);
            return (
                Err(MarketDataError::AllProvidersFailed {
                    summary: diagnostics.summary(),
                }),
                diagnostics,
            );
        }

        for provider in &self.providers {
            let provider_id: ProviderId = Cow::Borrowed(provider.id());

            if !eligible(provider.as_ref()) {
                debug!("Skipping '{}' for {}: unsupported request", provider_id, self.kind);
                diagnostics.record_skip(provider_id, SkipReason::Unsupported);
                continue;
            }

            match self.gate.try_acquire(&provider_id) {
                Admission::Admitted => {}
                Admission::RejectedWindow => {
                    debug!("Skipping '{}' for {}: rate window full", provider_id, self.kind);
                    diagnostics.record_skip(provider_id, SkipReason::RateWindowFull);
                    continue;
                }
                Admission::RejectedBackoff => {
                    debug!("Skipping '{}' for {}: throttle backoff", provider_id, self.kind);
                    diagnostics.record_skip(provider_id, SkipReason::ThrottleBackoff);
                    continue;
                }
            }

            let (result, calls) = self.call_with_retry(provider, &provider_id, &call).await;

            match result {
                Ok(payload) if !payload.is_empty_payload() => {
                    diagnostics.record_success(provider_id, calls);
                    debug!(
                        "Fetched {} after {} call(s). Diagnostics: {}",
                        self.kind,
                        diagnostics.total_calls(),
                        diagnostics.summary()
                    );
                    return (Ok(payload), diagnostics);
                }
                Ok(_) => {
                    debug!("Provider '{}' returned no usable {}", provider_id, self.kind);
                    diagnostics.record_error(provider_id, calls, "empty result".to_string());
                }
                Err(e) => {
                    diagnostics.record_error(provider_id.clone(), calls, e.to_string());

                    match e.retry_class() {
                        RetryClass::Never => {
                            warn!(
                                "Non-retryable error for {}: {}. Diagnostics: {}",
                                self.kind,
                                e,
                                diagnostics.summary()
                            );
                            return (Err(e), diagnostics);
                        }
                        RetryClass::Throttled => {
                            self.gate.report_throttled(&provider_id);
                        }
                        RetryClass::WithBackoff | RetryClass::NextProvider => {}
                    }
                }
            }
        }

        warn!(
            "All providers failed for {}. Diagnostics: {}",
            self.kind,
            diagnostics.summary()
        );
        (
            Err(MarketDataError::AllProvidersFailed {
                summary: diagnostics.summary(),
            }),
            diagnostics,
        )
    }

    /// Call one provider, retrying transient failures.
    ///
    /// The first attempt must already be admitted. Returns the final outcome
    /// and the number of upstream calls made.
    async fn call_with_retry<T, F, Fut>(
        &self,
        provider: &Arc<dyn MarketDataProvider>,
        provider_id: &ProviderId,
        call: &F,
    ) -> (Result<T, MarketDataError>, u32)
    where
        F: Fn(Arc<dyn MarketDataProvider>) -> Fut,
        Fut: Future<Output = Result<T, MarketDataError>>,
    {
        let mut calls = 0u32;
        let mut retry = 0u32;

        loop {
            calls += 1;
            let result = match tokio::time::timeout(self.attempt_timeout, call(Arc::clone(provider)))
                .await
            {
                Ok(result) => result,
                Err(_) => Err(MarketDataError::Timeout {
                    provider: provider_id.to_string(),
                }),
            };

            let error = match result {
                Ok(payload) => return (Ok(payload), calls),
                Err(e) => e,
            };

            if error.retry_class() != RetryClass::WithBackoff || retry >= self.retry.max_retries {
                return (Err(error), calls);
            }

            retry += 1;
            let delay = self.retry.delay_for(retry);
            debug!(
                "Retrying '{}' for {} in {:?} (retry {}/{}): {}",
                provider_id, self.kind, delay, retry, self.retry.max_retries, error
            );
            self.clock.sleep(delay).await;

            // Every retry is another upstream call and needs its own admission
            if !self.gate.try_acquire(provider_id).is_admitted() {
                debug!("Retry budget for '{}' exhausted by rate gate", provider_id);
                return (Err(error), calls);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::models::MarketsQuery;
    use crate::provider::{ProviderCapabilities, RateLimit};
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;

    /// Provider that replays a scripted sequence of price outcomes.
    struct ScriptedProvider {
        id: &'static str,
        script: Mutex<VecDeque<Result<PriceMap, MarketDataError>>>,
        calls: AtomicU32,
    }

    impl ScriptedProvider {
        fn new(id: &'static str, script: Vec<Result<PriceMap, MarketDataError>>) -> Arc<Self> {
            Arc::new(Self {
                id,
                script: Mutex::new(script.into()),
                calls: AtomicU32::new(0),
            })
        }

        fn calls(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl MarketDataProvider for ScriptedProvider {
        fn id(&self) -> &'static str {
            self.id
        }

        fn capabilities(&self) -> ProviderCapabilities {
            ProviderCapabilities {
                data_kinds: &[DataKind::Prices],
            }
        }

        async fn get_prices(&self, _ids: &[String]) -> Result<PriceMap, MarketDataError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.script
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok(PriceMap::new()))
        }
    }

    fn dynp(p: &Arc<ScriptedProvider>) -> Arc<dyn MarketDataProvider> {
        p.clone()
    }

    fn prices(pairs: &[(&str, i64)]) -> PriceMap {
        pairs
            .iter()
            .map(|(id, p)| (id.to_string(), Decimal::from(*p)))
            .collect()
    }

    fn upstream(provider: &str) -> MarketDataError {
        MarketDataError::Upstream {
            provider: provider.to_string(),
            status: 503,
        }
    }

    fn chain(
        providers: Vec<Arc<dyn MarketDataProvider>>,
        clock: Arc<ManualClock>,
        limit: RateLimit,
    ) -> ProviderChain {
        let gate = Arc::new(RateGate::with_default_limit(limit, clock.clone()));
        ProviderChain::new(DataKind::Prices, providers, gate, clock)
    }

    async fn fetch(chain: &ProviderChain) -> (Result<PriceMap, MarketDataError>, FetchDiagnostics) {
        let ids = vec!["bitcoin".to_string()];
        chain
            .fetch_with_fallback(|p| {
                let ids = ids.clone();
                async move { p.get_prices(&ids).await }
            })
            .await
    }

    #[tokio::test]
    async fn test_first_provider_success_short_circuits() {
        let clock = Arc::new(ManualClock::new());
        let a = ScriptedProvider::new("A", vec![Ok(prices(&[("bitcoin", 100)]))]);
        let b = ScriptedProvider::new("B", vec![Ok(prices(&[("bitcoin", 200)]))]);
        let chain = chain(vec![dynp(&a), dynp(&b)], clock, RateLimit::default());

        let (result, diag) = fetch(&chain).await;

        assert_eq!(result.unwrap()["bitcoin"], Decimal::from(100));
        assert_eq!(a.calls(), 1);
        assert_eq!(b.calls(), 0);
        assert_eq!(diag.succeeded_with().map(|p| p.as_ref()), Some("A"));
    }

    #[tokio::test]
    async fn test_transient_errors_retry_with_linear_backoff() {
        let clock = Arc::new(ManualClock::new());
        let a = ScriptedProvider::new(
            "A",
            vec![
                Err(upstream("A")),
                Err(upstream("A")),
                Ok(prices(&[("bitcoin", 100)])),
            ],
        );
        let chain = chain(vec![dynp(&a)], clock.clone(), RateLimit::default());

        let (result, diag) = fetch(&chain).await;

        assert!(result.is_ok());
        assert_eq!(a.calls(), 3);
        assert_eq!(diag.total_calls(), 3);
        // 700ms before the first retry, 1400ms before the second
        assert_eq!(clock.elapsed(), Duration::from_millis(2100));
    }

    #[tokio::test]
    async fn test_retries_are_bounded_then_next_provider() {
        let clock = Arc::new(ManualClock::new());
        let a = ScriptedProvider::new(
            "A",
            vec![Err(upstream("A")), Err(upstream("A")), Err(upstream("A"))],
        );
        let b = ScriptedProvider::new("B", vec![Ok(prices(&[("bitcoin", 200)]))]);
        let chain = chain(vec![dynp(&a), dynp(&b)], clock, RateLimit::default());

        let (result, diag) = fetch(&chain).await;

        assert_eq!(result.unwrap()["bitcoin"], Decimal::from(200));
        assert_eq!(a.calls(), 3);
        assert_eq!(b.calls(), 1);
        assert_eq!(diag.errors().len(), 1);
    }

    #[tokio::test]
    async fn test_throttled_provider_enters_backoff_and_is_skipped() {
        let clock = Arc::new(ManualClock::new());
        let a = ScriptedProvider::new(
            "A",
            vec![Err(MarketDataError::RateLimited {
                provider: "A".to_string(),
            })],
        );
        let b = ScriptedProvider::new(
            "B",
            vec![
                Ok(prices(&[("bitcoin", 200)])),
                Ok(prices(&[("bitcoin", 201)])),
            ],
        );
        let chain = chain(vec![dynp(&a), dynp(&b)], clock, RateLimit::default());

        let (first, _) = fetch(&chain).await;
        assert_eq!(first.unwrap()["bitcoin"], Decimal::from(200));
        // Throttling is not retried
        assert_eq!(a.calls(), 1);

        let (second, diag) = fetch(&chain).await;
        assert_eq!(second.unwrap()["bitcoin"], Decimal::from(201));
        assert_eq!(a.calls(), 1);
        assert_eq!(
            diag.skip_reasons(),
            vec![(&ProviderId::Borrowed("A"), &SkipReason::ThrottleBackoff)]
        );
    }

    #[tokio::test]
    async fn test_empty_result_falls_through_without_retry() {
        let clock = Arc::new(ManualClock::new());
        let a = ScriptedProvider::new("A", vec![Ok(PriceMap::new())]);
        let b = ScriptedProvider::new("B", vec![Ok(prices(&[("bitcoin", 5)]))]);
        let chain = chain(vec![dynp(&a), dynp(&b)], clock.clone(), RateLimit::default());

        let (result, _) = fetch(&chain).await;

        assert!(result.is_ok());
        assert_eq!(a.calls(), 1);
        assert_eq!(clock.elapsed(), Duration::ZERO);
    }

    #[tokio::test]
    async fn test_full_window_skips_provider_without_calling() {
        let clock = Arc::new(ManualClock::new());
        let a = ScriptedProvider::new(
            "A",
            vec![Ok(prices(&[("bitcoin", 1)])), Ok(prices(&[("bitcoin", 2)]))],
        );
        let limit = RateLimit::new(1, Duration::from_secs(60), Duration::from_secs(180));
        let chain = chain(vec![dynp(&a)], clock, limit);

        let (first, _) = fetch(&chain).await;
        assert!(first.is_ok());

        let (second, diag) = fetch(&chain).await;
        assert!(matches!(
            second,
            Err(MarketDataError::AllProvidersFailed { .. })
        ));
        assert_eq!(a.calls(), 1);
        assert_eq!(diag.skip_reasons()[0].1, &SkipReason::RateWindowFull);
    }

    #[tokio::test]
    async fn test_retries_consume_gate_budget() {
        let clock = Arc::new(ManualClock::new());
        let a = ScriptedProvider::new(
            "A",
            vec![Err(upstream("A")), Err(upstream("A")), Err(upstream("A"))],
        );
        let limit = RateLimit::new(2, Duration::from_secs(60), Duration::from_secs(180));
        let chain = chain(vec![dynp(&a)], clock, limit);

        let (result, _) = fetch(&chain).await;

        assert!(result.is_err());
        // Third attempt was refused admission
        assert_eq!(a.calls(), 2);
    }

    #[tokio::test]
    async fn test_non_retryable_error_stops_chain() {
        let clock = Arc::new(ManualClock::new());
        let a = ScriptedProvider::new(
            "A",
            vec![Err(MarketDataError::InvalidRequest("bad ids".to_string()))],
        );
        let b = ScriptedProvider::new("B", vec![Ok(prices(&[("bitcoin", 2)]))]);
        let chain = chain(vec![dynp(&a), dynp(&b)], clock, RateLimit::default());

        let (result, _) = fetch(&chain).await;

        assert!(matches!(result, Err(MarketDataError::InvalidRequest(_))));
        assert_eq!(b.calls(), 0);
    }

    #[tokio::test]
    async fn test_all_failed_summary_names_every_provider() {
        let clock = Arc::new(ManualClock::new());
        let a = ScriptedProvider::new(
            "A",
            vec![Err(MarketDataError::ProviderError {
                provider: "A".to_string(),
                message: "unknown".to_string(),
            })],
        );
        let b = ScriptedProvider::new("B", vec![Ok(PriceMap::new())]);
        let chain = chain(vec![dynp(&a), dynp(&b)], clock, RateLimit::default());

        let (result, _) = fetch(&chain).await;

        match result {
            Err(MarketDataError::AllProvidersFailed { summary }) => {
                assert!(summary.starts_with("A: ERROR"));
                assert!(summary.contains("B: ERROR (empty result)"));
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_unsupported_providers_are_left_out() {
        struct MarketsOnly;

        #[async_trait]
        impl MarketDataProvider for MarketsOnly {
            fn id(&self) -> &'static str {
                "MARKETS_ONLY"
            }

            fn capabilities(&self) -> ProviderCapabilities {
                ProviderCapabilities {
                    data_kinds: &[DataKind::Markets],
                }
            }

            async fn get_markets(
                &self,
                _query: &MarketsQuery,
            ) -> Result<Vec<NormalizedRecord>, MarketDataError> {
                Ok(Vec::new())
            }
        }

        let clock = Arc::new(ManualClock::new());
        let a = ScriptedProvider::new("A", vec![]);
        let chain = chain(
            vec![Arc::new(MarketsOnly), dynp(&a)],
            clock,
            RateLimit::default(),
        );

        assert_eq!(chain.provider_ids(), vec!["A"]);
    }

    #[tokio::test]
    async fn test_ineligible_provider_is_skipped_before_the_gate() {
        let clock = Arc::new(ManualClock::new());
        let a = ScriptedProvider::new("A", vec![Ok(prices(&[("bitcoin", 1)]))]);
        let b = ScriptedProvider::new("B", vec![Ok(prices(&[("bitcoin", 2)]))]);
        let limit = RateLimit::new(3, Duration::from_secs(60), Duration::from_secs(180));
        let chain = chain(vec![dynp(&a), dynp(&b)], clock, limit);
        let ids = vec!["bitcoin".to_string()];

        let (result, diag) = chain
            .fetch_eligible(
                |p| p.id() != "A",
                |p| {
                    let ids = ids.clone();
                    async move { p.get_prices(&ids).await }
                },
            )
            .await;

        assert_eq!(result.unwrap()["bitcoin"], Decimal::from(2));
        assert_eq!(a.calls(), 0);
        assert_eq!(diag.skip_reasons()[0].1, &SkipReason::Unsupported);
        assert_eq!(chain.gate().remaining_calls(&ProviderId::Borrowed("A")), 3);
        assert_eq!(chain.gate().remaining_calls(&ProviderId::Borrowed("B")), 2);
    }

    #[test]
    fn test_retry_policy_delay() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_for(1), Duration::from_millis(700));
        assert_eq!(policy.delay_for(2), Duration::from_millis(1400));
    }
}
