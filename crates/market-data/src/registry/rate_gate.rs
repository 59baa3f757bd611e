//! Sliding-window rate gate for market data providers.
//!
//! Each provider gets its own window of recent call timestamps and an optional
//! hard backoff deadline set when the upstream throttles us. The gate never
//! waits: callers get an immediate verdict and decide whether to fail over.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use log::{debug, info, warn};
use serde::Serialize;

use crate::clock::Clock;
use crate::models::ProviderId;
use crate::provider::RateLimit;

/// Verdict for a call attempt.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Admission {
    /// The call may proceed; it has been counted against the window.
    Admitted,
    /// The window already holds the maximum number of calls.
    RejectedWindow,
    /// The provider throttled us recently and is still in backoff.
    RejectedBackoff,
}

impl Admission {
    pub fn is_admitted(&self) -> bool {
        matches!(self, Self::Admitted)
    }
}

/// Per-provider gate state.
#[derive(Debug, Default)]
struct GateState {
    /// Admitted call times, oldest first. All are within the trailing window
    /// after every check.
    recent_calls: VecDeque<Instant>,
    /// Calls are rejected until this instant.
    backoff_until: Option<Instant>,
}

impl GateState {
    fn prune(&mut self, now: Instant, window: Duration) {
        while let Some(oldest) = self.recent_calls.front() {
            if now.saturating_duration_since(*oldest) >= window {
                self.recent_calls.pop_front();
            } else {
                break;
            }
        }
    }

    fn backoff_remaining(&mut self, now: Instant) -> Option<Duration> {
        match self.backoff_until {
            Some(until) if now < until => Some(until - now),
            Some(_) => {
                self.backoff_until = None;
                None
            }
            None => None,
        }
    }
}

/// Point-in-time view of a provider's gate, for status reporting.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GateSnapshot {
    pub provider: String,
    pub calls_in_window: u32,
    pub max_calls_per_window: u32,
    pub window_secs: u64,
    pub backoff_remaining_secs: Option<u64>,
}

/// Sliding-window rate gate for multiple providers.
///
/// Thread-safe; all state for all providers sits behind one mutex so that two
/// callers can never both be admitted for the last free slot. Provider state
/// is created on demand with the default [`RateLimit`] unless configured.
pub struct RateGate {
    /// Per-provider window and backoff state.
    states: Mutex<HashMap<String, GateState>>,
    /// Per-provider limits.
    limits: Mutex<HashMap<String, RateLimit>>,
    /// Limit used for providers that were never configured.
    default_limit: RateLimit,
    clock: Arc<dyn Clock>,
}

impl RateGate {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self::with_default_limit(RateLimit::default(), clock)
    }

    pub fn with_default_limit(default_limit: RateLimit, clock: Arc<dyn Clock>) -> Self {
        Self {
            states: Mutex::new(HashMap::new()),
            limits: Mutex::new(HashMap::new()),
            default_limit,
            clock,
        }
    }

    /// Lock the state mutex, recovering from poison if necessary.
    ///
    /// The worst case after recovery is a slightly inaccurate window, which is
    /// better than panicking every caller.
    fn lock_states(&self) -> MutexGuard<'_, HashMap<String, GateState>> {
        self.states.lock().unwrap_or_else(|poisoned| {
            warn!("Rate gate state mutex was poisoned, recovering");
            poisoned.into_inner()
        })
    }

    fn lock_limits(&self) -> MutexGuard<'_, HashMap<String, RateLimit>> {
        self.limits.lock().unwrap_or_else(|poisoned| {
            warn!("Rate gate limits mutex was poisoned, recovering");
            poisoned.into_inner()
        })
    }

    /// Configure limits for a specific provider. Existing window and backoff
    /// state is kept.
    pub fn configure(&self, provider: &ProviderId, limit: RateLimit) {
        debug!(
            "Rate gate: '{}' limited to {} calls per {:?}, backoff {:?}",
            provider, limit.max_calls_per_window, limit.window, limit.throttle_backoff
        );
        self.lock_limits().insert(provider.to_string(), limit);
    }

    /// Effective limit for a provider.
    pub fn limit(&self, provider: &ProviderId) -> RateLimit {
        self.lock_limits()
            .get(provider.as_ref())
            .copied()
            .unwrap_or(self.default_limit)
    }

    /// Try to admit one call to `provider`.
    ///
    /// Admission records the call in the window; rejections leave the state
    /// untouched apart from pruning.
    pub fn try_acquire(&self, provider: &ProviderId) -> Admission {
        let limit = self.limit(provider);
        let now = self.clock.now();
        let mut states = self.lock_states();
        let state = states.entry(provider.to_string()).or_default();

        if let Some(remaining) = state.backoff_remaining(now) {
            debug!(
                "Rate gate: '{}' in backoff for another {:?}",
                provider, remaining
            );
            return Admission::RejectedBackoff;
        }

        state.prune(now, limit.window);

        if state.recent_calls.len() >= limit.max_calls_per_window as usize {
            debug!(
                "Rate gate: '{}' window full ({}/{})",
                provider,
                state.recent_calls.len(),
                limit.max_calls_per_window
            );
            return Admission::RejectedWindow;
        }

        state.recent_calls.push_back(now);
        Admission::Admitted
    }

    /// Record that `provider` throttled us; reject it for the backoff duration.
    pub fn report_throttled(&self, provider: &ProviderId) {
        let limit = self.limit(provider);
        let until = self.clock.now() + limit.throttle_backoff;
        let mut states = self.lock_states();
        let state = states.entry(provider.to_string()).or_default();
        state.backoff_until = Some(until);
        info!(
            "Rate gate: '{}' throttled upstream, backing off for {:?}",
            provider, limit.throttle_backoff
        );
    }

    /// Remaining backoff for a provider, if any.
    pub fn backoff_remaining(&self, provider: &ProviderId) -> Option<Duration> {
        let now = self.clock.now();
        self.lock_states()
            .get_mut(provider.as_ref())
            .and_then(|state| state.backoff_remaining(now))
    }

    /// Number of calls still admissible in the current window.
    pub fn remaining_calls(&self, provider: &ProviderId) -> u32 {
        let limit = self.limit(provider);
        let now = self.clock.now();
        let mut states = self.lock_states();
        match states.get_mut(provider.as_ref()) {
            Some(state) => {
                state.prune(now, limit.window);
                limit
                    .max_calls_per_window
                    .saturating_sub(state.recent_calls.len() as u32)
            }
            None => limit.max_calls_per_window,
        }
    }

    /// Clear window and backoff state for a provider.
    pub fn reset(&self, provider: &ProviderId) {
        self.lock_states().remove(provider.as_ref());
    }

    /// Snapshot of every provider the gate has configuration or state for.
    pub fn snapshot(&self) -> Vec<GateSnapshot> {
        let limits = self.lock_limits().clone();
        let now = self.clock.now();
        let mut states = self.lock_states();

        let mut providers: Vec<String> = limits.keys().cloned().collect();
        for provider in states.keys() {
            if !limits.contains_key(provider) {
                providers.push(provider.clone());
            }
        }
        providers.sort();

        providers
            .into_iter()
            .map(|provider| {
                let limit = limits.get(&provider).copied().unwrap_or(self.default_limit);
                let (calls, backoff) = match states.get_mut(&provider) {
                    Some(state) => {
                        state.prune(now, limit.window);
                        (
                            state.recent_calls.len() as u32,
                            state.backoff_remaining(now),
                        )
                    }
                    None => (0, None),
                };
                GateSnapshot {
                    provider,
                    calls_in_window: calls,
                    max_calls_per_window: limit.max_calls_per_window,
                    window_secs: limit.window.as_secs(),
                    backoff_remaining_secs: backoff.map(|d| d.as_secs()),
                }
            })
            .collect()
    }
}
