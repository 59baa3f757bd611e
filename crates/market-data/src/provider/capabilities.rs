//! Provider capabilities and rate limiting configuration.
//!
//! This module defines structures for describing what a market data provider
//! can do and how its upstream budget should be gated.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::models::DataKind;

/// Default number of calls admitted per window.
pub const DEFAULT_MAX_CALLS_PER_WINDOW: u32 = 40;

/// Default sliding window length.
pub const DEFAULT_WINDOW: Duration = Duration::from_secs(60);

/// Default backoff after the upstream signals throttling.
pub const DEFAULT_THROTTLE_BACKOFF: Duration = Duration::from_secs(180);

/// Describes the capabilities of a market data provider.
///
/// Used to decide which provider chains a provider may join.
#[derive(Clone, Debug)]
pub struct ProviderCapabilities {
    /// Data kinds this provider can serve.
    pub data_kinds: &'static [DataKind],
}

impl ProviderCapabilities {
    pub fn supports(&self, kind: DataKind) -> bool {
        self.data_kinds.contains(&kind)
    }
}

/// Rate limiting configuration for a provider.
///
/// A sliding window of at most `max_calls_per_window` calls, plus a hard
/// backoff of `throttle_backoff` once the upstream answers with a throttling
/// response.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RateLimit {
    /// Maximum calls admitted inside one window.
    pub max_calls_per_window: u32,

    /// Length of the sliding window.
    pub window: Duration,

    /// How long the provider is rejected outright after throttling us.
    pub throttle_backoff: Duration,
}

impl RateLimit {
    pub fn new(max_calls_per_window: u32, window: Duration, throttle_backoff: Duration) -> Self {
        Self {
            max_calls_per_window,
            window,
            throttle_backoff,
        }
    }
}

impl Default for RateLimit {
    fn default() -> Self {
        Self {
            max_calls_per_window: DEFAULT_MAX_CALLS_PER_WINDOW,
            window: DEFAULT_WINDOW,
            throttle_backoff: DEFAULT_THROTTLE_BACKOFF,
        }
    }
}
