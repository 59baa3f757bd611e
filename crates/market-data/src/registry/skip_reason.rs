//! Attempt tracking for provider chain diagnostics.

use std::fmt;

use crate::models::ProviderId;

/// Why a provider was skipped without being called.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum SkipReason {
    /// The provider's call window is full.
    RateWindowFull,

    /// The provider throttled us recently and is still in backoff.
    ThrottleBackoff,

    /// The provider cannot serve this particular request.
    Unsupported,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RateWindowFull => write!(f, "rate window full"),
            Self::ThrottleBackoff => write!(f, "throttle backoff"),
            Self::Unsupported => write!(f, "unsupported request"),
        }
    }
}

/// Record of a single provider's part in a fetch.
#[derive(Clone, Debug)]
pub struct ProviderAttempt {
    pub provider_id: ProviderId,
    pub skipped: Option<SkipReason>,
    pub error: Option<String>,
    /// Upstream calls made to this provider (retries included).
    pub calls: u32,
    pub success: bool,
}

/// Detailed result of a fetch operation with per-provider diagnostics.
#[derive(Clone, Debug, Default)]
pub struct FetchDiagnostics {
    pub attempts: Vec<ProviderAttempt>,
}

impl FetchDiagnostics {
    pub fn new() -> Self {
        Self {
            attempts: Vec::new(),
        }
    }

    pub fn record_skip(&mut self, provider_id: ProviderId, reason: SkipReason) {
        self.attempts.push(ProviderAttempt {
            provider_id,
            skipped: Some(reason),
            error: None,
            calls: 0,
            success: false,
        });
    }

    pub fn record_error(&mut self, provider_id: ProviderId, calls: u32, error: String) {
        self.attempts.push(ProviderAttempt {
            provider_id,
            skipped: None,
            error: Some(error),
            calls,
            success: false,
        });
    }

    pub fn record_success(&mut self, provider_id: ProviderId, calls: u32) {
        self.attempts.push(ProviderAttempt {
            provider_id,
            skipped: None,
            error: None,
            calls,
            success: true,
        });
    }

    /// Summary for logging/debugging.
    pub fn summary(&self) -> String {
        if self.attempts.is_empty() {
            return "no providers".to_string();
        }
        self.attempts
            .iter()
            .map(|a| {
                if a.success {
                    format!("{}: SUCCESS", a.provider_id)
                } else if let Some(skip) = &a.skipped {
                    format!("{}: SKIPPED ({})", a.provider_id, skip)
                } else if let Some(err) = &a.error {
                    format!("{}: ERROR ({})", a.provider_id, err)
                } else {
                    format!("{}: UNKNOWN", a.provider_id)
                }
            })
            .collect::<Vec<_>>()
            .join(" -> ")
    }

    /// Check if any provider succeeded.
    pub fn has_success(&self) -> bool {
        self.attempts.iter().any(|a| a.success)
    }

    /// The provider that produced the result, if any.
    pub fn succeeded_with(&self) -> Option<&ProviderId> {
        self.attempts
            .iter()
            .find(|a| a.success)
            .map(|a| &a.provider_id)
    }

    /// Total upstream calls made across all providers.
    pub fn total_calls(&self) -> u32 {
        self.attempts.iter().map(|a| a.calls).sum()
    }

    /// Get all skip reasons.
    pub fn skip_reasons(&self) -> Vec<(&ProviderId, &SkipReason)> {
        self.attempts
            .iter()
            .filter_map(|a| a.skipped.as_ref().map(|s| (&a.provider_id, s)))
            .collect()
    }

    /// Get all errors.
    pub fn errors(&self) -> Vec<(&ProviderId, &str)> {
        self.attempts
            .iter()
            .filter_map(|a| a.error.as_ref().map(|e| (&a.provider_id, e.as_str())))
            .collect()
    }
}
