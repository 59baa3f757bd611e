//! Error types and retry classification for the market data crate.
//!
//! This module provides:
//! - [`MarketDataError`]: The main error enum for all market data operations
//! - [`RetryClass`]: Classification for determining retry behavior

mod retry;

pub use retry::RetryClass;

use thiserror::Error;

/// Errors that can occur during market data operations.
///
/// The enum is `Clone` because a single upstream failure is shared by every
/// caller coalesced onto the same in-flight request.
///
/// Each variant is classified into a [`RetryClass`] via the [`retry_class`](Self::retry_class)
/// method, which determines how the provider chain should handle the error.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MarketDataError {
    /// The provider rate limited the request (HTTP 429 or quota exceeded).
    #[error("Rate limited: {provider}")]
    RateLimited {
        /// The provider that rate limited the request
        provider: String,
    },

    /// The request to the provider timed out.
    #[error("Timeout: {provider}")]
    Timeout {
        /// The provider that timed out
        provider: String,
    },

    /// The provider answered with a server-side error (5xx).
    #[error("Upstream error: {provider} - HTTP {status}")]
    Upstream {
        /// The provider that failed
        provider: String,
        /// HTTP status code returned
        status: u16,
    },

    /// A connection-level error occurred while talking to a provider.
    #[error("Network error: {provider} - {message}")]
    Network {
        /// The provider being contacted
        provider: String,
        /// Transport error description
        message: String,
    },

    /// A provider-specific error occurred (client error, rejected request).
    #[error("Provider error: {provider} - {message}")]
    ProviderError {
        /// The provider that returned the error
        provider: String,
        /// The error message from the provider
        message: String,
    },

    /// The provider returned a payload that could not be normalized.
    #[error("Malformed response from {provider}: {message}")]
    MalformedResponse {
        /// The provider that returned the payload
        provider: String,
        /// What was wrong with it
        message: String,
    },

    /// The provider does not support this operation or query shape.
    #[error("Operation '{operation}' not supported by {provider}")]
    NotSupported {
        /// The operation that was requested
        operation: String,
        /// The provider that cannot serve it
        provider: String,
    },

    /// The request was rejected before reaching any provider.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// All providers were tried and none produced a usable result.
    #[error("All providers failed: {summary}")]
    AllProvidersFailed {
        /// Per-provider attempt summary
        summary: String,
    },

    /// The background task running an upstream call died unexpectedly.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl MarketDataError {
    /// Returns the retry classification for this error.
    ///
    /// # Examples
    ///
    /// ```
    /// use cryptofolio_market_data::errors::{MarketDataError, RetryClass};
    ///
    /// let error = MarketDataError::RateLimited { provider: "COINGECKO".to_string() };
    /// assert_eq!(error.retry_class(), RetryClass::Throttled);
    ///
    /// let error = MarketDataError::Timeout { provider: "COINGECKO".to_string() };
    /// assert_eq!(error.retry_class(), RetryClass::WithBackoff);
    /// ```
    pub fn retry_class(&self) -> RetryClass {
        match self {
            Self::RateLimited { .. } => RetryClass::Throttled,

            // Transient errors - retry with backoff
            Self::Timeout { .. } | Self::Upstream { .. } | Self::Network { .. } => {
                RetryClass::WithBackoff
            }

            // Provider can't answer this one - try next provider
            Self::ProviderError { .. }
            | Self::MalformedResponse { .. }
            | Self::NotSupported { .. } => RetryClass::NextProvider,

            Self::InvalidRequest(_) | Self::AllProvidersFailed { .. } | Self::Internal(_) => {
                RetryClass::Never
            }
        }
    }

    /// The provider this error is attributed to, if any.
    pub fn provider(&self) -> Option<&str> {
        match self {
            Self::RateLimited { provider }
            | Self::Timeout { provider }
            | Self::Upstream { provider, .. }
            | Self::Network { provider, .. }
            | Self::ProviderError { provider, .. }
            | Self::MalformedResponse { provider, .. }
            | Self::NotSupported { provider, .. } => Some(provider),
            Self::InvalidRequest(_) | Self::AllProvidersFailed { .. } | Self::Internal(_) => None,
        }
    }
}
