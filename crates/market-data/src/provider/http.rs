//! Shared JSON-over-HTTP plumbing for the provider adapters.
//!
//! Every adapter issues plain GET requests and expects JSON back. This module
//! maps transport failures and HTTP statuses onto [`MarketDataError`] so the
//! chain can classify them uniformly.

use std::time::Duration;

use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::errors::MarketDataError;

/// Upper bound on a whole request at the transport level.
///
/// The chain applies its own (shorter) per-attempt timeout on top of this.
const CLIENT_TIMEOUT: Duration = Duration::from_secs(30);

const BODY_EXCERPT_LEN: usize = 200;

/// Thin wrapper around `reqwest::Client` bound to one provider id.
#[derive(Clone, Debug)]
pub(crate) struct JsonClient {
    client: Client,
    provider: &'static str,
}

impl JsonClient {
    pub(crate) fn new(provider: &'static str) -> Self {
        let client = Client::builder()
            .timeout(CLIENT_TIMEOUT)
            .user_agent(concat!("cryptofolio/", env!("CARGO_PKG_VERSION")))
            .build()
            .unwrap_or_else(|_| Client::new());

        Self { client, provider }
    }

    /// GET `url` and decode the JSON body into `T`.
    pub(crate) async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, String)],
        headers: &[(&'static str, String)],
    ) -> Result<T, MarketDataError> {
        let mut request = self.client.get(url).query(query);
        for (name, value) in headers {
            request = request.header(*name, value);
        }

        debug!("{} request: {} with {} params", self.provider, url, query.len());

        let response = request.send().await.map_err(|e| self.transport_error(e))?;
        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_status(self.provider, status, &body));
        }

        let is_json = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|ct| ct.contains("json"))
            // Some upstreams omit the header; let the parser decide
            .unwrap_or(true);

        let body = response
            .text()
            .await
            .map_err(|e| self.transport_error(e))?;

        if !is_json {
            return Err(MarketDataError::MalformedResponse {
                provider: self.provider.to_string(),
                message: format!("expected JSON, got: {}", excerpt(&body)),
            });
        }

        serde_json::from_str(&body).map_err(|e| MarketDataError::MalformedResponse {
            provider: self.provider.to_string(),
            message: format!("{}: {}", e, excerpt(&body)),
        })
    }

    fn transport_error(&self, e: reqwest::Error) -> MarketDataError {
        if e.is_timeout() {
            MarketDataError::Timeout {
                provider: self.provider.to_string(),
            }
        } else if e.is_decode() {
            MarketDataError::MalformedResponse {
                provider: self.provider.to_string(),
                message: e.to_string(),
            }
        } else {
            MarketDataError::Network {
                provider: self.provider.to_string(),
                message: e.to_string(),
            }
        }
    }
}

/// Map a non-success HTTP status onto the error taxonomy.
///
/// 429 and 403 (quota exhausted) are throttling, 5xx is transient, any other
/// 4xx means this provider can't serve the request.
pub(crate) fn classify_status(provider: &str, status: StatusCode, body: &str) -> MarketDataError {
    match status {
        StatusCode::TOO_MANY_REQUESTS | StatusCode::FORBIDDEN => MarketDataError::RateLimited {
            provider: provider.to_string(),
        },
        s if s.is_server_error() => MarketDataError::Upstream {
            provider: provider.to_string(),
            status: s.as_u16(),
        },
        s => MarketDataError::ProviderError {
            provider: provider.to_string(),
            message: format!("HTTP {} - {}", s, excerpt(body)),
        },
    }
}

fn excerpt(body: &str) -> &str {
    match body.char_indices().nth(BODY_EXCERPT_LEN) {
        Some((idx, _)) => &body[..idx],
        None => body,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::RetryClass;

    #[test]
    fn test_classify_throttling() {
        for status in [StatusCode::TOO_MANY_REQUESTS, StatusCode::FORBIDDEN] {
            let err = classify_status("COINGECKO", status, "");
            assert_eq!(err.retry_class(), RetryClass::Throttled);
        }
    }

    #[test]
    fn test_classify_server_error_is_transient() {
        let err = classify_status("COINCAP", StatusCode::BAD_GATEWAY, "oops");
        assert_eq!(
            err,
            MarketDataError::Upstream {
                provider: "COINCAP".to_string(),
                status: 502
            }
        );
        assert_eq!(err.retry_class(), RetryClass::WithBackoff);
    }

    #[test]
    fn test_classify_client_error_moves_on() {
        let err = classify_status("FRANKFURTER", StatusCode::NOT_FOUND, "not found");
        assert_eq!(err.retry_class(), RetryClass::NextProvider);
    }

    #[test]
    fn test_excerpt_truncates_on_char_boundary() {
        let long = "é".repeat(300);
        assert_eq!(excerpt(&long).chars().count(), BODY_EXCERPT_LEN);
        assert_eq!(excerpt("short"), "short");
    }
}
