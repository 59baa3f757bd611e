use std::collections::HashMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// USD price per coin id.
pub type PriceMap = HashMap<String, Decimal>;

/// Canonical market record, independent of the provider that produced it.
///
/// Adapters map their raw payloads into this shape; nothing outside the
/// provider module ever sees a provider-specific response.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizedRecord {
    /// Provider-agnostic coin id (e.g. "bitcoin")
    pub id: String,

    /// Display name (e.g. "Bitcoin")
    pub name: String,

    /// Ticker symbol, uppercased (e.g. "BTC")
    pub symbol: String,

    /// Logo URL when the provider has one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,

    /// Current price in USD
    pub price_usd: Decimal,

    /// Price change over the last 24h, in percent
    #[serde(skip_serializing_if = "Option::is_none")]
    pub change_percent_24h: Option<Decimal>,
}

impl NormalizedRecord {
    /// Create a record with the required fields only.
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        symbol: impl Into<String>,
        price_usd: Decimal,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            symbol: symbol.into().to_uppercase(),
            image_url: None,
            price_usd,
            change_percent_24h: None,
        }
    }

    pub fn with_image_url(mut self, image_url: impl Into<String>) -> Self {
        self.image_url = Some(image_url.into());
        self
    }

    pub fn with_change_percent_24h(mut self, change: Decimal) -> Self {
        self.change_percent_24h = Some(change);
        self
    }
}
