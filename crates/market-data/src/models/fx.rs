use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::errors::MarketDataError;

/// A fiat currency pair such as `USD/BRL`.
///
/// Codes are stored uppercased. Parses both `USD/BRL` and `USDBRL`.
#[derive(Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CurrencyPair {
    base: String,
    quote: String,
}

impl CurrencyPair {
    /// Build a pair from two ISO 4217 codes.
    pub fn new(base: &str, quote: &str) -> Result<Self, MarketDataError> {
        let base = base.trim().to_uppercase();
        let quote = quote.trim().to_uppercase();
        for code in [&base, &quote] {
            if code.len() != 3 || !code.chars().all(|c| c.is_ascii_alphabetic()) {
                return Err(MarketDataError::InvalidRequest(format!(
                    "Invalid currency code: '{}'",
                    code
                )));
            }
        }
        Ok(Self { base, quote })
    }

    /// The pair the original application quotes everywhere.
    pub fn usd_brl() -> Self {
        Self {
            base: "USD".to_string(),
            quote: "BRL".to_string(),
        }
    }

    pub fn base(&self) -> &str {
        &self.base
    }

    pub fn quote(&self) -> &str {
        &self.quote
    }

    /// True when base and quote are the same currency.
    pub fn is_identity(&self) -> bool {
        self.base == self.quote
    }
}

impl fmt::Display for CurrencyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.base, self.quote)
    }
}

impl FromStr for CurrencyPair {
    type Err = MarketDataError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if let Some((base, quote)) = s.split_once('/') {
            return Self::new(base, quote);
        }
        if s.len() == 6 && s.is_ascii() {
            return Self::new(&s[..3], &s[3..]);
        }
        Err(MarketDataError::InvalidRequest(format!(
            "Invalid currency pair: '{}'",
            s
        )))
    }
}

impl TryFrom<String> for CurrencyPair {
    type Error = MarketDataError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<CurrencyPair> for String {
    fn from(pair: CurrencyPair) -> Self {
        pair.to_string()
    }
}

/// A fetched exchange rate.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FxRate {
    pub pair: CurrencyPair,
    pub rate: Decimal,
    pub fetched_at: DateTime<Utc>,
}

impl FxRate {
    pub fn new(pair: CurrencyPair, rate: Decimal) -> Self {
        Self {
            pair,
            rate,
            fetched_at: Utc::now(),
        }
    }
}
