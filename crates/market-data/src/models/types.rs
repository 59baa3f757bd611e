use std::borrow::Cow;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Provider identifier - mostly static constants
pub type ProviderId = Cow<'static, str>;

/// The kinds of data the gateway fetches from upstream providers.
///
/// Each kind has its own provider chain and cache.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataKind {
    /// Paged market listing (price, 24h change, image).
    Markets,
    /// Simple USD price lookup for a set of coin ids.
    Prices,
    /// Fiat exchange rate for a currency pair.
    FxRate,
}

impl DataKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Markets => "markets",
            Self::Prices => "prices",
            Self::FxRate => "fx_rate",
        }
    }
}

impl fmt::Display for DataKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
