use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::errors::MarketDataError;

/// Largest page size upstream listing endpoints accept.
pub const MAX_PAGE_SIZE: u32 = 250;

/// Sort order for paged market listings.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MarketOrder {
    MarketCapAsc,
    #[default]
    MarketCapDesc,
    VolumeAsc,
    VolumeDesc,
    IdAsc,
    IdDesc,
}

impl MarketOrder {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MarketCapAsc => "market_cap_asc",
            Self::MarketCapDesc => "market_cap_desc",
            Self::VolumeAsc => "volume_asc",
            Self::VolumeDesc => "volume_desc",
            Self::IdAsc => "id_asc",
            Self::IdDesc => "id_desc",
        }
    }
}

impl fmt::Display for MarketOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MarketOrder {
    type Err = MarketDataError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "market_cap_asc" => Ok(Self::MarketCapAsc),
            "market_cap_desc" => Ok(Self::MarketCapDesc),
            "volume_asc" => Ok(Self::VolumeAsc),
            "volume_desc" => Ok(Self::VolumeDesc),
            "id_asc" => Ok(Self::IdAsc),
            "id_desc" => Ok(Self::IdDesc),
            other => Err(MarketDataError::InvalidRequest(format!(
                "Unknown market order: '{}'",
                other
            ))),
        }
    }
}

/// One page of the market listing.
///
/// Page numbers start at 1. The constructor clamps out-of-range input instead
/// of failing, so callers can pass user input straight through.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketsQuery {
    pub page: u32,
    pub per_page: u32,
    pub order: MarketOrder,
}

impl MarketsQuery {
    pub fn new(page: u32, per_page: u32, order: MarketOrder) -> Self {
        Self {
            page: page.max(1),
            per_page: per_page.clamp(1, MAX_PAGE_SIZE),
            order,
        }
    }

    /// Zero-based index of the first record on this page.
    pub fn offset(&self) -> u64 {
        u64::from(self.page - 1) * u64::from(self.per_page)
    }
}

impl Default for MarketsQuery {
    fn default() -> Self {
        Self::new(1, 50, MarketOrder::default())
    }
}
