use std::fmt;
use std::sync::Arc;

use super::fx::CurrencyPair;
use super::query::MarketsQuery;

/// Deterministic cache key derived from a logical request.
///
/// Logically equivalent requests map to the same key: price lookups are keyed
/// by the sorted, de-duplicated id set, so `["eth", "btc", "eth"]` and
/// `["btc", "eth"]` share one cache entry and one in-flight call.
#[derive(Clone, Debug, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub struct CacheKey(Arc<str>);

impl CacheKey {
    pub fn markets(query: &MarketsQuery) -> Self {
        Self::from(format!(
            "markets|{}|{}|{}",
            query.page, query.per_page, query.order
        ))
    }

    /// Key for a price lookup. `ids` are normalized first, so any order or
    /// duplication of the same set yields the same key.
    pub fn prices<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self::from(format!("prices|{}", normalize_ids(ids).join(",")))
    }

    pub fn fx(pair: &CurrencyPair) -> Self {
        Self::from(format!("fx|{}", pair))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for CacheKey {
    fn from(value: String) -> Self {
        Self(Arc::from(value))
    }
}

impl From<&str> for CacheKey {
    fn from(value: &str) -> Self {
        Self(Arc::from(value))
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Trim, lowercase, drop blanks, sort and de-duplicate a set of coin ids.
pub fn normalize_ids<I, S>(ids: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut out: Vec<String> = ids
        .into_iter()
        .map(|id| id.as_ref().trim().to_lowercase())
        .filter(|id| !id.is_empty())
        .collect();
    out.sort_unstable();
    out.dedup();
    out
}
