//! In-memory caching primitives.
//!
//! - [`TtlStore`]: expiring key/value store that can also serve stale entries
//! - [`RequestCoalescer`]: at most one in-flight upstream call per cache key
//!
//! Both are in-memory only and reset on application restart.

mod coalescer;
mod ttl_store;

pub use coalescer::RequestCoalescer;
pub use ttl_store::{CacheEntry, Lookup, TtlStore};
