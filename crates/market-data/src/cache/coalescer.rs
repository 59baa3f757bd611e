//! Per-key request coalescing ("single flight").
//!
//! The first caller for a key spawns the upstream work on the runtime and
//! publishes a shared handle to it. Later callers for the same key await the
//! same handle instead of starting their own call. The work runs on its own
//! task, so a caller that stops waiting never cancels it for the others.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};

use futures::future::{BoxFuture, FutureExt, Shared};
use tracing::{debug, warn};

use crate::errors::MarketDataError;
use crate::models::CacheKey;

type Flight<V> = Shared<BoxFuture<'static, Result<V, MarketDataError>>>;
type FlightMap<V> = Arc<Mutex<HashMap<CacheKey, Flight<V>>>>;

/// Registry of in-flight upstream calls, one per cache key.
pub struct RequestCoalescer<V> {
    flights: FlightMap<V>,
}

impl<V> RequestCoalescer<V>
where
    V: Clone + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self {
            flights: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Run `work` for `key`, or join the call already running for it.
    ///
    /// `work` is invoked at most once per flight. Every caller attached to a
    /// flight receives a clone of the same outcome, success or failure. The
    /// handle is removed from the registry before the outcome is published.
    ///
    /// Must be called from within a Tokio runtime.
    pub async fn run_exclusive<F, Fut>(&self, key: CacheKey, work: F) -> Result<V, MarketDataError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, MarketDataError>> + Send + 'static,
    {
        let flight = {
            let mut flights = lock_flights(&self.flights);

            match flights.get(&key) {
                Some(flight) => {
                    debug!(key = %key, "joining in-flight request");
                    flight.clone()
                }
                None => {
                    let flight = spawn_flight(Arc::clone(&self.flights), key.clone(), work());
                    flights.insert(key, flight.clone());
                    flight
                }
            }
        };

        flight.await
    }

    /// Number of calls currently in flight.
    pub fn in_flight(&self) -> usize {
        lock_flights(&self.flights).len()
    }

    /// Whether a call for `key` is currently in flight.
    pub fn is_in_flight(&self, key: &CacheKey) -> bool {
        lock_flights(&self.flights).contains_key(key)
    }
}

impl<V> Default for RequestCoalescer<V>
where
    V: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

/// Lock the registry, recovering from poison if necessary.
///
/// A poisoned registry at worst holds a handle whose task already finished;
/// joining it still yields that task's outcome.
fn lock_flights<V>(flights: &FlightMap<V>) -> MutexGuard<'_, HashMap<CacheKey, Flight<V>>> {
    flights.lock().unwrap_or_else(|poisoned| {
        warn!("Request coalescer mutex was poisoned, recovering");
        poisoned.into_inner()
    })
}

/// Removes the flight's registry entry when the task finishes, including when
/// the work panics.
struct FlightGuard<V> {
    flights: FlightMap<V>,
    key: CacheKey,
}

impl<V> Drop for FlightGuard<V> {
    fn drop(&mut self) {
        let mut flights = self.flights.lock().unwrap_or_else(|p| p.into_inner());
        flights.remove(&self.key);
    }
}

fn spawn_flight<V, Fut>(flights: FlightMap<V>, key: CacheKey, work: Fut) -> Flight<V>
where
    V: Clone + Send + Sync + 'static,
    Fut: Future<Output = Result<V, MarketDataError>> + Send + 'static,
{
    let task_key = key.clone();
    let handle = tokio::spawn(async move {
        let guard = FlightGuard {
            flights,
            key: task_key,
        };
        let result = work.await;
        drop(guard);
        result
    });

    async move {
        match handle.await {
            Ok(result) => result,
            Err(join_error) => {
                warn!(key = %key, "in-flight request task failed: {}", join_error);
                Err(MarketDataError::Internal(format!(
                    "upstream task for '{}' failed: {}",
                    key, join_error
                )))
            }
        }
    }
    .boxed()
    .shared()
}
