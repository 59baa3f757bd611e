/// Classification for retry policy.
///
/// Used by the provider chain to decide what to do after a provider call fails.
///
/// # Behavior Summary
///
/// | Class | Retry same provider? | Try next provider? | Start provider backoff? |
/// |-------|----------------------|--------------------|-------------------------|
/// | `Never` | No | No | No |
/// | `Throttled` | No | Yes | Yes |
/// | `WithBackoff` | Yes (bounded) | Yes, once retries run out | No |
/// | `NextProvider` | No | Yes | No |
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum RetryClass {
    /// Never retry - the request itself is invalid or the chain already gave up.
    Never,

    /// The upstream explicitly signaled rate limiting (HTTP 429 or quota exhaustion).
    ///
    /// The provider is put into backoff through the rate gate and is not called
    /// again until the backoff expires.
    Throttled,

    /// Transient failure (timeout, 5xx, connection error).
    ///
    /// Retried against the same provider a bounded number of times with a
    /// linearly growing delay, then the chain moves on.
    WithBackoff,

    /// This provider cannot answer (malformed payload, unsupported query,
    /// client error) but another provider might.
    NextProvider,
}
