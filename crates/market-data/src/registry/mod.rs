//! Provider orchestration.
//!
//! This module decides which upstream provider is called and when:
//! - Per-provider call budgets and throttle backoff (rate gate)
//! - Ordered fallback with bounded retries (provider chain)
//! - Diagnostic tracking for debugging provider selection

mod chain;
mod rate_gate;
mod skip_reason;

pub use chain::{
    Payload, ProviderChain, RetryPolicy, DEFAULT_ATTEMPT_TIMEOUT, DEFAULT_BACKOFF_BASE,
    DEFAULT_MAX_RETRIES,
};
pub use rate_gate::{Admission, GateSnapshot, RateGate};
pub use skip_reason::{FetchDiagnostics, ProviderAttempt, SkipReason};
