use serde::Serialize;

use crate::models::DataKind;
use crate::registry::GateSnapshot;

/// Provider order of one chain.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainStatus {
    pub kind: DataKind,
    pub providers: Vec<&'static str>,
}

/// Entry counts of the three caches.
#[derive(Clone, Copy, Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheStatus {
    pub markets: usize,
    pub prices: usize,
    pub fx: usize,
}

/// Point-in-time view of the gateway, for diagnostics endpoints.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GatewayStatus {
    pub chains: Vec<ChainStatus>,
    /// Gate shared by the markets and prices chains.
    pub market_gate: Vec<GateSnapshot>,
    pub fx_gate: Vec<GateSnapshot>,
    pub cached: CacheStatus,
    /// Upstream calls currently shared by waiting callers.
    pub in_flight: usize,
}
