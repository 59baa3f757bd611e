//! Scriptable in-memory provider shared by the integration tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use cryptofolio_market_data::{
    CurrencyPair, DataKind, GatewayConfig, MarketDataError, MarketDataProvider, MarketsQuery,
    NormalizedRecord, PriceMap, ProviderCapabilities,
};
use rust_decimal::Decimal;
use tokio::sync::watch;

/// What the mock answers with on its next call.
#[derive(Clone, Debug)]
pub enum Reply {
    Prices(PriceMap),
    Markets(Vec<NormalizedRecord>),
    Fx(Decimal),
    Fail(MarketDataError),
    /// Never completes.
    Hang,
}

pub struct MockProvider {
    id: &'static str,
    kinds: &'static [DataKind],
    reply: Mutex<Reply>,
    calls: AtomicUsize,
    hold: Mutex<Option<watch::Receiver<bool>>>,
}

impl MockProvider {
    pub fn new(id: &'static str, kinds: &'static [DataKind], reply: Reply) -> Arc<Self> {
        Arc::new(Self {
            id,
            kinds,
            reply: Mutex::new(reply),
            calls: AtomicUsize::new(0),
            hold: Mutex::new(None),
        })
    }

    pub fn market(id: &'static str, reply: Reply) -> Arc<Self> {
        Self::new(id, &[DataKind::Markets, DataKind::Prices], reply)
    }

    pub fn fx(id: &'static str, rate: Decimal) -> Arc<Self> {
        Self::new(id, &[DataKind::FxRate], Reply::Fx(rate))
    }

    pub fn set_reply(&self, reply: Reply) {
        *self.reply.lock().unwrap() = reply;
    }

    /// Block every call until the returned sender publishes `true`.
    pub fn hold(&self) -> watch::Sender<bool> {
        let (tx, rx) = watch::channel(false);
        *self.hold.lock().unwrap() = Some(rx);
        tx
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    async fn answer(&self) -> Reply {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let hold = self.hold.lock().unwrap().clone();
        if let Some(mut rx) = hold {
            let _ = rx.wait_for(|released| *released).await;
        }
        let reply = self.reply.lock().unwrap().clone();
        if let Reply::Hang = reply {
            std::future::pending::<()>().await;
        }
        reply
    }

    fn unexpected(&self, operation: &str) -> MarketDataError {
        MarketDataError::NotSupported {
            operation: operation.to_string(),
            provider: self.id.to_string(),
        }
    }
}

#[async_trait]
impl MarketDataProvider for MockProvider {
    fn id(&self) -> &'static str {
        self.id
    }

    fn capabilities(&self) -> ProviderCapabilities {
        ProviderCapabilities {
            data_kinds: self.kinds,
        }
    }

    async fn get_markets(
        &self,
        _query: &MarketsQuery,
    ) -> Result<Vec<NormalizedRecord>, MarketDataError> {
        match self.answer().await {
            Reply::Markets(records) => Ok(records),
            Reply::Fail(e) => Err(e),
            _ => Err(self.unexpected("markets")),
        }
    }

    async fn get_prices(&self, ids: &[String]) -> Result<PriceMap, MarketDataError> {
        match self.answer().await {
            Reply::Prices(prices) => Ok(prices
                .into_iter()
                .filter(|(id, _)| ids.contains(id))
                .collect()),
            Reply::Fail(e) => Err(e),
            _ => Err(self.unexpected("prices")),
        }
    }

    async fn get_fx_rate(&self, _pair: &CurrencyPair) -> Result<Decimal, MarketDataError> {
        match self.answer().await {
            Reply::Fx(rate) => Ok(rate),
            Reply::Fail(e) => Err(e),
            _ => Err(self.unexpected("fx_rate")),
        }
    }
}

pub fn prices(pairs: &[(&str, i64)]) -> PriceMap {
    pairs
        .iter()
        .map(|(id, price)| (id.to_string(), Decimal::from(*price)))
        .collect()
}

pub fn records(ids: &[&str]) -> Vec<NormalizedRecord> {
    ids.iter()
        .map(|id| NormalizedRecord::new(*id, *id, *id, Decimal::ONE))
        .collect()
}

/// Config routing every data kind to the given provider ids.
pub fn config(market: &[&str], fx: &[&str]) -> GatewayConfig {
    let market: Vec<String> = market.iter().map(|s| s.to_string()).collect();
    GatewayConfig {
        markets_providers: market.clone(),
        prices_providers: market,
        fx_providers: fx.iter().map(|s| s.to_string()).collect(),
        ..GatewayConfig::default()
    }
}

pub fn upstream_503(provider: &str) -> MarketDataError {
    MarketDataError::Upstream {
        provider: provider.to_string(),
        status: 503,
    }
}
