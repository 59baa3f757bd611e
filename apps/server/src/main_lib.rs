use std::sync::Arc;

use cryptofolio_market_data::MarketDataGateway;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

use crate::config::Config;

pub struct AppState {
    pub gateway: MarketDataGateway,
}

impl AppState {
    pub fn new(gateway: MarketDataGateway) -> Self {
        Self { gateway }
    }
}

pub fn init_tracing() {
    let log_format = std::env::var("CF_LOG_FORMAT").unwrap_or_else(|_| "text".to_string());
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);

    if log_format.eq_ignore_ascii_case("json") {
        registry
            .with(fmt::layer().json().with_current_span(false))
            .init();
    } else {
        registry
            .with(fmt::layer().with_target(true).with_line_number(true))
            .init();
    }
}

/// Wire the gateway with the built-in providers.
pub fn build_state(config: &Config) -> Arc<AppState> {
    let gateway = MarketDataGateway::from_config(config.gateway.clone());
    Arc::new(AppState::new(gateway))
}
