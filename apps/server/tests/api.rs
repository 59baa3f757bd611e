use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
};
use cryptofolio_market_data::{
    CurrencyPair, DataKind, GatewayConfig, MarketDataError, MarketDataGateway,
    MarketDataProvider, MarketsQuery, NormalizedRecord, PriceMap, ProviderCapabilities,
};
use cryptofolio_server::{api::app_router, config::Config, AppState};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tower::ServiceExt;

/// Serves a fixed listing, fixed prices and a fixed FX rate.
struct StaticProvider;

#[async_trait]
impl MarketDataProvider for StaticProvider {
    fn id(&self) -> &'static str {
        "STATIC"
    }

    fn capabilities(&self) -> ProviderCapabilities {
        ProviderCapabilities {
            data_kinds: &[DataKind::Markets, DataKind::Prices, DataKind::FxRate],
        }
    }

    async fn get_markets(
        &self,
        query: &MarketsQuery,
    ) -> Result<Vec<NormalizedRecord>, MarketDataError> {
        let start = (query.page - 1) * query.per_page;
        Ok((start..(start + query.per_page).min(45))
            .map(|i| NormalizedRecord::new(format!("coin-{i}"), "Coin", "cn", Decimal::from(i)))
            .collect())
    }

    async fn get_prices(&self, ids: &[String]) -> Result<PriceMap, MarketDataError> {
        Ok(ids
            .iter()
            .filter(|id| id.as_str() == "bitcoin")
            .map(|id| (id.clone(), dec!(64000)))
            .collect())
    }

    async fn get_fx_rate(&self, _pair: &CurrencyPair) -> Result<Decimal, MarketDataError> {
        Ok(dec!(5.25))
    }
}

fn build_test_router() -> axum::Router {
    let ids = vec!["STATIC".to_string()];
    let gateway_config = GatewayConfig {
        markets_providers: ids.clone(),
        prices_providers: ids.clone(),
        fx_providers: ids,
        ..GatewayConfig::default()
    };
    let provider: Arc<dyn MarketDataProvider> = Arc::new(StaticProvider);
    let gateway = MarketDataGateway::new(gateway_config, vec![provider]);
    app_router(Arc::new(AppState::new(gateway)), &Config::default())
}

async fn get(app: &axum::Router, uri: &str) -> (StatusCode, serde_json::Value) {
    let response = app
        .clone()
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json = serde_json::from_slice(&body).unwrap_or(serde_json::Value::Null);
    (status, json)
}

#[tokio::test]
async fn healthz_answers_ok() {
    let app = build_test_router();
    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/v1/healthz")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
}

#[tokio::test]
async fn markets_page_honours_query() {
    let app = build_test_router();

    let (status, json) = get(
        &app,
        "/api/v1/market-data/markets?page=2&perPage=10&order=volume_desc",
    )
    .await;

    assert_eq!(status, 200);
    let items = json["items"].as_array().unwrap();
    assert_eq!(items.len(), 10);
    assert_eq!(items[0]["id"], "coin-10");
    assert_eq!(items[0]["symbol"], "CN");
    assert!(json["ts"].is_i64());
}

#[tokio::test]
async fn unknown_order_is_rejected() {
    let app = build_test_router();

    let (status, json) = get(&app, "/api/v1/market-data/markets?order=hype_desc").await;

    assert_eq!(status, 400);
    assert_eq!(json["code"], 400);
}

#[tokio::test]
async fn scanner_and_new_listings_return_items() {
    let app = build_test_router();

    let (status, json) = get(&app, "/api/v1/market-data/scanner").await;
    assert_eq!(status, 200);
    assert_eq!(json["items"].as_array().unwrap().len(), 45);

    let (status, json) = get(&app, "/api/v1/market-data/new-listings?limit=40").await;
    assert_eq!(status, 200);
    assert_eq!(json["items"].as_array().unwrap().len(), 40);

    let (status, _) = get(&app, "/api/v1/market-data/new-listings?limit=0").await;
    assert_eq!(status, 400);
}

#[tokio::test]
async fn prices_require_ids() {
    let app = build_test_router();

    let (status, json) = get(&app, "/api/v1/market-data/prices?ids=Bitcoin,,unknown").await;
    assert_eq!(status, 200);
    assert_eq!(json["prices"]["bitcoin"], 64000.0);
    assert!(json["prices"].get("unknown").is_none());

    let (status, _) = get(&app, "/api/v1/market-data/prices").await;
    assert_eq!(status, 400);
}

#[tokio::test]
async fn fx_routes() {
    let app = build_test_router();

    let (status, json) = get(&app, "/api/v1/fx/usdbrl").await;
    assert_eq!(status, 200);
    assert_eq!(json["usdbrl"], 5.25);

    let (status, json) = get(&app, "/api/v1/fx/usd/brl").await;
    assert_eq!(status, 200);
    assert_eq!(json["pair"], "USD/BRL");
    assert_eq!(json["rate"], 5.25);

    let (status, _) = get(&app, "/api/v1/fx/usd/br1").await;
    assert_eq!(status, 400);
}

#[tokio::test]
async fn status_lists_chains() {
    let app = build_test_router();
    get(&app, "/api/v1/market-data/scanner").await;

    let (status, json) = get(&app, "/api/v1/market-data/status").await;

    assert_eq!(status, 200);
    assert_eq!(json["chains"][0]["kind"], "markets");
    assert_eq!(json["chains"][0]["providers"][0], "STATIC");
    assert_eq!(json["marketGate"][0]["callsInWindow"], 1);
    assert_eq!(json["cached"]["markets"], 1);
}

/// FX provider that answers far slower than the request timeout.
struct SlowFx;

#[async_trait]
impl MarketDataProvider for SlowFx {
    fn id(&self) -> &'static str {
        "SLOW"
    }

    fn capabilities(&self) -> ProviderCapabilities {
        ProviderCapabilities {
            data_kinds: &[DataKind::FxRate],
        }
    }

    async fn get_fx_rate(&self, _pair: &CurrencyPair) -> Result<Decimal, MarketDataError> {
        tokio::time::sleep(Duration::from_secs(5)).await;
        Ok(dec!(5.25))
    }
}

#[tokio::test]
async fn slow_request_times_out_with_408() {
    let gateway_config = GatewayConfig {
        fx_providers: vec!["SLOW".to_string()],
        ..GatewayConfig::default()
    };
    let provider: Arc<dyn MarketDataProvider> = Arc::new(SlowFx);
    let gateway = MarketDataGateway::new(gateway_config, vec![provider]);
    let config = Config {
        request_timeout: Duration::from_millis(50),
        ..Config::default()
    };
    let app = app_router(Arc::new(AppState::new(gateway)), &config);

    let (status, _) = get(&app, "/api/v1/fx/usdbrl").await;

    assert_eq!(status, StatusCode::REQUEST_TIMEOUT);
}
