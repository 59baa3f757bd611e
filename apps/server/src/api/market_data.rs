use std::sync::Arc;

use crate::{
    error::{ApiError, ApiResult},
    main_lib::AppState,
};
use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use chrono::Utc;
use cryptofolio_market_data::{
    GatewayStatus, MarketOrder, MarketsQuery, NormalizedRecord, PriceMap,
    DEFAULT_LISTING_ITEMS, DEFAULT_LISTING_PAGE_SIZE, MAX_PAGE_SIZE,
};
use serde::{Deserialize, Serialize};

const SCANNER_PAGE_SIZE: u32 = 50;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ListingResponse {
    items: Vec<NormalizedRecord>,
    /// Response time, in milliseconds since the epoch.
    ts: i64,
}

impl ListingResponse {
    fn now(items: Vec<NormalizedRecord>) -> Self {
        Self {
            items,
            ts: Utc::now().timestamp_millis(),
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PricesResponse {
    prices: PriceMap,
    ts: i64,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct MarketsParams {
    page: Option<u32>,
    per_page: Option<u32>,
    order: Option<String>,
}

#[derive(Deserialize)]
struct ListingParams {
    limit: Option<usize>,
}

#[derive(Deserialize)]
struct PricesParams {
    ids: Option<String>,
}

async fn get_markets(
    State(state): State<Arc<AppState>>,
    Query(params): Query<MarketsParams>,
) -> ApiResult<Json<ListingResponse>> {
    let defaults = MarketsQuery::default();
    let order = match params.order.as_deref() {
        Some(order) => order.parse::<MarketOrder>()?,
        None => defaults.order,
    };
    let query = MarketsQuery::new(
        params.page.unwrap_or(defaults.page),
        params.per_page.unwrap_or(defaults.per_page),
        order,
    );

    let items = state.gateway.get_markets(query).await;
    Ok(Json(ListingResponse::now(items)))
}

/// Smallest caps first: where the scanner looks for early movers.
async fn get_scanner(State(state): State<Arc<AppState>>) -> Json<ListingResponse> {
    let query = MarketsQuery::new(1, SCANNER_PAGE_SIZE, MarketOrder::MarketCapAsc);
    let items = state.gateway.get_markets(query).await;
    Json(ListingResponse::now(items))
}

async fn get_new_listings(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ListingParams>,
) -> ApiResult<Json<ListingResponse>> {
    let limit = params.limit.unwrap_or(DEFAULT_LISTING_ITEMS);
    if limit == 0 || limit > MAX_PAGE_SIZE as usize {
        return Err(ApiError::BadRequest(format!(
            "limit must be between 1 and {}",
            MAX_PAGE_SIZE
        )));
    }

    let items = state
        .gateway
        .get_market_listing(MarketOrder::MarketCapAsc, limit, DEFAULT_LISTING_PAGE_SIZE)
        .await;
    Ok(Json(ListingResponse::now(items)))
}

async fn get_prices(
    State(state): State<Arc<AppState>>,
    Query(params): Query<PricesParams>,
) -> ApiResult<Json<PricesResponse>> {
    let ids = params
        .ids
        .ok_or_else(|| ApiError::BadRequest("missing 'ids' query parameter".to_string()))?;
    let ids: Vec<&str> = ids.split(',').collect();

    let prices = state.gateway.get_prices(&ids).await;
    Ok(Json(PricesResponse {
        prices,
        ts: Utc::now().timestamp_millis(),
    }))
}

async fn get_status(State(state): State<Arc<AppState>>) -> Json<GatewayStatus> {
    Json(state.gateway.status())
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/market-data/markets", get(get_markets))
        .route("/market-data/scanner", get(get_scanner))
        .route("/market-data/new-listings", get(get_new_listings))
        .route("/market-data/prices", get(get_prices))
        .route("/market-data/status", get(get_status))
}
