use std::sync::Arc;

use crate::{error::ApiResult, main_lib::AppState};
use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};
use cryptofolio_market_data::CurrencyPair;
use rust_decimal::Decimal;
use serde::Serialize;

#[derive(Serialize)]
struct UsdBrlResponse {
    usdbrl: Decimal,
}

#[derive(Serialize)]
struct FxRateResponse {
    pair: CurrencyPair,
    rate: Decimal,
}

async fn get_usd_brl(State(state): State<Arc<AppState>>) -> Json<UsdBrlResponse> {
    Json(UsdBrlResponse {
        usdbrl: state.gateway.get_usd_brl().await,
    })
}

async fn get_fx_rate(
    State(state): State<Arc<AppState>>,
    Path((base, quote)): Path<(String, String)>,
) -> ApiResult<Json<FxRateResponse>> {
    let pair = CurrencyPair::new(&base, &quote)?;
    let rate = state.gateway.get_fx_rate(&pair).await;
    Ok(Json(FxRateResponse { pair, rate }))
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/fx/usdbrl", get(get_usd_brl))
        .route("/fx/{base}/{quote}", get(get_fx_rate))
}
