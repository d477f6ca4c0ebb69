use std::sync::Arc;

use axum::{
    extract::{rejection::QueryRejection, Extension, Query},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};

use crate::app::dto::RangeQuery;
use crate::app::errors;
use crate::app::routes::ledger::range_of;
use crate::app::services::AppServices;

pub fn router() -> Router {
    Router::new()
        .route("/trial-balance", get(trial_balance))
        .route("/balance-sheet", get(balance_sheet))
        .route("/profit-loss", get(profit_and_loss))
}

pub async fn trial_balance(
    Extension(services): Extension<Arc<AppServices>>,
    query: Result<Query<RangeQuery>, QueryRejection>,
) -> axum::response::Response {
    let range = match range_of(query) {
        Ok(r) => r,
        Err(resp) => return resp,
    };
    match services.trial_balance(range).await {
        Ok(report) => (StatusCode::OK, Json(report)).into_response(),
        Err(e) => errors::read_error_to_response(e),
    }
}

/// Always 200: an unbalanced sheet or classification gaps are reported in the body.
pub async fn balance_sheet(
    Extension(services): Extension<Arc<AppServices>>,
    query: Result<Query<RangeQuery>, QueryRejection>,
) -> axum::response::Response {
    let range = match range_of(query) {
        Ok(r) => r,
        Err(resp) => return resp,
    };
    match services.balance_sheet(range).await {
        Ok(report) => (StatusCode::OK, Json(report)).into_response(),
        Err(e) => errors::read_error_to_response(e),
    }
}

pub async fn profit_and_loss(
    Extension(services): Extension<Arc<AppServices>>,
    query: Result<Query<RangeQuery>, QueryRejection>,
) -> axum::response::Response {
    let range = match range_of(query) {
        Ok(r) => r,
        Err(resp) => return resp,
    };
    match services.profit_and_loss(range).await {
        Ok(report) => (StatusCode::OK, Json(report)).into_response(),
        Err(e) => errors::read_error_to_response(e),
    }
}
