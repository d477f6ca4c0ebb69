use std::sync::Arc;

use axum::{
    extract::{rejection::QueryRejection, Extension, Path, Query},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};

use crate::app::dto::RangeQuery;
use crate::app::errors;
use crate::app::services::AppServices;

pub fn router() -> Router {
    Router::new()
        .route("/balances", get(list_balances))
        .route("/:code", get(account_ledger))
}

pub(crate) fn range_of(
    query: Result<Query<RangeQuery>, QueryRejection>,
) -> Result<tallyerp_accounting::DateRange, axum::response::Response> {
    let Query(query) = query
        .map_err(|e| errors::json_error(StatusCode::BAD_REQUEST, "invalid_query", e.body_text()))?;
    query.to_range()
}

pub async fn list_balances(
    Extension(services): Extension<Arc<AppServices>>,
    query: Result<Query<RangeQuery>, QueryRejection>,
) -> axum::response::Response {
    let range = match range_of(query) {
        Ok(r) => r,
        Err(resp) => return resp,
    };
    match services.balances(range).await {
        Ok(items) => (StatusCode::OK, Json(serde_json::json!({ "items": items.as_slice() }))).into_response(),
        Err(e) => errors::read_error_to_response(e),
    }
}

pub async fn account_ledger(
    Extension(services): Extension<Arc<AppServices>>,
    Path(code): Path<String>,
    query: Result<Query<RangeQuery>, QueryRejection>,
) -> axum::response::Response {
    let range = match range_of(query) {
        Ok(r) => r,
        Err(resp) => return resp,
    };
    match services.general_ledger(&code, range).await {
        Ok(gl) => (StatusCode::OK, Json(gl)).into_response(),
        Err(e) => errors::read_error_to_response(e),
    }
}
