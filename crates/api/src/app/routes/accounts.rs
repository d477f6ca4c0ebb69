use std::sync::Arc;

use axum::{
    extract::{rejection::QueryRejection, Extension, Query},
    http::StatusCode,
    response::IntoResponse,
    Json,
};

use crate::app::dto::AccountsQuery;
use crate::app::errors;
use crate::app::services::AppServices;

pub async fn list_accounts(
    Extension(services): Extension<Arc<AppServices>>,
    query: Result<Query<AccountsQuery>, QueryRejection>,
) -> axum::response::Response {
    let Query(query) = match query {
        Ok(q) => q,
        Err(e) => return errors::json_error(StatusCode::BAD_REQUEST, "invalid_query", e.body_text()),
    };
    let items = services.accounts(query.prefix.as_deref());
    (StatusCode::OK, Json(serde_json::json!({ "items": items }))).into_response()
}
